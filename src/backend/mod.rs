pub mod orthanc;
pub mod postgres;

pub use orthanc::OrthancClient;
pub use postgres::PostgresPatientRepository;
