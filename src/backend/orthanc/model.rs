//! Resources returned by the Orthanc REST API.

use crate::api::pacs::{PatientSummary, SeriesSummary};
use serde::Deserialize;

const UNKNOWN: &str = "Unknown";

/// `GET /studies/{id}`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Study {
	pub patient_main_dicom_tags: PatientTags,
}

/// `GET /studies/{id}/series`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Series {
	#[serde(rename = "ID")]
	pub id: String,
	#[serde(default)]
	pub main_dicom_tags: SeriesTags,
	#[serde(default)]
	pub instances: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SeriesTags {
	pub series_number: Option<String>,
	pub series_description: Option<String>,
	pub modality: Option<String>,
}

/// `POST /tools/find` at patient level with `"Expand": true`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Patient {
	#[serde(rename = "ID")]
	pub id: String,
	#[serde(default)]
	pub main_dicom_tags: PatientTags,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PatientTags {
	#[serde(rename = "PatientID")]
	pub patient_id: Option<String>,
	#[serde(rename = "PatientName")]
	pub patient_name: Option<String>,
}

impl Series {
	pub fn summarize(self, study_id: &str, study: &Study) -> SeriesSummary {
		let tags = self.main_dicom_tags;
		SeriesSummary {
			uuid: self.id,
			patient_name: study
				.patient_main_dicom_tags
				.patient_name
				.clone()
				.unwrap_or_else(|| String::from(UNKNOWN)),
			study_id: study_id.to_owned(),
			series_number: tags.series_number.unwrap_or_else(|| String::from("N/A")),
			description: tags
				.series_description
				.unwrap_or_else(|| String::from("No description")),
			modality: tags.modality.unwrap_or_else(|| String::from(UNKNOWN)),
			num_instances: self.instances.len(),
		}
	}
}

impl From<Patient> for PatientSummary {
	fn from(patient: Patient) -> Self {
		let patient_name = patient.main_dicom_tags.patient_name.unwrap_or_default();
		let (last_name, first_name) = split_person_name(&patient_name);
		Self {
			uuid: patient.id,
			patient_id: patient.main_dicom_tags.patient_id.unwrap_or_default(),
			first_name,
			last_name,
			patient_name,
		}
	}
}

/// Splits a DICOM person name (`LAST^FIRST^MIDDLE^PREFIX^SUFFIX`) into last and first name.
fn split_person_name(name: &str) -> (String, String) {
	let mut components = name.split('^').map(str::trim);
	let last = components.next().unwrap_or_default().to_owned();
	let first = components.next().unwrap_or_default().to_owned();
	(last, first)
}

/// Wildcard query matching `name` anywhere in the patient name.
pub fn patient_name_pattern(name: &str) -> String {
	format!("*{}*", name.trim().to_uppercase())
}
