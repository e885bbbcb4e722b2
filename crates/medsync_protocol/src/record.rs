//! Medical record data model.

use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A patient's medical record.
///
/// Records are stored and replicated keyed by `patient.patient_id`, never by
/// `record_id`. A record is replaced wholesale on every sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Record identifier. Assigned on first sync when absent.
    pub record_id: Option<String>,
    /// Creation timestamp. Assigned on first sync when absent.
    pub created_at: Option<NaiveDateTime>,
    /// The patient this record belongs to.
    pub patient: Patient,
    /// Consultations, in order.
    pub consultations: Vec<Consultation>,
    /// Prescriptions, in order.
    pub prescriptions: Vec<Prescription>,
    /// Known allergies, in order.
    pub allergies: Vec<Allergy>,
}

impl Record {
    /// Creates an empty record for a patient with a fresh identity.
    pub fn new(patient: Patient) -> Self {
        Self {
            record_id: Some(generate_record_id()),
            created_at: Some(now()),
            patient,
            consultations: Vec::new(),
            prescriptions: Vec::new(),
            allergies: Vec::new(),
        }
    }

    /// The key this record is stored under.
    pub fn patient_id(&self) -> &str {
        &self.patient.patient_id
    }

    /// Fills in identity fields that are still unassigned.
    ///
    /// Existing values are never replaced, so a record id stays stable once
    /// assigned. `previous` is the record currently stored for the same
    /// patient, whose identity is inherited before a new one is generated.
    pub fn assign_identity(&mut self, previous: Option<&Record>) {
        if self.record_id.is_none() {
            self.record_id = previous
                .and_then(|p| p.record_id.clone())
                .or_else(|| Some(generate_record_id()));
        }
        if self.created_at.is_none() {
            self.created_at = previous.and_then(|p| p.created_at).or_else(|| Some(now()));
        }
    }
}

/// Generates a record identifier of the form `REC-xxxxxxxx`.
pub fn generate_record_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("REC-{}", &id[..8])
}

fn now() -> NaiveDateTime {
    // Millisecond precision keeps generated timestamps short on the wire.
    let now = Utc::now().naive_utc();
    now.with_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}

/// Patient demographics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Unique patient identifier.
    pub patient_id: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
    /// Gender.
    pub gender: Gender,
    /// Contact details.
    pub contact: Contact,
}

/// Patient gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Other or unspecified.
    Other,
}

impl Gender {
    /// Wire name of this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MALE" => Ok(Gender::Male),
            "FEMALE" => Ok(Gender::Female),
            "OTHER" => Ok(Gender::Other),
            other => Err(format!("invalid gender '{other}'")),
        }
    }
}

/// Contact details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Email address.
    pub email: String,
    /// Phone number.
    pub phone: String,
    /// Postal address.
    pub address: Option<Address>,
}

/// Postal address. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Street line.
    pub street: Option<String>,
    /// City.
    pub city: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// Country.
    pub country: Option<String>,
}

/// A consultation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Consultation {
    /// Consultation identifier.
    pub consultation_id: String,
    /// When the consultation took place.
    pub date: NaiveDateTime,
    /// Attending doctor.
    pub doctor_id: String,
    /// Reported symptoms.
    pub symptoms: String,
    /// Diagnosis.
    pub diagnosis: String,
}

/// A prescription entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    /// Prescription identifier.
    pub prescription_id: String,
    /// Prescribed medication.
    pub medication: String,
    /// Dosage, e.g. `500mg`.
    pub dosage: String,
    /// Frequency, e.g. `Every 6 hours`.
    pub frequency: String,
    /// First day of treatment.
    pub start_date: Option<NaiveDate>,
    /// Last day of treatment.
    pub end_date: Option<NaiveDate>,
}

impl Prescription {
    /// Returns true if the prescription has not ended on `today`.
    pub fn is_active_on(&self, today: NaiveDate) -> bool {
        self.end_date.map_or(true, |end| end > today)
    }
}

/// An allergy entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allergy {
    /// Allergy identifier.
    pub allergy_id: String,
    /// Substance the patient reacts to.
    pub substance: String,
    /// Severity of the reaction.
    pub severity: Severity,
    /// Description of the reaction.
    pub reaction: Option<String>,
}

/// Allergy severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Mild.
    Mild,
    /// Moderate.
    Moderate,
    /// Severe.
    Severe,
}

impl Severity {
    /// Wire name of this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Mild => "MILD",
            Severity::Moderate => "MODERATE",
            Severity::Severe => "SEVERE",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MILD" => Ok(Severity::Mild),
            "MODERATE" => Ok(Severity::Moderate),
            "SEVERE" => Ok(Severity::Severe),
            other => Err(format!("invalid severity '{other}'")),
        }
    }
}
