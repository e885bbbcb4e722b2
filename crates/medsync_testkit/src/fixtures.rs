//! Record fixtures.
//!
//! Every fixture starts from the sample record, so `record_id` and
//! `created_at` are already set and a synced fixture compares equal to
//! what the store hands back.

use chrono::NaiveDate;
pub use medsync_core::{sample_record, SAMPLE_PATIENT_ID};
use medsync_protocol::{Allergy, Consultation, Prescription, Record, Severity};

/// The sample record under a different patient id.
pub fn record_for(patient_id: &str) -> Record {
    let mut record = sample_record();
    record.patient.patient_id = patient_id.to_string();
    record
}

/// [`record_for`] with one consultation, prescription and allergy attached.
pub fn record_with_history(patient_id: &str) -> Record {
    let mut record = record_for(patient_id);
    let visit = date(2024, 3, 2);

    record.consultations.push(Consultation {
        consultation_id: "CON-1".to_string(),
        date: visit.and_hms_opt(9, 15, 0).unwrap_or_default(),
        doctor_id: "DOC-7".to_string(),
        symptoms: "Cough & fever".to_string(),
        diagnosis: "Bronchitis".to_string(),
    });
    record.prescriptions.push(Prescription {
        prescription_id: "PRE-1".to_string(),
        medication: "Amoxicillin".to_string(),
        dosage: "500mg".to_string(),
        frequency: "3x daily".to_string(),
        start_date: Some(visit),
        end_date: Some(date(2024, 3, 9)),
    });
    record.allergies.push(Allergy {
        allergy_id: "ALG-1".to_string(),
        substance: "Penicillin".to_string(),
        severity: Severity::Severe,
        reaction: Some("Hives".to_string()),
    });
    record
}

/// [`record_for`] with no `record_id` or `created_at`.
pub fn unassigned_record(patient_id: &str) -> Record {
    let mut record = record_for(patient_id);
    record.record_id = None;
    record.created_at = None;
    record
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsync_protocol::RecordCodec;

    #[test]
    fn fixtures_keep_sample_identity() {
        let record = record_for("PAT9");
        assert_eq!(record.patient_id(), "PAT9");
        assert_eq!(record.record_id, sample_record().record_id);

        let unassigned = unassigned_record("PAT9");
        assert!(unassigned.record_id.is_none());
        assert!(unassigned.created_at.is_none());
    }

    #[test]
    fn history_fixture_encodes() {
        let record = record_with_history("PAT9");
        let decoded = RecordCodec::decode(&RecordCodec::encode(&record)).unwrap();
        assert_eq!(decoded, record);
        assert!(record.prescriptions[0].is_active_on(date(2024, 3, 5)));
    }
}
