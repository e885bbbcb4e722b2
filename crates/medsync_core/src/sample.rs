//! Sample data for seeding a fresh node.

use chrono::{NaiveDate, NaiveDateTime};
use medsync_protocol::{Address, Contact, Gender, Patient, Record};

/// Patient id of the sample record.
pub const SAMPLE_PATIENT_ID: &str = "PAT001";

/// The John Doe record new nodes can be seeded with.
pub fn sample_record() -> Record {
    let created_at: Option<NaiveDateTime> =
        NaiveDate::from_ymd_opt(2024, 1, 15).and_then(|d| d.and_hms_opt(10, 30, 0));

    Record {
        record_id: Some("REC-001".to_string()),
        created_at,
        patient: Patient {
            patient_id: SAMPLE_PATIENT_ID.to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1980, 5, 15).unwrap_or_default(),
            gender: Gender::Male,
            contact: Contact {
                email: "john.doe@email.com".to_string(),
                phone: "123-456-7890".to_string(),
                address: Some(Address {
                    street: Some("123 Main St".to_string()),
                    city: Some("New York".to_string()),
                    postal_code: Some("10001".to_string()),
                    country: Some("USA".to_string()),
                }),
            },
        },
        consultations: Vec::new(),
        prescriptions: Vec::new(),
        allergies: Vec::new(),
    }
}
