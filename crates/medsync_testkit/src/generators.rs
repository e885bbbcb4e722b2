//! Property-based test generators using proptest.
//!
//! Generated records are always syncable: the patient id is non-empty and
//! the identity fields are set, so a stored record equals the generated one.

use chrono::{NaiveDate, NaiveDateTime};
use medsync_protocol::{
    Address, Allergy, Consultation, Contact, Gender, Patient, Prescription, Record, Severity,
};
use proptest::prelude::*;

/// Strategy for patient ids such as `PAT042`.
pub fn patient_id_strategy() -> impl Strategy<Value = String> {
    "PAT[0-9]{3}"
}

/// Strategy for free text, including characters the codec must escape and
/// leading or trailing spaces.
pub fn text_strategy() -> impl Strategy<Value = String> {
    " ?[A-Za-z][A-Za-z0-9 &<>',.-]{0,20}[A-Za-z0-9] ?"
}

/// Strategy for calendar dates.
pub fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1920i32..2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default())
}

/// Strategy for timestamps with millisecond precision.
pub fn datetime_strategy() -> impl Strategy<Value = NaiveDateTime> {
    (date_strategy(), 0u32..24, 0u32..60, 0u32..60, 0u32..1000)
        .prop_map(|(d, h, m, s, ms)| d.and_hms_milli_opt(h, m, s, ms).unwrap_or_default())
}

fn gender_strategy() -> impl Strategy<Value = Gender> {
    prop_oneof![Just(Gender::Male), Just(Gender::Female), Just(Gender::Other)]
}

fn severity_strategy() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Mild),
        Just(Severity::Moderate),
        Just(Severity::Severe)
    ]
}

fn patient_strategy() -> impl Strategy<Value = Patient> {
    let address = (
        proptest::option::of(text_strategy()),
        proptest::option::of(text_strategy()),
        proptest::option::of("[0-9]{5}"),
        proptest::option::of(text_strategy()),
    )
        .prop_map(|(street, city, postal_code, country)| Address {
            street,
            city,
            postal_code,
            country,
        });
    (
        patient_id_strategy(),
        text_strategy(),
        text_strategy(),
        date_strategy(),
        gender_strategy(),
        "[a-z]{1,8}@[a-z]{1,8}\\.com",
        "[0-9]{3}-[0-9]{3}-[0-9]{4}",
        proptest::option::of(address),
    )
        .prop_map(
            |(patient_id, first_name, last_name, date_of_birth, gender, email, phone, address)| {
                Patient {
                    patient_id,
                    first_name,
                    last_name,
                    date_of_birth,
                    gender,
                    contact: Contact {
                        email,
                        phone,
                        address,
                    },
                }
            },
        )
}

fn consultation_strategy() -> impl Strategy<Value = Consultation> {
    (
        "CON-[0-9]{1,4}",
        datetime_strategy(),
        "DOC-[0-9]{1,3}",
        text_strategy(),
        text_strategy(),
    )
        .prop_map(
            |(consultation_id, date, doctor_id, symptoms, diagnosis)| Consultation {
                consultation_id,
                date,
                doctor_id,
                symptoms,
                diagnosis,
            },
        )
}

fn prescription_strategy() -> impl Strategy<Value = Prescription> {
    (
        "PRE-[0-9]{1,4}",
        text_strategy(),
        "[0-9]{1,4}mg",
        text_strategy(),
        proptest::option::of(date_strategy()),
        proptest::option::of(date_strategy()),
    )
        .prop_map(
            |(prescription_id, medication, dosage, frequency, start_date, end_date)| Prescription {
                prescription_id,
                medication,
                dosage,
                frequency,
                start_date,
                end_date,
            },
        )
}

fn allergy_strategy() -> impl Strategy<Value = Allergy> {
    (
        "ALG-[0-9]{1,4}",
        text_strategy(),
        severity_strategy(),
        proptest::option::of(text_strategy()),
    )
        .prop_map(|(allergy_id, substance, severity, reaction)| Allergy {
            allergy_id,
            substance,
            severity,
            reaction,
        })
}

/// Strategy for complete, syncable records.
pub fn record_strategy() -> impl Strategy<Value = Record> {
    (
        "REC-[0-9a-f]{8}",
        datetime_strategy(),
        patient_strategy(),
        prop::collection::vec(consultation_strategy(), 0..3),
        prop::collection::vec(prescription_strategy(), 0..3),
        prop::collection::vec(allergy_strategy(), 0..3),
    )
        .prop_map(
            |(record_id, created_at, patient, consultations, prescriptions, allergies)| Record {
                record_id: Some(record_id),
                created_at: Some(created_at),
                patient,
                consultations,
                prescriptions,
                allergies,
            },
        )
}
