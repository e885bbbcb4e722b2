//! # MedSync Protocol
//!
//! Record model and wire grammars shared by every MedSync transport.
//!
//! This crate provides:
//! - The [`Record`] data model
//! - [`RecordCodec`], the validated XML wire document for records
//! - The socket line grammar ([`Command`], [`Reply`])
//! - Object-broker call envelopes ([`BrokerRequest`], [`BrokerReply`])
//! - Name registry envelopes ([`NameRequest`], [`NameReply`])
//!
//! Nothing here performs I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod command;
mod envelope;
mod error;
mod naming;
mod record;

pub use codec::{RecordCodec, WireDocument, RECORD_ELEMENT, RECORD_NAMESPACE};
pub use command::{Command, Reply, RECORD_NOT_FOUND, UNKNOWN_COMMAND};
pub use envelope::{BrokerFault, BrokerReply, BrokerRequest, FaultKind};
pub use error::{ProtocolError, ProtocolResult};
pub use naming::{NameReply, NameRequest};
pub use record::{
    generate_record_id, Address, Allergy, Consultation, Contact, Gender, Patient, Prescription,
    Record, Severity,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    fn text() -> impl Strategy<Value = String> {
        " {0,2}[A-Za-z0-9&<>\"'][A-Za-z0-9 &<>\"',.:\n]{0,16}[A-Za-z0-9.] {0,2}"
    }

    fn date() -> impl Strategy<Value = NaiveDate> {
        (1900i32..2100, 1u32..=12, 1u32..=28)
            .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn datetime() -> impl Strategy<Value = NaiveDateTime> {
        (date(), 0u32..24, 0u32..60, 0u32..60, 0u32..1000)
            .prop_map(|(d, h, m, s, ms)| d.and_hms_milli_opt(h, m, s, ms).unwrap())
    }

    fn record() -> impl Strategy<Value = Record> {
        let gender = prop_oneof![Just(Gender::Male), Just(Gender::Female), Just(Gender::Other)];
        let severity = prop_oneof![
            Just(Severity::Mild),
            Just(Severity::Moderate),
            Just(Severity::Severe)
        ];
        let address = (
            proptest::option::of(text()),
            proptest::option::of(text()),
            proptest::option::of(text()),
            proptest::option::of(text()),
        )
            .prop_map(|(street, city, postal_code, country)| Address {
                street,
                city,
                postal_code,
                country,
            });
        let patient = (text(), text(), text(), date(), gender, text(), text(), proptest::option::of(address))
            .prop_map(|(id, first, last, dob, gender, email, phone, address)| Patient {
                patient_id: id,
                first_name: first,
                last_name: last,
                date_of_birth: dob,
                gender,
                contact: Contact {
                    email,
                    phone,
                    address,
                },
            });
        let consultation = (text(), datetime(), text(), text(), text()).prop_map(
            |(consultation_id, date, doctor_id, symptoms, diagnosis)| Consultation {
                consultation_id,
                date,
                doctor_id,
                symptoms,
                diagnosis,
            },
        );
        let prescription = (
            text(),
            text(),
            text(),
            text(),
            proptest::option::of(date()),
            proptest::option::of(date()),
        )
            .prop_map(
                |(prescription_id, medication, dosage, frequency, start_date, end_date)| {
                    Prescription {
                        prescription_id,
                        medication,
                        dosage,
                        frequency,
                        start_date,
                        end_date,
                    }
                },
            );
        let allergy = (text(), text(), severity, proptest::option::of(text())).prop_map(
            |(allergy_id, substance, severity, reaction)| Allergy {
                allergy_id,
                substance,
                severity,
                reaction,
            },
        );
        (
            proptest::option::of("REC-[0-9a-f]{8}"),
            proptest::option::of(datetime()),
            patient,
            prop::collection::vec(consultation, 0..3),
            prop::collection::vec(prescription, 0..3),
            prop::collection::vec(allergy, 0..3),
        )
            .prop_map(
                |(record_id, created_at, patient, consultations, prescriptions, allergies)| Record {
                    record_id,
                    created_at,
                    patient,
                    consultations,
                    prescriptions,
                    allergies,
                },
            )
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(record in record()) {
            let doc = RecordCodec::encode(&record);
            prop_assert!(!doc.as_str().contains('\n'));
            prop_assert_eq!(RecordCodec::decode(&doc).unwrap(), record);
        }

        #[test]
        fn socket_payloads_carry_records(record in record()) {
            let line = Command::SendRecord { payload: RecordCodec::encode(&record).into_string() }.to_line();
            match Command::parse(&line) {
                Command::SendRecord { payload } => {
                    prop_assert_eq!(RecordCodec::decode_str(&payload).unwrap(), record);
                }
                other => prop_assert!(false, "unexpected command {:?}", other),
            }
        }

        #[test]
        fn decode_never_panics(input in any::<String>()) {
            let _ = RecordCodec::decode_str(&input);
            let _ = BrokerRequest::decode(&input);
            let _ = BrokerReply::decode(&input);
        }
    }
}
