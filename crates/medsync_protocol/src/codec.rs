//! XML wire representation of records.
//!
//! Document shape:
//!
//! ```text
//! <medicalRecord recordId=".." creationDate="..">
//!   <patient>
//!     <patientId/> <firstName/> <lastName/> <dateOfBirth/> <gender/>
//!     <contact><email/><phone/><address>..</address></contact>
//!   </patient>
//!   <consultations><consultation>..</consultation></consultations>
//!   <prescriptions><prescription>..</prescription></prescriptions>
//!   <allergies><allergy>..</allergy></allergies>
//! </medicalRecord>
//! ```
//!
//! Free-text fields decode exactly as written, surrounding whitespace
//! included. Dates, timestamps and enum values are trimmed before parsing.

use crate::error::ProtocolResult;
use crate::record::{
    Address, Allergy, Consultation, Contact, Gender, Patient, Prescription, Record, Severity,
};
use chrono::{NaiveDate, NaiveDateTime};
use medsync_codec::{to_xml_document, CodecError, CodecResult, Element, FromElement, ToElement};
use std::fmt;

/// Root element name of a record document.
pub const RECORD_ELEMENT: &str = "medicalRecord";

/// Default namespace written on the root element.
pub const RECORD_NAMESPACE: &str = "urn:medsync:records:1";

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A serialized record, as exchanged on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireDocument(String);

impl WireDocument {
    /// Wraps XML text without validating it.
    pub fn new(xml: impl Into<String>) -> Self {
        Self(xml.into())
    }

    /// The XML text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the document and returns the XML text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for WireDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for WireDocument {
    fn from(xml: String) -> Self {
        Self(xml)
    }
}

/// Converts records to and from wire documents.
///
/// Encoding is total and deterministic. Decoding validates the document
/// against the record schema and never returns a partial record.
pub struct RecordCodec;

impl RecordCodec {
    /// Encodes a record as a compact, single-line document.
    pub fn encode(record: &Record) -> WireDocument {
        WireDocument(record.to_xml())
    }

    /// Encodes a record as a standalone document with an XML declaration.
    pub fn encode_document(record: &Record) -> String {
        to_xml_document(&record.to_element())
    }

    /// Decodes and validates a wire document.
    pub fn decode(document: &WireDocument) -> ProtocolResult<Record> {
        Self::decode_str(document.as_str())
    }

    /// Decodes and validates XML text.
    pub fn decode_str(xml: &str) -> ProtocolResult<Record> {
        Ok(Record::from_xml(xml)?)
    }

    /// Decodes and validates an already-parsed element.
    pub fn decode_element(element: &Element) -> ProtocolResult<Record> {
        Ok(Record::from_element(element)?)
    }
}

fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

fn parse_datetime(field: &str, value: &str) -> CodecResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), DATETIME_FORMAT)
        .map_err(|_| CodecError::invalid_structure(format!("invalid {field} '{value}'")))
}

fn format_date(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

fn parse_date(field: &str, value: &str) -> CodecResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| CodecError::invalid_structure(format!("invalid {field} '{value}'")))
}

fn optional_date(element: &Element, field: &str) -> CodecResult<Option<NaiveDate>> {
    match element.child_text(field) {
        Some(text) if !text.trim().is_empty() => parse_date(field, &text).map(Some),
        _ => Ok(None),
    }
}

fn wrapped<T: ToElement>(wrapper: &str, items: &[T]) -> Element {
    items
        .iter()
        .fold(Element::new(wrapper), |e, item| e.with_child(item.to_element()))
}

fn unwrap_list<T: FromElement>(parent: &Element, wrapper: &str, item: &str) -> CodecResult<Vec<T>> {
    match parent.child(wrapper) {
        Some(list) => list.children_named(item).map(T::from_element).collect(),
        None => Ok(Vec::new()),
    }
}

impl ToElement for Record {
    fn to_element(&self) -> Element {
        let mut root = Element::new(RECORD_ELEMENT).with_attr("xmlns", RECORD_NAMESPACE);
        if let Some(id) = &self.record_id {
            root.set_attr("recordId", id.as_str());
        }
        if let Some(created_at) = &self.created_at {
            root.set_attr("creationDate", format_datetime(created_at));
        }
        root.with_child(self.patient.to_element())
            .with_child(wrapped("consultations", &self.consultations))
            .with_child(wrapped("prescriptions", &self.prescriptions))
            .with_child(wrapped("allergies", &self.allergies))
    }
}

impl FromElement for Record {
    fn from_element(element: &Element) -> CodecResult<Self> {
        if element.local_name() != RECORD_ELEMENT {
            return Err(CodecError::invalid_structure(format!(
                "expected <{RECORD_ELEMENT}>, found <{}>",
                element.name
            )));
        }

        let record_id = element
            .attr("recordId")
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        let created_at = element
            .attr("creationDate")
            .map(|v| parse_datetime("creationDate", v))
            .transpose()?;
        let patient = Patient::from_element(element.required_child("patient")?)?;

        Ok(Self {
            record_id,
            created_at,
            patient,
            consultations: unwrap_list(element, "consultations", "consultation")?,
            prescriptions: unwrap_list(element, "prescriptions", "prescription")?,
            allergies: unwrap_list(element, "allergies", "allergy")?,
        })
    }
}

impl ToElement for Patient {
    fn to_element(&self) -> Element {
        Element::new("patient")
            .with_child(Element::text_element("patientId", self.patient_id.as_str()))
            .with_child(Element::text_element("firstName", self.first_name.as_str()))
            .with_child(Element::text_element("lastName", self.last_name.as_str()))
            .with_child(Element::text_element(
                "dateOfBirth",
                format_date(&self.date_of_birth),
            ))
            .with_child(Element::text_element("gender", self.gender.as_str()))
            .with_child(self.contact.to_element())
    }
}

impl FromElement for Patient {
    fn from_element(element: &Element) -> CodecResult<Self> {
        let patient_id = element.required_text("patientId")?;
        let first_name = element.required_text("firstName")?;
        let last_name = element.required_text("lastName")?;
        let date_of_birth = parse_date("dateOfBirth", &element.required_text("dateOfBirth")?)?;
        let gender = element
            .required_text("gender")?
            .trim()
            .parse::<Gender>()
            .map_err(CodecError::invalid_structure)?;
        let contact = element
            .child("contact")
            .map(Contact::from_element)
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            patient_id,
            first_name,
            last_name,
            date_of_birth,
            gender,
            contact,
        })
    }
}

impl ToElement for Contact {
    fn to_element(&self) -> Element {
        let contact = Element::new("contact")
            .with_child(Element::text_element("email", self.email.as_str()))
            .with_child(Element::text_element("phone", self.phone.as_str()));
        match &self.address {
            Some(address) => contact.with_child(address.to_element()),
            None => contact,
        }
    }
}

impl FromElement for Contact {
    fn from_element(element: &Element) -> CodecResult<Self> {
        Ok(Self {
            email: element.child_text("email").unwrap_or_default(),
            phone: element.child_text("phone").unwrap_or_default(),
            address: element
                .child("address")
                .map(Address::from_element)
                .transpose()?,
        })
    }
}

impl ToElement for Address {
    fn to_element(&self) -> Element {
        Element::new("address")
            .with_optional_text("street", self.street.as_deref())
            .with_optional_text("city", self.city.as_deref())
            .with_optional_text("postalCode", self.postal_code.as_deref())
            .with_optional_text("country", self.country.as_deref())
    }
}

impl FromElement for Address {
    fn from_element(element: &Element) -> CodecResult<Self> {
        Ok(Self {
            street: element.child_text("street"),
            city: element.child_text("city"),
            postal_code: element.child_text("postalCode"),
            country: element.child_text("country"),
        })
    }
}

impl ToElement for Consultation {
    fn to_element(&self) -> Element {
        Element::new("consultation")
            .with_child(Element::text_element(
                "consultationId",
                self.consultation_id.as_str(),
            ))
            .with_child(Element::text_element("date", format_datetime(&self.date)))
            .with_child(Element::text_element("doctorId", self.doctor_id.as_str()))
            .with_child(Element::text_element("symptoms", self.symptoms.as_str()))
            .with_child(Element::text_element("diagnosis", self.diagnosis.as_str()))
    }
}

impl FromElement for Consultation {
    fn from_element(element: &Element) -> CodecResult<Self> {
        Ok(Self {
            consultation_id: element.required_text("consultationId")?,
            date: parse_datetime("date", &element.required_text("date")?)?,
            doctor_id: element.child_text("doctorId").unwrap_or_default(),
            symptoms: element.child_text("symptoms").unwrap_or_default(),
            diagnosis: element.child_text("diagnosis").unwrap_or_default(),
        })
    }
}

impl ToElement for Prescription {
    fn to_element(&self) -> Element {
        let start = self.start_date.as_ref().map(format_date);
        let end = self.end_date.as_ref().map(format_date);
        Element::new("prescription")
            .with_child(Element::text_element(
                "prescriptionId",
                self.prescription_id.as_str(),
            ))
            .with_child(Element::text_element("medication", self.medication.as_str()))
            .with_child(Element::text_element("dosage", self.dosage.as_str()))
            .with_child(Element::text_element("frequency", self.frequency.as_str()))
            .with_optional_text("startDate", start.as_deref())
            .with_optional_text("endDate", end.as_deref())
    }
}

impl FromElement for Prescription {
    fn from_element(element: &Element) -> CodecResult<Self> {
        Ok(Self {
            prescription_id: element.required_text("prescriptionId")?,
            medication: element.required_text("medication")?,
            dosage: element.child_text("dosage").unwrap_or_default(),
            frequency: element.child_text("frequency").unwrap_or_default(),
            start_date: optional_date(element, "startDate")?,
            end_date: optional_date(element, "endDate")?,
        })
    }
}

impl ToElement for Allergy {
    fn to_element(&self) -> Element {
        Element::new("allergy")
            .with_child(Element::text_element("allergyId", self.allergy_id.as_str()))
            .with_child(Element::text_element("substance", self.substance.as_str()))
            .with_child(Element::text_element("severity", self.severity.as_str()))
            .with_optional_text("reaction", self.reaction.as_deref())
    }
}

impl FromElement for Allergy {
    fn from_element(element: &Element) -> CodecResult<Self> {
        Ok(Self {
            allergy_id: element.required_text("allergyId")?,
            substance: element.required_text("substance")?,
            severity: element
                .required_text("severity")?
                .trim()
                .parse::<Severity>()
                .map_err(CodecError::invalid_structure)?,
            reaction: element.child_text("reaction"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;

    const MINIMAL: &str = r#"<medicalRecord recordId="REC-001">
        <patient>
            <patientId>PAT42</patientId>
            <firstName>Ada</firstName>
            <lastName>Lovelace</lastName>
            <dateOfBirth>1815-12-10</dateOfBirth>
            <gender>FEMALE</gender>
        </patient>
    </medicalRecord>"#;

    fn full_record() -> Record {
        Record {
            record_id: Some("REC-001".into()),
            created_at: NaiveDate::from_ymd_opt(2024, 1, 15)
                .and_then(|d| d.and_hms_milli_opt(10, 30, 0, 250)),
            patient: Patient {
                patient_id: "PAT001".into(),
                first_name: "John".into(),
                last_name: "Doe".into(),
                date_of_birth: NaiveDate::from_ymd_opt(1980, 5, 15).unwrap(),
                gender: Gender::Male,
                contact: Contact {
                    email: "john.doe@email.com".into(),
                    phone: "123-456-7890".into(),
                    address: Some(Address {
                        street: Some("123 Main St".into()),
                        city: Some("New York".into()),
                        postal_code: Some("10001".into()),
                        country: None,
                    }),
                },
            },
            consultations: vec![Consultation {
                consultation_id: "CONS001".into(),
                date: NaiveDate::from_ymd_opt(2024, 1, 15)
                    .and_then(|d| d.and_hms_opt(10, 30, 0))
                    .unwrap(),
                doctor_id: "DOC001".into(),
                symptoms: "Fever, cough".into(),
                diagnosis: "Common cold".into(),
            }],
            prescriptions: vec![Prescription {
                prescription_id: "PRES001".into(),
                medication: "Paracetamol".into(),
                dosage: "500mg".into(),
                frequency: "Every 6 hours".into(),
                start_date: NaiveDate::from_ymd_opt(2024, 1, 15),
                end_date: None,
            }],
            allergies: vec![Allergy {
                allergy_id: "ALG001".into(),
                substance: "Penicillin".into(),
                severity: Severity::Severe,
                reaction: Some("Rash & swelling".into()),
            }],
        }
    }

    #[test]
    fn full_record_roundtrip() {
        let record = full_record();
        let doc = RecordCodec::encode(&record);
        assert_eq!(RecordCodec::decode(&doc).unwrap(), record);
        assert_eq!(
            RecordCodec::decode_str(&RecordCodec::encode_document(&record)).unwrap(),
            record
        );
    }

    #[test]
    fn encoding_is_deterministic_and_single_line() {
        let record = full_record();
        let a = RecordCodec::encode(&record);
        let b = RecordCodec::encode(&record.clone());
        assert_eq!(a, b);
        assert!(!a.as_str().contains('\n'));
        assert!(a
            .as_str()
            .starts_with(r#"<medicalRecord xmlns="urn:medsync:records:1" recordId="REC-001" creationDate="2024-01-15T10:30:00.250">"#));
    }

    #[test]
    fn minimal_document_decodes() {
        let record = RecordCodec::decode_str(MINIMAL).unwrap();
        assert_eq!(record.patient_id(), "PAT42");
        assert_eq!(record.record_id.as_deref(), Some("REC-001"));
        assert!(record.created_at.is_none());
        assert_eq!(record.patient.contact, Contact::default());
        assert!(record.consultations.is_empty());
    }

    #[test]
    fn required_patient_fields() {
        for field in ["patientId", "firstName", "lastName", "dateOfBirth", "gender"] {
            let open = format!("<{field}>");
            let start = MINIMAL.find(&open).unwrap();
            let close = format!("</{field}>");
            let end = MINIMAL.find(&close).unwrap() + close.len();
            let xml = format!("{}{}", &MINIMAL[..start], &MINIMAL[end..]);

            let err = RecordCodec::decode_str(&xml).unwrap_err();
            assert!(
                matches!(&err, ProtocolError::Decode { reason } if reason.contains(field)),
                "{field}: {err}"
            );
        }
    }

    #[test]
    fn rejects_invalid_values() {
        let bad_gender = MINIMAL.replace("FEMALE", "UNKNOWN");
        assert!(RecordCodec::decode_str(&bad_gender).is_err());

        let bad_date = MINIMAL.replace("1815-12-10", "10/12/1815");
        assert!(RecordCodec::decode_str(&bad_date).is_err());

        let bad_root = MINIMAL.replace("medicalRecord", "record");
        assert!(RecordCodec::decode_str(&bad_root).is_err());
    }

    #[test]
    fn rejects_malformed_xml() {
        let truncated = &MINIMAL[..MINIMAL.len() - 10];
        assert!(matches!(
            RecordCodec::decode_str(truncated),
            Err(ProtocolError::Decode { .. })
        ));
    }

    #[test]
    fn surrounding_whitespace_survives_decode() {
        let mut record = full_record();
        record.patient.first_name = " Ann".into();
        record.patient.contact.phone = "555 ".into();
        record.consultations[0].symptoms = "  cough\n".into();
        let decoded = RecordCodec::decode(&RecordCodec::encode(&record)).unwrap();
        assert_eq!(decoded.patient.first_name, " Ann");
        assert_eq!(decoded.patient.contact.phone, "555 ");
        assert_eq!(decoded, record);

        let padded = MINIMAL
            .replace(">FEMALE<", "> FEMALE <")
            .replace(">1815-12-10<", ">1815-12-10 <");
        assert!(RecordCodec::decode_str(&padded).is_ok());
    }

    #[test]
    fn invalid_list_item_fails_whole_record() {
        let record = full_record();
        let xml = RecordCodec::encode(&record)
            .into_string()
            .replace("<severity>SEVERE</severity>", "<severity>EXTREME</severity>");
        assert!(RecordCodec::decode_str(&xml).is_err());
    }
}
