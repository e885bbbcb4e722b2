//! Object-broker call envelopes.
//!
//! Every broker call is one request envelope answered by one reply envelope:
//!
//! ```text
//! <call op="getRecord"><patientId>PAT001</patientId></call>
//! <reply op="record"><medicalRecord ../></reply>
//! <fault kind="notFound">Record not found: PAT001</fault>
//! ```
//!
//! Framing is the transport's concern; this module only maps envelopes to
//! and from XML text.

use crate::codec::RecordCodec;
use crate::error::{ProtocolError, ProtocolResult};
use crate::record::Record;
use medsync_codec::{from_xml, to_xml, Element, ToElement};
use std::fmt;

/// A broker request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerRequest {
    /// `getRecord(patientId)`.
    GetRecord {
        /// Patient identifier.
        patient_id: String,
    },
    /// `syncRecord(record)`.
    SyncRecord(Record),
    /// `replicateRecord(origin, record)`: a peer push, stored without
    /// forwarding.
    ReplicateRecord {
        /// Node id of the pushing peer.
        origin: String,
        /// The pushed record.
        record: Record,
    },
    /// `registerNode(nodeId, endpoint)`.
    RegisterNode {
        /// Peer node identifier.
        node_id: String,
        /// Peer endpoint.
        endpoint: String,
    },
    /// `unregisterNode(nodeId)`.
    UnregisterNode {
        /// Peer node identifier.
        node_id: String,
    },
    /// `isAvailable()`.
    IsAvailable,
    /// `nodeInfo()`.
    NodeInfo,
    /// `listPatients()`.
    ListPatients,
}

impl BrokerRequest {
    /// Operation name carried in the `op` attribute.
    pub fn op(&self) -> &'static str {
        match self {
            BrokerRequest::GetRecord { .. } => "getRecord",
            BrokerRequest::SyncRecord(_) => "syncRecord",
            BrokerRequest::ReplicateRecord { .. } => "replicateRecord",
            BrokerRequest::RegisterNode { .. } => "registerNode",
            BrokerRequest::UnregisterNode { .. } => "unregisterNode",
            BrokerRequest::IsAvailable => "isAvailable",
            BrokerRequest::NodeInfo => "nodeInfo",
            BrokerRequest::ListPatients => "listPatients",
        }
    }

    /// Encodes this request as XML text.
    pub fn encode(&self) -> String {
        let call = Element::new("call").with_attr("op", self.op());
        let call = match self {
            BrokerRequest::GetRecord { patient_id } => {
                call.with_child(Element::text_element("patientId", patient_id.as_str()))
            }
            BrokerRequest::SyncRecord(record) => call.with_child(record.to_element()),
            BrokerRequest::ReplicateRecord { origin, record } => call
                .with_attr("origin", origin.as_str())
                .with_child(record.to_element()),
            BrokerRequest::RegisterNode { node_id, endpoint } => call
                .with_child(Element::text_element("nodeId", node_id.as_str()))
                .with_child(Element::text_element("endpoint", endpoint.as_str())),
            BrokerRequest::UnregisterNode { node_id } => {
                call.with_child(Element::text_element("nodeId", node_id.as_str()))
            }
            BrokerRequest::IsAvailable | BrokerRequest::NodeInfo | BrokerRequest::ListPatients => {
                call
            }
        };
        to_xml(&call)
    }

    /// Decodes a request envelope.
    ///
    /// An embedded record that violates the record schema yields
    /// [`ProtocolError::Decode`]; any other shape problem yields
    /// [`ProtocolError::InvalidEnvelope`].
    pub fn decode(xml: &str) -> ProtocolResult<Self> {
        let call = from_xml(xml)?;
        if call.local_name() != "call" {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "expected <call>, found <{}>",
                call.name
            )));
        }
        let op = call
            .attr("op")
            .ok_or_else(|| ProtocolError::InvalidEnvelope("missing op".into()))?;

        match op {
            "getRecord" => Ok(BrokerRequest::GetRecord {
                patient_id: call.child_text("patientId").unwrap_or_default(),
            }),
            "syncRecord" => Ok(BrokerRequest::SyncRecord(embedded_record(&call, op)?)),
            "replicateRecord" => Ok(BrokerRequest::ReplicateRecord {
                origin: call.attr("origin").unwrap_or_default().to_string(),
                record: embedded_record(&call, op)?,
            }),
            "registerNode" => Ok(BrokerRequest::RegisterNode {
                node_id: envelope_text(&call, "nodeId")?,
                endpoint: call.child_text("endpoint").unwrap_or_default(),
            }),
            "unregisterNode" => Ok(BrokerRequest::UnregisterNode {
                node_id: envelope_text(&call, "nodeId")?,
            }),
            "isAvailable" => Ok(BrokerRequest::IsAvailable),
            "nodeInfo" => Ok(BrokerRequest::NodeInfo),
            "listPatients" => Ok(BrokerRequest::ListPatients),
            other => Err(ProtocolError::InvalidEnvelope(format!(
                "unknown operation '{other}'"
            ))),
        }
    }
}

fn embedded_record(call: &Element, op: &str) -> ProtocolResult<Record> {
    let record = call
        .elements()
        .next()
        .ok_or_else(|| ProtocolError::InvalidEnvelope(format!("{op} without record")))?;
    RecordCodec::decode_element(record)
}

fn envelope_text(element: &Element, name: &str) -> ProtocolResult<String> {
    element
        .required_text(name)
        .map_err(|_| ProtocolError::InvalidEnvelope(format!("missing <{name}>")))
}

/// Classification of a broker fault, mirroring the core error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    /// Lookup miss.
    NotFound,
    /// Invalid input.
    Validation,
    /// Undecodable document or envelope.
    Decode,
    /// Anything else.
    Internal,
}

impl FaultKind {
    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::NotFound => "notFound",
            FaultKind::Validation => "validation",
            FaultKind::Decode => "decode",
            FaultKind::Internal => "internal",
        }
    }

    pub(crate) fn from_wire(s: &str) -> Self {
        match s {
            "notFound" => FaultKind::NotFound,
            "validation" => FaultKind::Validation,
            "decode" => FaultKind::Decode,
            _ => FaultKind::Internal,
        }
    }
}

/// A fault object returned in place of a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerFault {
    /// Fault classification.
    pub kind: FaultKind,
    /// Human-readable detail.
    pub message: String,
}

impl BrokerFault {
    /// Creates a fault.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for BrokerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fault: {}", self.kind.as_str(), self.message)
    }
}

/// A broker reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerReply {
    /// Result of `getRecord`.
    Record(Record),
    /// Completion of a call without a result value.
    Done,
    /// Result of `isAvailable`.
    Available(bool),
    /// Result of `nodeInfo`.
    Info(String),
    /// Result of `listPatients`.
    Patients(Vec<String>),
    /// The call failed.
    Fault(BrokerFault),
}

impl BrokerReply {
    /// Encodes this reply as XML text.
    pub fn encode(&self) -> String {
        let element = match self {
            BrokerReply::Record(record) => reply("record").with_child(record.to_element()),
            BrokerReply::Done => reply("done"),
            BrokerReply::Available(available) => {
                reply("available").with_text(if *available { "true" } else { "false" })
            }
            BrokerReply::Info(info) => reply("info").with_text(info.as_str()),
            BrokerReply::Patients(ids) => ids.iter().fold(reply("patients"), |e, id| {
                e.with_child(Element::text_element("patientId", id.as_str()))
            }),
            BrokerReply::Fault(fault) => {
                let e = Element::new("fault").with_attr("kind", fault.kind.as_str());
                if fault.message.is_empty() {
                    e
                } else {
                    e.with_text(fault.message.as_str())
                }
            }
        };
        to_xml(&element)
    }

    /// Decodes a reply envelope.
    pub fn decode(xml: &str) -> ProtocolResult<Self> {
        let element = from_xml(xml)?;
        match element.local_name() {
            "fault" => Ok(BrokerReply::Fault(BrokerFault::new(
                FaultKind::from_wire(element.attr("kind").unwrap_or_default()),
                element.text().trim(),
            ))),
            "reply" => match element.attr("op").unwrap_or_default() {
                "record" => {
                    let record = element.elements().next().ok_or_else(|| {
                        ProtocolError::InvalidEnvelope("record reply without record".into())
                    })?;
                    Ok(BrokerReply::Record(RecordCodec::decode_element(record)?))
                }
                "done" => Ok(BrokerReply::Done),
                "available" => match element.text().trim() {
                    "true" => Ok(BrokerReply::Available(true)),
                    "false" => Ok(BrokerReply::Available(false)),
                    other => Err(ProtocolError::InvalidEnvelope(format!(
                        "invalid availability '{other}'"
                    ))),
                },
                "info" => Ok(BrokerReply::Info(element.text().trim().to_string())),
                "patients" => Ok(BrokerReply::Patients(
                    element
                        .children_named("patientId")
                        .map(|e| e.text().trim().to_string())
                        .collect(),
                )),
                other => Err(ProtocolError::InvalidEnvelope(format!(
                    "unknown reply '{other}'"
                ))),
            },
            other => Err(ProtocolError::InvalidEnvelope(format!(
                "expected <reply> or <fault>, found <{other}>"
            ))),
        }
    }
}

fn reply(op: &str) -> Element {
    Element::new("reply").with_attr("op", op)
}
