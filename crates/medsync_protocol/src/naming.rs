//! Name registry envelopes.
//!
//! A name registry maps service names to broker endpoints. It speaks the
//! same call/reply/fault shapes as the object broker:
//!
//! ```text
//! <call op="lookup"><name>MedicalRecordService</name></call>
//! <reply op="endpoint">broker://127.0.0.1:1050</reply>
//! <fault kind="notFound">no service bound as 'MedicalRecordService'</fault>
//! ```

use crate::envelope::{BrokerFault, FaultKind};
use crate::error::{ProtocolError, ProtocolResult};
use medsync_codec::{from_xml, to_xml, Element};

/// A name registry request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRequest {
    /// Publish `endpoint` under `name`. Fails if the name is taken.
    Bind {
        /// Service name.
        name: String,
        /// Broker endpoint of the service.
        endpoint: String,
    },
    /// Withdraw a name.
    Unbind {
        /// Service name.
        name: String,
    },
    /// Resolve a name to its endpoint.
    Lookup {
        /// Service name.
        name: String,
    },
    /// All bound names.
    List,
}

impl NameRequest {
    /// Operation name carried in the `op` attribute.
    pub fn op(&self) -> &'static str {
        match self {
            NameRequest::Bind { .. } => "bind",
            NameRequest::Unbind { .. } => "unbind",
            NameRequest::Lookup { .. } => "lookup",
            NameRequest::List => "list",
        }
    }

    /// Encodes this request as XML text.
    pub fn encode(&self) -> String {
        let call = Element::new("call").with_attr("op", self.op());
        let call = match self {
            NameRequest::Bind { name, endpoint } => call
                .with_child(Element::text_element("name", name.as_str()))
                .with_child(Element::text_element("endpoint", endpoint.as_str())),
            NameRequest::Unbind { name } | NameRequest::Lookup { name } => {
                call.with_child(Element::text_element("name", name.as_str()))
            }
            NameRequest::List => call,
        };
        to_xml(&call)
    }

    /// Decodes a request envelope.
    pub fn decode(xml: &str) -> ProtocolResult<Self> {
        let call = from_xml(xml)?;
        if call.local_name() != "call" {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "expected <call>, found <{}>",
                call.name
            )));
        }
        match call.attr("op").unwrap_or_default() {
            "bind" => Ok(NameRequest::Bind {
                name: required(&call, "name")?,
                endpoint: required(&call, "endpoint")?,
            }),
            "unbind" => Ok(NameRequest::Unbind {
                name: required(&call, "name")?,
            }),
            "lookup" => Ok(NameRequest::Lookup {
                name: required(&call, "name")?,
            }),
            "list" => Ok(NameRequest::List),
            other => Err(ProtocolError::InvalidEnvelope(format!(
                "unknown naming operation '{other}'"
            ))),
        }
    }
}

fn required(call: &Element, name: &str) -> ProtocolResult<String> {
    call.required_text(name)
        .map_err(|_| ProtocolError::InvalidEnvelope(format!("missing <{name}>")))
}

/// A name registry reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameReply {
    /// `bind` or `unbind` completed.
    Done,
    /// Result of `lookup`.
    Endpoint(String),
    /// Result of `list`, sorted.
    Names(Vec<String>),
    /// The call failed.
    Fault(BrokerFault),
}

impl NameReply {
    /// Encodes this reply as XML text.
    pub fn encode(&self) -> String {
        let element = match self {
            NameReply::Done => reply("done"),
            NameReply::Endpoint(endpoint) => reply("endpoint").with_text(endpoint.as_str()),
            NameReply::Names(names) => names.iter().fold(reply("names"), |e, name| {
                e.with_child(Element::text_element("name", name.as_str()))
            }),
            NameReply::Fault(fault) => Element::new("fault")
                .with_attr("kind", fault.kind.as_str())
                .with_text(fault.message.as_str()),
        };
        to_xml(&element)
    }

    /// Decodes a reply envelope.
    pub fn decode(xml: &str) -> ProtocolResult<Self> {
        let element = from_xml(xml)?;
        match element.local_name() {
            "fault" => Ok(NameReply::Fault(BrokerFault::new(
                FaultKind::from_wire(element.attr("kind").unwrap_or_default()),
                element.text().trim(),
            ))),
            "reply" => match element.attr("op").unwrap_or_default() {
                "done" => Ok(NameReply::Done),
                "endpoint" => Ok(NameReply::Endpoint(element.text().trim().to_string())),
                "names" => Ok(NameReply::Names(
                    element
                        .children_named("name")
                        .map(|e| e.text().trim().to_string())
                        .collect(),
                )),
                other => Err(ProtocolError::InvalidEnvelope(format!(
                    "unknown naming reply '{other}'"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_envelopes() {
        let requests = [
            NameRequest::Bind {
                name: "Records".into(),
                endpoint: "broker://127.0.0.1:1050".into(),
            },
            NameRequest::Unbind {
                name: "Records".into(),
            },
            NameRequest::Lookup {
                name: "Records".into(),
            },
            NameRequest::List,
        ];
        for request in requests {
            let xml = request.encode();
            assert!(xml.contains(&format!(r#"op="{}""#, request.op())));
            assert_eq!(NameRequest::decode(&xml).unwrap(), request);
        }
    }

    #[test]
    fn reply_envelopes() {
        let replies = [
            NameReply::Done,
            NameReply::Endpoint("broker://10.0.0.2:1050".into()),
            NameReply::Names(vec!["A".into(), "B".into()]),
            NameReply::Names(Vec::new()),
            NameReply::Fault(BrokerFault::new(FaultKind::NotFound, "no service bound as 'X'")),
        ];
        for reply in replies {
            assert_eq!(NameReply::decode(&reply.encode()).unwrap(), reply);
        }
    }

    #[test]
    fn bind_requires_endpoint() {
        let xml = r#"<call op="bind"><name>Records</name></call>"#;
        assert!(matches!(
            NameRequest::decode(xml),
            Err(ProtocolError::InvalidEnvelope(_))
        ));
        assert!(NameRequest::decode(r#"<call op="getRecord"/>"#).is_err());
    }
}
