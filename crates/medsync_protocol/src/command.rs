//! Socket text protocol grammar.
//!
//! Requests and replies are single lines:
//!
//! | Request                  | Reply                                    |
//! |--------------------------|------------------------------------------|
//! | `GET_RECORD:<patientId>` | `RECORD:<xml>` or `ERROR: Record not found` |
//! | `SEND_RECORD:<xml>`      | `SUCCESS: Record saved as <ref>` or `ERROR: <msg>` |
//! | `REPLICATE_RECORD:<origin>:<xml>` | same as `SEND_RECORD`           |
//! | anything else            | `ERROR: Unknown command`                 |
//!
//! `REPLICATE_RECORD` carries a peer push. The receiving node stores the
//! record but does not forward it to its own peers.

use crate::error::{ProtocolError, ProtocolResult};
use std::fmt;

/// Error message for a lookup miss.
pub const RECORD_NOT_FOUND: &str = "Record not found";

/// Error message for an unrecognized request.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

const GET_RECORD: &str = "GET_RECORD";
const SEND_RECORD: &str = "SEND_RECORD";
const REPLICATE_RECORD: &str = "REPLICATE_RECORD";
const RECORD_PREFIX: &str = "RECORD:";
const SAVED_PREFIX: &str = "SUCCESS: Record saved as ";
const ERROR_PREFIX: &str = "ERROR: ";

/// A parsed socket request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Fetch the record stored for a patient.
    GetRecord {
        /// Patient identifier, trimmed.
        patient_id: String,
    },
    /// Store and propagate a record.
    SendRecord {
        /// Undecoded wire document.
        payload: String,
    },
    /// Store a record pushed by a peer, without forwarding it.
    ReplicateRecord {
        /// Node id of the pushing peer. Never contains `<`.
        origin: String,
        /// Undecoded wire document.
        payload: String,
    },
    /// Any line that does not match a known verb.
    Unknown(String),
}

impl Command {
    /// Parses one request line.
    ///
    /// The verb is everything before the first `:` and must match exactly.
    /// Parsing never fails; unrecognized input becomes [`Command::Unknown`].
    pub fn parse(line: &str) -> Self {
        match line.split_once(':') {
            Some((GET_RECORD, rest)) => Command::GetRecord {
                patient_id: rest.trim().to_string(),
            },
            Some((SEND_RECORD, rest)) => Command::SendRecord {
                payload: rest.to_string(),
            },
            Some((REPLICATE_RECORD, rest)) => {
                // The payload starts at the first '<'; the origin sits before it.
                let split = rest
                    .find('<')
                    .and_then(|start| Some((rest[..start].strip_suffix(':')?, &rest[start..])));
                match split {
                    Some((origin, payload)) => Command::ReplicateRecord {
                        origin: origin.to_string(),
                        payload: payload.to_string(),
                    },
                    None => Command::Unknown(line.to_string()),
                }
            }
            _ => Command::Unknown(line.to_string()),
        }
    }

    /// Renders the request line, without a terminator.
    pub fn to_line(&self) -> String {
        match self {
            Command::GetRecord { patient_id } => format!("{GET_RECORD}:{patient_id}"),
            Command::SendRecord { payload } => format!("{SEND_RECORD}:{payload}"),
            Command::ReplicateRecord { origin, payload } => {
                format!("{REPLICATE_RECORD}:{origin}:{payload}")
            }
            Command::Unknown(line) => line.clone(),
        }
    }
}

/// A socket reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A wire document.
    Record(String),
    /// The record was stored under `reference`.
    Saved {
        /// Where the record was saved.
        reference: String,
    },
    /// The request failed.
    Error(String),
}

impl Reply {
    /// Reply for a lookup miss.
    pub fn not_found() -> Self {
        Reply::Error(RECORD_NOT_FOUND.to_string())
    }

    /// Reply for an unrecognized request.
    pub fn unknown_command() -> Self {
        Reply::Error(UNKNOWN_COMMAND.to_string())
    }

    /// Renders the reply line, without a terminator.
    pub fn to_line(&self) -> String {
        match self {
            Reply::Record(xml) => format!("{RECORD_PREFIX}{xml}"),
            Reply::Saved { reference } => format!("{SAVED_PREFIX}{reference}"),
            Reply::Error(message) => format!("{ERROR_PREFIX}{message}"),
        }
    }

    /// Parses a reply line received by a client.
    pub fn parse(line: &str) -> ProtocolResult<Self> {
        if let Some(xml) = line.strip_prefix(RECORD_PREFIX) {
            Ok(Reply::Record(xml.to_string()))
        } else if let Some(reference) = line.strip_prefix(SAVED_PREFIX) {
            Ok(Reply::Saved {
                reference: reference.to_string(),
            })
        } else if let Some(message) = line.strip_prefix(ERROR_PREFIX) {
            Ok(Reply::Error(message.to_string()))
        } else {
            Err(ProtocolError::UnexpectedReply(line.to_string()))
        }
    }

    /// Returns true if this reply signals a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Reply::Error(m) if m == RECORD_NOT_FOUND)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_verbs() {
        assert_eq!(
            Command::parse("GET_RECORD: PAT42 "),
            Command::GetRecord {
                patient_id: "PAT42".into()
            }
        );
        assert_eq!(
            Command::parse("SEND_RECORD:<a>x:y</a>"),
            Command::SendRecord {
                payload: "<a>x:y</a>".into()
            }
        );
    }

    #[test]
    fn parses_replicate_with_origin() {
        assert_eq!(
            Command::parse("REPLICATE_RECORD:node:a:<a>x:y</a>"),
            Command::ReplicateRecord {
                origin: "node:a".into(),
                payload: "<a>x:y</a>".into()
            }
        );
        let cmd = Command::ReplicateRecord {
            origin: String::new(),
            payload: "<r/>".into(),
        };
        assert_eq!(cmd.to_line(), "REPLICATE_RECORD::<r/>");
        assert_eq!(Command::parse(&cmd.to_line()), cmd);
    }

    #[test]
    fn everything_else_is_unknown() {
        for line in [
            "FOO:bar",
            "",
            "GET_RECORD",
            "get_record:PAT1",
            "GET_RECORDS:PAT1",
            " GET_RECORD:x",
            "REPLICATE_RECORD:A",
            "REPLICATE_RECORD:A<r/>",
        ] {
            assert!(matches!(Command::parse(line), Command::Unknown(_)), "{line:?}");
        }
    }

    #[test]
    fn command_lines() {
        let cmd = Command::GetRecord {
            patient_id: "PAT1".into(),
        };
        assert_eq!(cmd.to_line(), "GET_RECORD:PAT1");
        assert_eq!(Command::parse(&cmd.to_line()), cmd);
    }

    #[test]
    fn reply_lines() {
        assert_eq!(Reply::not_found().to_line(), "ERROR: Record not found");
        assert_eq!(Reply::unknown_command().to_line(), "ERROR: Unknown command");
        assert_eq!(
            Reply::Saved {
                reference: "patient/PAT42".into()
            }
            .to_line(),
            "SUCCESS: Record saved as patient/PAT42"
        );
        assert_eq!(Reply::Record("<r/>".into()).to_line(), "RECORD:<r/>");
    }

    #[test]
    fn parses_replies() {
        assert!(Reply::parse("ERROR: Record not found").unwrap().is_not_found());
        assert_eq!(
            Reply::parse("SUCCESS: Record saved as /tmp/PAT1.xml").unwrap(),
            Reply::Saved {
                reference: "/tmp/PAT1.xml".into()
            }
        );
        assert!(matches!(
            Reply::parse("OK"),
            Err(ProtocolError::UnexpectedReply(_))
        ));
    }
}
