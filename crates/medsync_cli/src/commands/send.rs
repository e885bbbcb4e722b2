//! Send command implementation.

use super::Client;
use medsync_protocol::{Record, RecordCodec};
use std::path::Path;

/// Reads and decodes a record document.
pub fn load(path: &Path) -> Result<Record, Box<dyn std::error::Error>> {
    let xml = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    Ok(RecordCodec::decode_str(&xml)?)
}

/// Sends a record; returns a line describing where it went.
pub async fn send(endpoint: &str, record: &Record) -> Result<String, Box<dyn std::error::Error>> {
    match Client::connect(endpoint).await? {
        Client::Socket(mut client) => {
            let reference = client.send_record(record).await?;
            Ok(format!("Record saved as {reference}"))
        }
        Client::Broker(mut client) => {
            client.sync_record(record).await?;
            Ok(format!("Record {} synced", record.patient_id()))
        }
    }
}

/// Runs the send command.
pub async fn run(endpoint: &str, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let record = load(path)?;
    println!("{}", send(endpoint, &record).await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsync_core::CoordinatorConfig;
    use medsync_server::{BrokerConfig, Node, NodeConfig, SocketConfig};
    use medsync_testkit::record_with_history;

    #[test]
    fn loads_document_with_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("record.xml");
        let record = record_with_history("PAT12");
        std::fs::write(&path, RecordCodec::encode_document(&record)).unwrap();

        assert_eq!(load(&path).unwrap(), record);
    }

    #[test]
    fn missing_or_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.xml")).is_err());

        let path = dir.path().join("bad.xml");
        std::fs::write(&path, "<medicalRecord>").unwrap();
        assert!(load(&path).is_err());
    }

    #[tokio::test]
    async fn sends_over_both_transports() {
        let config = NodeConfig::new(CoordinatorConfig::new("A"))
            .with_socket(SocketConfig::new("127.0.0.1:0".parse().unwrap()))
            .with_broker(BrokerConfig::new("127.0.0.1:0".parse().unwrap()));
        let node = Node::start(config).await.unwrap();

        let socket = format!("socket://{}", node.socket_addr().unwrap());
        let line = send(&socket, &record_with_history("PAT1")).await.unwrap();
        assert_eq!(line, "Record saved as patient/PAT1");

        let broker = format!("broker://{}", node.broker_addr().unwrap());
        let line = send(&broker, &record_with_history("PAT2")).await.unwrap();
        assert_eq!(line, "Record PAT2 synced");

        assert_eq!(node.coordinator().patient_ids(), vec!["PAT1", "PAT2"]);
        node.shutdown().await;
    }
}
