//! Get command implementation.

use super::Client;
use crate::Format;
use medsync_protocol::{Record, RecordCodec};

/// Fetches a record through the binding `endpoint` names.
pub async fn fetch(endpoint: &str, patient_id: &str) -> Result<Record, Box<dyn std::error::Error>> {
    let record = match Client::connect(endpoint).await? {
        Client::Socket(mut client) => client.get_record(patient_id).await?,
        Client::Broker(mut client) => client.get_record(patient_id).await?,
    };
    Ok(record)
}

/// Renders a record in the requested format.
pub fn render(record: &Record, format: Format) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        Format::Xml => RecordCodec::encode_document(record),
        Format::Json => serde_json::to_string_pretty(record)?,
    })
}

/// Runs the get command.
pub async fn run(
    endpoint: &str,
    patient_id: &str,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let record = fetch(endpoint, patient_id).await?;
    println!("{}", render(&record, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsync_core::CoordinatorConfig;
    use medsync_server::{BrokerConfig, Node, NodeConfig, SocketConfig};
    use medsync_testkit::{sample_record, SAMPLE_PATIENT_ID};

    #[tokio::test]
    async fn fetches_seeded_record_over_both_transports() {
        let config = NodeConfig::new(CoordinatorConfig::new("A"))
            .with_socket(SocketConfig::new("127.0.0.1:0".parse().unwrap()))
            .with_broker(BrokerConfig::new("127.0.0.1:0".parse().unwrap()))
            .with_sample_data();
        let node = Node::start(config).await.unwrap();

        let socket = format!("socket://{}", node.socket_addr().unwrap());
        let bare = node.socket_addr().unwrap().to_string();
        let broker = format!("broker://{}", node.broker_addr().unwrap());
        for endpoint in [&socket, &bare, &broker] {
            assert_eq!(
                fetch(endpoint, SAMPLE_PATIENT_ID).await.unwrap(),
                sample_record()
            );
        }
        assert!(fetch(&socket, "UNKNOWN").await.is_err());

        node.shutdown().await;
    }

    #[test]
    fn renders_both_formats() {
        let record = sample_record();
        let xml = render(&record, Format::Xml).unwrap();
        assert!(xml.starts_with("<?xml"));

        let json: serde_json::Value =
            serde_json::from_str(&render(&record, Format::Json).unwrap()).unwrap();
        assert!(json.to_string().contains("PAT001"));
    }
}
