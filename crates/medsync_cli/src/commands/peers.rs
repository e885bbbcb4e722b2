//! Register and unregister command implementations.

use super::connect_broker;

/// Registers a peer on the node behind `broker`.
pub async fn register(
    broker: &str,
    node_id: &str,
    endpoint: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    connect_broker(broker)
        .await?
        .register_node(node_id, endpoint)
        .await?;
    println!("Registered {node_id} at {endpoint}");
    Ok(())
}

/// Removes a peer from the node behind `broker`.
pub async fn unregister(broker: &str, node_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    connect_broker(broker)
        .await?
        .unregister_node(node_id)
        .await?;
    println!("Unregistered {node_id}");
    Ok(())
}
