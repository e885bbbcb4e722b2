//! Info command implementation.

use super::connect_broker;

/// Runs the info command.
pub async fn run(endpoint: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = connect_broker(endpoint).await?;
    let available = client.is_available().await?;
    println!("{}", client.node_info().await?);
    println!("Available: {}", if available { "yes" } else { "no" });

    let patients = client.list_patients().await?;
    println!("Patients ({}):", patients.len());
    for id in patients {
        println!("  {id}");
    }
    Ok(())
}
