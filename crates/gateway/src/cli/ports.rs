use sl_domain::config::Config;

use crate::bootstrap::build_provider;

/// Print the ports the configured provider reports.
pub fn list(config: &Config, json: bool) -> anyhow::Result<()> {
    let ports = build_provider(config).list_ports()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    for port in &ports {
        match &port.manufacturer {
            Some(m) => println!("{:<24} {:<10} {m}", port.path, port.port_type),
            None => println!("{:<24} {}", port.path, port.port_type),
        }
    }
    Ok(())
}
