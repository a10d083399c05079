use std::path::PathBuf;

use sl_domain::config::{Config, SerialProviderKind};

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
}

#[test]
fn default_logs_use_txt_in_logs_dir() {
    let config = Config::default();
    assert_eq!(config.logs.dir, PathBuf::from("logs"));
    assert_eq!(config.logs.extension, "txt");
    assert!(config.logs.default_name.is_none());
}

#[test]
fn default_serial_is_system_at_9600() {
    let config = Config::default();
    assert_eq!(config.serial.provider, SerialProviderKind::System);
    assert_eq!(config.serial.default_baud_rate, 9600);
    assert_eq!(config.serial.delimiter, "\r\n");
}

#[test]
fn default_cors_allows_only_localhost() {
    let config = Config::default();
    assert!(config
        .server
        .cors
        .allowed_origins
        .contains(&"http://localhost:*".to_string()));
    assert!(config
        .server
        .cors
        .allowed_origins
        .contains(&"http://127.0.0.1:*".to_string()));
}

#[test]
fn full_file_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8080

[logs]
dir = "/var/log/seriallog"
default_name = "bench"

[serial]
provider = "mock"
mock_ports = ["COM1"]

[observability]
service_name = "bench-logger"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.logs.dir, PathBuf::from("/var/log/seriallog"));
    assert_eq!(config.logs.default_name.as_deref(), Some("bench"));
    assert_eq!(config.serial.provider, SerialProviderKind::Mock);
    assert_eq!(config.serial.mock_ports, vec!["COM1"]);
    assert_eq!(config.observability.service_name, "bench-logger");
}

#[test]
fn out_of_range_sample_rate_is_an_error() {
    let mut config = Config::default();
    config.observability.sample_rate = 1.5;
    assert!(config
        .validate()
        .iter()
        .any(|e| e.field == "observability.sample_rate"));
}
