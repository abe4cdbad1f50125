//! Daemon configuration: optional TOML file plus command-line overrides

use std::net::IpAddr;
use std::path::Path;

use anyhow::{Context, Result};
use ftl_transport::{DeliveryPolicy, ServerConfig};
use serde::Deserialize;

const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of the configuration file
///
/// ```toml
/// log_level = "debug"
///
/// [server]
/// bind = "127.0.0.1"
/// port = 6969
/// delivery = "first-client"
/// max_line_length = 65536
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub log_level: Option<String>,
    pub server: ServerConfig,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Values given on the command line; each one wins over the file
#[derive(Debug, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub bind: Option<IpAddr>,
    pub delivery: Option<DeliveryPolicy>,
    pub log_level: Option<String>,
}

/// Effective daemon settings
#[derive(Debug)]
pub struct Settings {
    pub server: ServerConfig,
    pub log_level: String,
}

impl Settings {
    pub fn resolve(file: Option<FileConfig>, overrides: Overrides) -> Self {
        let file = file.unwrap_or_default();
        let mut server = file.server;

        if let Some(port) = overrides.port {
            server.port = port;
        }
        if let Some(bind) = overrides.bind {
            server.bind = bind;
        }
        if let Some(delivery) = overrides.delivery {
            server.delivery = delivery;
        }

        let log_level = overrides
            .log_level
            .or(file.log_level)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        Self { server, log_level }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::resolve(None, Overrides::default());
        assert_eq!(settings.server, ServerConfig::default());
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_load_file() {
        let file = write_config(
            r#"
            log_level = "debug"

            [server]
            bind = "127.0.0.1"
            port = 7100
            delivery = "all-clients"
            "#,
        );

        let config = FileConfig::load(file.path()).unwrap();
        let settings = Settings::resolve(Some(config), Overrides::default());

        assert_eq!(settings.server.addr().to_string(), "127.0.0.1:7100");
        assert_eq!(settings.server.delivery, DeliveryPolicy::AllClients);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_overrides_win() {
        let file = write_config("log_level = \"warn\"\n[server]\nport = 7100\n");
        let config = FileConfig::load(file.path()).unwrap();

        let overrides = Overrides {
            port: Some(7200),
            delivery: Some(DeliveryPolicy::FirstClient),
            log_level: Some("trace".into()),
            ..Overrides::default()
        };
        let settings = Settings::resolve(Some(config), overrides);

        assert_eq!(settings.server.port, 7200);
        assert_eq!(settings.log_level, "trace");
    }

    #[test]
    fn test_unknown_key_rejected() {
        let file = write_config("prot = 1\n");
        assert!(FileConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_unknown_server_key_rejected() {
        let file = write_config("[server]\nprot = 7100\n");
        let err = FileConfig::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("prot"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
