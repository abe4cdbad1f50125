//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use ftl_protocol::DEFAULT_MAX_LINE_LENGTH;
use serde::{Deserialize, Serialize};

/// Port the simple protocol listens on unless configured otherwise
pub const DEFAULT_PORT: u16 = 6969;

/// Which connected clients receive robot-to-client lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryPolicy {
    /// Only the longest-connected client
    #[default]
    FirstClient,
    /// Every connected client
    AllClients,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub delivery: DeliveryPolicy,
    /// Longest unterminated line kept per session before it is discarded
    pub max_line_length: usize,
}

impl ServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            delivery: DeliveryPolicy::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 6969);
        assert_eq!(config.delivery, DeliveryPolicy::FirstClient);
        assert_eq!(config.addr().to_string(), "0.0.0.0:6969");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServerConfig = toml::from_str(
            r#"
            port = 7000
            delivery = "all-clients"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 7000);
        assert_eq!(config.delivery, DeliveryPolicy::AllClients);
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = toml::from_str::<ServerConfig>("prot = 7000\n").unwrap_err();
        assert!(err.to_string().contains("prot"));
    }
}
