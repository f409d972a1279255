// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Bridge Configuration
//!
//! Configuration is layered: built-in defaults, then an optional TOML file, then
//! `RABBITMQ_*` / `BRIDGE_*` environment variables.
//!
//! ```toml
//! [app]
//! name = "coolq-bridge"
//!
//! [rabbitmq]
//! host = "localhost"
//! port = 5672
//! user = "guest"
//! password = "guest"
//! vhost = "/"
//!
//! [bridge]
//! msg_exchange = "coolq.msg"
//! rpc_exchange = "coolq.rpc"
//! binding_key = "#.private"
//! prefetch = 1
//! rpc = false
//! ```

use crate::errors::ConfigError;
use lapin::uri::AMQPUri;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

pub const ENV_RABBITMQ_HOST: &str = "RABBITMQ_HOST";
pub const ENV_RABBITMQ_PORT: &str = "RABBITMQ_PORT";
pub const ENV_RABBITMQ_USER: &str = "RABBITMQ_USER";
pub const ENV_RABBITMQ_PASSWORD: &str = "RABBITMQ_PASSWORD";
pub const ENV_RABBITMQ_VHOST: &str = "RABBITMQ_VHOST";
pub const ENV_BRIDGE_RPC: &str = "BRIDGE_RPC";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Reported to the broker as the connection name.
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            name: "coolq-bridge".to_owned(),
        }
    }
}

/// Broker connection parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RabbitMQConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
}

impl Default for RabbitMQConfig {
    fn default() -> Self {
        RabbitMQConfig {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: "/".to_owned(),
        }
    }
}

impl RabbitMQConfig {
    /// Builds the broker URI from its parts, so credentials and vhost are never
    /// re-parsed from a formatted string.
    pub fn amqp_uri(&self) -> AMQPUri {
        let mut uri = AMQPUri::default();
        uri.authority.userinfo.username = self.user.clone();
        uri.authority.userinfo.password = self.password.clone();
        uri.authority.host = self.host.clone();
        uri.authority.port = self.port;
        uri.vhost = self.vhost.clone();
        uri
    }
}

/// Topology names and run mode of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub msg_exchange: String,
    pub rpc_exchange: String,
    pub binding_key: String,
    pub prefetch: u16,
    /// Attach a correlation id and reply queue to every command.
    pub rpc: bool,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        BridgeSettings {
            msg_exchange: "coolq.msg".to_owned(),
            rpc_exchange: "coolq.rpc".to_owned(),
            binding_key: "#.private".to_owned(),
            prefetch: 1,
            rpc: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Configs {
    pub app: AppConfig,
    pub rabbitmq: RabbitMQConfig,
    pub bridge: BridgeSettings,
}

impl Configs {
    /// Loads the configuration from the optional file and the process environment.
    ///
    /// A missing file is not an error: the defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Configs, ConfigError> {
        let mut cfg = match path {
            Some(path) if path.exists() => Configs::from_file(path)?,
            Some(path) => {
                debug!(path = %path.display(), "config file not found, using defaults");
                Configs::default()
            }
            None => Configs::default(),
        };

        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Parses a TOML config file.
    pub fn from_file(path: &Path) -> Result<Configs, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Overrides fields with values returned by `lookup` for the known env keys.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_RABBITMQ_HOST) {
            self.rabbitmq.host = host;
        }
        if let Some(port) = lookup(ENV_RABBITMQ_PORT) {
            self.rabbitmq.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_RABBITMQ_PORT.to_owned(),
                value: port.clone(),
            })?;
        }
        if let Some(user) = lookup(ENV_RABBITMQ_USER) {
            self.rabbitmq.user = user;
        }
        if let Some(password) = lookup(ENV_RABBITMQ_PASSWORD) {
            self.rabbitmq.password = password;
        }
        if let Some(vhost) = lookup(ENV_RABBITMQ_VHOST) {
            self.rabbitmq.vhost = vhost;
        }
        if let Some(rpc) = lookup(ENV_BRIDGE_RPC) {
            self.bridge.rpc = match rpc.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        key: ENV_BRIDGE_RPC.to_owned(),
                        value: rpc,
                    })
                }
            };
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::HashMap, io::Write};

    #[test]
    fn defaults_match_local_broker() {
        let cfg = Configs::default();
        assert_eq!(cfg.rabbitmq.host, "localhost");
        assert_eq!(cfg.rabbitmq.port, 5672);
        assert_eq!(cfg.rabbitmq.user, "guest");
        assert_eq!(cfg.rabbitmq.password, "guest");
        assert_eq!(cfg.rabbitmq.vhost, "/");
        assert_eq!(cfg.bridge.msg_exchange, "coolq.msg");
        assert_eq!(cfg.bridge.rpc_exchange, "coolq.rpc");
        assert_eq!(cfg.bridge.binding_key, "#.private");
        assert_eq!(cfg.bridge.prefetch, 1);
        assert!(!cfg.bridge.rpc);
    }

    #[test]
    fn uri_is_built_from_defaults() {
        let uri = RabbitMQConfig::default().amqp_uri();
        assert_eq!(uri.authority.userinfo.username, "guest");
        assert_eq!(uri.authority.userinfo.password, "guest");
        assert_eq!(uri.authority.host, "localhost");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.vhost, "/");
    }

    #[test]
    fn uri_keeps_reserved_characters_in_credentials() {
        let cfg = RabbitMQConfig {
            user: "bot@coolq".to_owned(),
            password: "p@ss:w/rd#1".to_owned(),
            vhost: "bots/prod".to_owned(),
            ..RabbitMQConfig::default()
        };

        let uri = cfg.amqp_uri();
        assert_eq!(uri.authority.userinfo.username, "bot@coolq");
        assert_eq!(uri.authority.userinfo.password, "p@ss:w/rd#1");
        assert_eq!(uri.authority.host, "localhost");
        assert_eq!(uri.authority.port, 5672);
        assert_eq!(uri.vhost, "bots/prod");
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[rabbitmq]\nhost = \"mq.internal\"\nport = 5673\n\n[bridge]\nrpc = true"
        )
        .unwrap();

        let cfg = Configs::from_file(file.path()).unwrap();
        assert_eq!(cfg.rabbitmq.host, "mq.internal");
        assert_eq!(cfg.rabbitmq.port, 5673);
        assert_eq!(cfg.rabbitmq.user, "guest");
        assert!(cfg.bridge.rpc);
        assert_eq!(cfg.bridge.msg_exchange, "coolq.msg");
    }

    #[test]
    fn invalid_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rabbitmq]\nport = \"not a port\"").unwrap();

        let err = Configs::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Configs::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.bridge, BridgeSettings::default());
    }

    #[test]
    fn env_overrides_file_values() {
        let env = HashMap::from([
            (ENV_RABBITMQ_HOST, "10.0.0.5"),
            (ENV_RABBITMQ_PORT, "15672"),
            (ENV_RABBITMQ_VHOST, "coolq"),
            (ENV_BRIDGE_RPC, "TRUE"),
        ]);

        let mut cfg = Configs::default();
        cfg.apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(cfg.rabbitmq.host, "10.0.0.5");
        assert_eq!(cfg.rabbitmq.port, 15672);
        assert_eq!(cfg.rabbitmq.vhost, "coolq");
        assert_eq!(cfg.rabbitmq.user, "guest");
        assert!(cfg.bridge.rpc);
    }

    #[test]
    fn invalid_env_port_is_rejected() {
        let mut cfg = Configs::default();
        let err = cfg
            .apply_env(|key| (key == ENV_RABBITMQ_PORT).then(|| "http".to_owned()))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidEnv { key, .. } if key == ENV_RABBITMQ_PORT));
    }
}
