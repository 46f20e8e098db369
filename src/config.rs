use crate::constants::{ANONYMOUS_PASSWORD, ANONYMOUS_USER, DEFAULT_PORT, DEFAULT_TIMEOUT_SEC};
use crate::core_engine::TransferMode;
use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;

/// Connection profile, the `[client]` table of the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    /// Accept self-signed certificates on FTPS connections.
    pub tls_accept_invalid_certs: bool,
    pub timeout_sec: u64,
    pub username: String,
    pub password: String,
    pub passive: bool,
    pub binary: bool,
    pub autoseek: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            tls: false,
            tls_accept_invalid_certs: false,
            timeout_sec: DEFAULT_TIMEOUT_SEC,
            username: ANONYMOUS_USER.to_string(),
            password: ANONYMOUS_PASSWORD.to_string(),
            passive: true,
            binary: true,
            autoseek: true,
        }
    }
}

impl ClientConfig {
    pub fn transfer_mode(&self) -> TransferMode {
        TransferMode::from_binary_flag(self.binary)
    }
}

pub fn load_config(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path))?;
    parse_config(&config_str)
        .with_context(|| format!("Failed to parse configuration file: {}", path))
}

pub fn parse_config(config_str: &str) -> Result<Config> {
    Ok(toml::from_str(config_str)?)
}

// Helper function to log configuration options
pub fn log_config(config: &ClientConfig) {
    info!("  Host: {}:{}", config.host, config.port);
    info!("  TLS: {}", config.tls);
    info!("  Timeout: {}s", config.timeout_sec);
    info!("  Username: {}", config.username);
    info!(
        "  Password: {}",
        if config.password.is_empty() { "(empty)" } else { "********" }
    );
    info!("  Passive Mode: {}", config.passive);
    info!(
        "  Transfer Mode: {}",
        if config.binary { "binary" } else { "ascii" }
    );
    info!("  Autoseek: {}", config.autoseek);
}
