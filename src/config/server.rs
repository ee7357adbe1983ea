//! Server configuration types.
//!
//! Listen address and port for the HTTP service. Default values are sourced
//! from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_HTTP_PORT, DEFAULT_LISTEN_ADDRESS};

fn default_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_HTTP_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    /// Listen port (`http_port` accepted for older config files)
    #[serde(default = "default_port", alias = "http_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Socket address in `host:port` form
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
