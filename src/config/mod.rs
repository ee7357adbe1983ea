// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

mod handler;
mod server;

pub use handler::{HandlerConfig, S3Config};
pub use server::ServerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Top-level listen port of older JSON files; overrides `server.port`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    pub handlers: Vec<HandlerConfig>,
}

impl Config {
    /// Parse a YAML (or JSON) document, substituting `${VAR_NAME}` references
    /// with environment variable values first
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        let mut config: Config =
            serde_yaml::from_str(&substituted).map_err(|e| e.to_string())?;
        if let Some(port) = config.http_port {
            config.server.port = port;
        }
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.handlers.is_empty() {
            return Err("At least one handler must be configured".to_string());
        }

        let mut seen_prefixes = HashSet::new();

        for handler in &self.handlers {
            let prefix = handler.route_prefix();

            if prefix.is_empty() {
                return Err("Handler name cannot be empty when no prefix is set".to_string());
            }

            if prefix.contains('/') {
                return Err(format!(
                    "Handler '{}' has route prefix '{}' containing '/'",
                    handler.name, prefix
                ));
            }

            if !seen_prefixes.insert(prefix) {
                return Err(format!(
                    "Duplicate route prefix '{}' found in handler '{}'",
                    prefix, handler.name
                ));
            }

            if handler.cache_ttl().is_enabled() && handler.cache_path.as_os_str().is_empty() {
                return Err(format!(
                    "Handler '{}' has caching enabled but no cache_path",
                    handler.name
                ));
            }

            if handler.s3.timeout == 0 {
                return Err(format!(
                    "Handler '{}' has S3 timeout 0. Timeout must be > 0 seconds.",
                    handler.name
                ));
            }

            if handler.s3.bucket.is_empty() {
                // Not fatal: every request to this handler is served the fallback image
                tracing::warn!(handler = %handler.name, "Handler has no bucket configured");
            }
        }

        Ok(())
    }
}
