//! Process settings from the environment (`.env` is honoured by the binary via dotenvy).

use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind: SocketAddr,
    pub max_connections: u32,
    pub manifest_dir: Option<PathBuf>,
    pub public_dir: Option<PathBuf>,
    pub allow_cors: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSetting("DATABASE_URL"))?;
        let bind_str = get("AUTOREST_BIND").unwrap_or_else(|| DEFAULT_BIND.into());
        let bind = bind_str.parse::<SocketAddr>().map_err(|_| ConfigError::InvalidSetting {
            name: "AUTOREST_BIND",
            value: bind_str.clone(),
        })?;
        let max_connections = match get("AUTOREST_MAX_CONNECTIONS") {
            Some(v) => v.parse::<u32>().map_err(|_| ConfigError::InvalidSetting {
                name: "AUTOREST_MAX_CONNECTIONS",
                value: v.clone(),
            })?,
            None => 5,
        };
        let allow_cors = get("AUTOREST_ALLOW_CORS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Ok(ServerConfig {
            database_url,
            bind,
            max_connections,
            manifest_dir: get("AUTOREST_MANIFEST_DIR").filter(|s| !s.is_empty()).map(PathBuf::from),
            public_dir: get("AUTOREST_PUBLIC_DIR").filter(|s| !s.is_empty()).map(PathBuf::from),
            allow_cors,
        })
    }
}
