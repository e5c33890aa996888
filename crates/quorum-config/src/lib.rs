//! Server configuration, loaded from a TOML file with sane defaults.
//!
//! Every section is optional; a missing file just means defaults. The bind
//! port can be overridden with `QUORUM_PORT` for deployments that inject it.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub crossref: CrossrefConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the SQLite file and uploaded artifacts.
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrossrefConfig {
    /// Contact address sent in the User-Agent, per CrossRef etiquette.
    pub contact_email: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            crossref: CrossrefConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8090 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("data") }
    }
}

impl Default for CrossrefConfig {
    fn default() -> Self {
        Self { contact_email: "quorum@example.org".to_string() }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&text)?;
        config.apply_env();
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            info!(path = %path.as_ref().display(), "loading config");
            Self::load(path)
        } else {
            let mut config = Config::default();
            config.apply_env();
            Ok(config)
        }
    }

    fn apply_env(&mut self) {
        if let Ok(port) = std::env::var("QUORUM_PORT") {
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage.data_dir.join("quorum.db")
    }

    pub fn files_dir(&self) -> PathBuf {
        self.storage.data_dir.join("files")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let config = Config::load_or_default("/definitely/not/there.toml").unwrap();
        assert_eq!(config.server.port, 8090);
        assert_eq!(config.storage.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[server]\nport = 9000").unwrap();
        let config = Config::load(f.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.crossref.contact_email, "quorum@example.org");
    }

    #[test]
    fn derived_paths() {
        let config = Config::default();
        assert!(config.database_path().ends_with("quorum.db"));
        assert!(config.files_dir().ends_with("files"));
        assert_eq!(config.bind_addr(), "127.0.0.1:8090");
    }
}
