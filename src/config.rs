use crate::error::{PlacesError, Result};
use crate::protocol::EmptyResultPolicy;
use crate::storage::IN_MEMORY_PATH;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub protocol: ProtocolConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL; also the redirect target when a submission has no referer.
    pub public_url: String,
    /// Directory served under `/static`.
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: "http://localhost:8080/".to_string(),
            static_dir: "static".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:` for a non-persistent store.
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/my_places.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub nonce_secret: Option<String>,
    pub nonce_lifetime_secs: u64,
    /// Bearer token for the admin routes; admin is disabled when unset.
    pub admin_token: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            nonce_secret: None,
            nonce_lifetime_secs: 86_400,
            admin_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub empty_result: EmptyResultPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: String,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_name: "my_places.log".to_string(),
        }
    }
}

impl Config {
    /// Load `path` if it exists (defaults otherwise), then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                PlacesError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else {
            Config::default()
        };
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, var: F) -> Result<()> {
        if let Some(host) = var("MY_PLACES_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("MY_PLACES_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| PlacesError::Config(format!("MY_PLACES_PORT '{port}' is not a port")))?;
        }
        if let Some(url) = var("MY_PLACES_PUBLIC_URL") {
            self.server.public_url = url;
        }
        if let Some(path) = var("MY_PLACES_DB") {
            self.database.path = path;
        }
        if let Some(secret) = var("MY_PLACES_NONCE_SECRET") {
            self.security.nonce_secret = Some(secret);
        }
        if let Some(token) = var("MY_PLACES_ADMIN_TOKEN") {
            self.security.admin_token = Some(token);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.public_url()?;
        Ok(())
    }

    pub fn public_url(&self) -> Result<Url> {
        Url::parse(&self.server.public_url).map_err(|e| {
            PlacesError::Config(format!(
                "server.public_url '{}' is not a URL: {}",
                self.server.public_url, e
            ))
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Commands whose writes must outlive the process refuse the in-memory store.
    pub fn persistent_database_path(&self) -> Result<&str> {
        if self.database.path == IN_MEMORY_PATH {
            return Err(PlacesError::Config(
                "database.path is ':memory:'; writes would be lost when the command exits".into(),
            ));
        }
        Ok(&self.database.path)
    }
}
