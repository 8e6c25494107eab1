pub mod credentials;
pub mod logging;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use credentials::{Credentials, CredentialsError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ai: AIConfig,
    pub server: ServerConfig,
    pub reports: ReportConfig,
    pub database: DatabaseConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ai: AIConfig::default(),
            server: ServerConfig::default(),
            reports: ReportConfig::default(),
            database: DatabaseConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AIConfig {
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    /// Upper bound on tool rounds before the agent gives up on a question.
    pub max_iterations: usize,
    pub timeout_secs: u64,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            base_url: "https://api.openai.com".to_string(),
            api_key: None,
            temperature: 0.7,
            max_iterations: 15,
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("reports"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// YAML file holding the connection credentials. When absent the
    /// `RDS_*` environment variables are used.
    pub credentials_file: Option<PathBuf>,
    /// Explicit connection url. Only `sqlite:` urls are honoured; Postgres
    /// always goes through [`Credentials`].
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn sqlite_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| url.starts_with("sqlite:"))
    }
}

impl AppConfig {
    /// Reads the config from `TABLETALK_CONFIG` or `~/.config/tabletalk/config.toml`,
    /// falling back to defaults when the file is missing or broken.
    pub fn get_or_default() -> Self {
        let mut conf = match Self::default_path() {
            Some(path) => Self::load(&path).unwrap_or_else(|err| {
                if path.exists() {
                    tracing::warn!(path = %path.display(), error = %err, "ignoring config file");
                }
                AppConfig::default()
            }),
            None => AppConfig::default(),
        };
        conf.apply_overrides(|key| std::env::var(key).ok());
        conf
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`AppConfig::load`] but with environment overrides applied.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut conf = Self::load(path)?;
        conf.apply_overrides(|key| std::env::var(key).ok());
        Ok(conf)
    }

    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TABLETALK_CONFIG") {
            return Some(PathBuf::from(path));
        }
        let home_dir = std::env::var("HOME").ok()?;
        Some(PathBuf::from(format!("{home_dir}/.config/tabletalk/config.toml")))
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.ai.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.is_empty()) {
            self.ai.base_url = url;
        }
        if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.is_empty()) {
            self.database.url = Some(url);
        }
    }
}
