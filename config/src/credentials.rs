use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

/// Keys in the order they are checked.
const KEYS: [&str; 5] = ["USER", "PASSWORD", "HOST", "PORT", "DATABASE"];
const PREFIX: &str = "RDS_";

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("{0} is not set")]
    Missing(String),
    #[error("Invalid RDS_PORT. It must be an integer.")]
    InvalidPort,
    #[error("could not read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("credentials file is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("credentials file must be a mapping of keys to values")]
    NotAMapping,
}

/// Connection credentials for the database the agent talks to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Credentials {
    /// Reads the file when one is given, the `RDS_*` environment otherwise.
    pub fn load(file: Option<&Path>) -> Result<Self, CredentialsError> {
        match file {
            Some(path) => Self::from_yaml_file(path),
            None => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self, CredentialsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds credentials from any `RDS_*` key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CredentialsError> {
        let mut values = HashMap::new();
        for key in KEYS {
            let name = format!("{PREFIX}{key}");
            let value = lookup(&name).ok_or(CredentialsError::Missing(name))?;
            values.insert(key, value);
        }

        let port = values["PORT"]
            .trim()
            .parse::<u16>()
            .map_err(|_| CredentialsError::InvalidPort)?;

        Ok(Self {
            host: values["HOST"].clone(),
            port,
            user: values["USER"].clone(),
            password: values["PASSWORD"].clone(),
            database: values["DATABASE"].clone(),
        })
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, CredentialsError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Accepts `RDS_HOST: ...` as well as `host: ...`, in any case.
    pub fn from_yaml_str(contents: &str) -> Result<Self, CredentialsError> {
        let Value::Mapping(mapping) = serde_yaml::from_str::<Value>(contents)? else {
            return Err(CredentialsError::NotAMapping);
        };

        let mut entries = HashMap::new();
        for (key, value) in mapping {
            let (Some(key), Some(value)) = (key.as_str(), scalar_to_string(&value)) else {
                continue;
            };
            let key = key.to_ascii_uppercase();
            let key = key.strip_prefix(PREFIX).unwrap_or(&key).to_string();
            entries.insert(format!("{PREFIX}{key}"), value);
        }

        Self::from_lookup(|key| entries.get(key).cloned())
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "postgresql://{}:***@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .finish()
    }
}
