//! Configuration schema (viewdeploy.toml)

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Schemas whose `[name]` placeholders are substituted when none are configured
pub const DEFAULT_SCHEMAS: &[&str] = &["reporting", "warehouse", "events"];

/// Deployment target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    /// User acceptance testing
    Uat,

    /// Production
    Prod,

    /// Developer machine
    Local,
}

impl Environment {
    /// Name of the config table for this environment
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uat => "uat",
            Self::Prod => "prod",
            Self::Local => "local",
        }
    }

    /// Display name used in prompts
    pub fn label(&self) -> &'static str {
        match self {
            Self::Uat => "UAT",
            Self::Prod => "PROD",
            Self::Local => "LOCAL",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn default_check() -> bool {
    true
}

/// Settings for one environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Database host
    #[serde(default)]
    pub host: Option<String>,

    /// Database port
    #[serde(default)]
    pub port: Option<u16>,

    /// Database user
    #[serde(default)]
    pub username: Option<String>,

    /// Password, usually kept in a separate file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Ask for confirmation before deploying
    #[serde(default = "default_check")]
    pub check: bool,

    /// Schema placeholder -> real schema name
    #[serde(flatten)]
    pub schemas: BTreeMap<String, String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            username: None,
            password: None,
            check: true,
            schemas: BTreeMap::new(),
        }
    }
}

impl EnvironmentConfig {
    /// Overlay `other` on top of this table; keys set in `other` win
    fn merge(&mut self, other: EnvironmentConfig, explicit_check: bool) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.username.is_some() {
            self.username = other.username;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if explicit_check {
            self.check = other.check;
        }
        self.schemas.extend(other.schemas);
    }

    /// Real schema name for a placeholder
    pub fn schema(&self, placeholder: &str) -> Option<&str> {
        self.schemas.get(placeholder).map(String::as_str)
    }
}

fn default_schemas() -> Vec<String> {
    DEFAULT_SCHEMAS.iter().map(|s| s.to_string()).collect()
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Schema placeholders recognised in SQL files
    #[serde(default = "default_schemas")]
    pub schemas: Vec<String>,

    /// Per-environment settings keyed by environment name
    #[serde(default)]
    pub environments: HashMap<String, EnvironmentConfig>,

    /// Directory of the first loaded config file
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schemas: default_schemas(),
            environments: HashMap::new(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        tracing::debug!(path = %path.display(), environments = config.environments.len(), "loaded config");
        Ok(config)
    }

    /// Load and layer several config files; later files override earlier ones
    ///
    /// Missing files after the first are skipped, so an optional secrets
    /// file can sit next to the main config.
    pub fn from_files(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let Some((first, rest)) = paths.split_first() else {
            return Ok(Self::default());
        };

        let mut config = Self::from_file(first)?;
        for path in rest {
            if !path.exists() {
                tracing::debug!(path = %path.display(), "optional config file not found");
                continue;
            }
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
            config.merge_toml(&contents)?;
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Overlay another TOML document on this config
    pub fn merge_toml(&mut self, toml: &str) -> Result<(), ConfigError> {
        let overlay = Self::from_toml(toml)?;
        let raw: toml::Table = toml::from_str(toml).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if raw.contains_key("schemas") {
            self.schemas = overlay.schemas;
        }

        for (name, env) in overlay.environments {
            let explicit_check = raw
                .get("environments")
                .and_then(|envs| envs.get(&name))
                .is_some_and(|table| table.get("check").is_some());

            self.environments
                .entry(name)
                .or_default()
                .merge(env, explicit_check);
        }

        Ok(())
    }

    /// Settings for an environment
    pub fn environment(&self, env: Environment) -> Result<&EnvironmentConfig, ConfigError> {
        self.environments
            .get(env.as_str())
            .ok_or_else(|| ConfigError::UnknownEnvironment(env.as_str().to_string()))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Environment not found in config: {0}")]
    UnknownEnvironment(String),

    #[error("Environment '{environment}' has no mapping for schema '{schema}'")]
    MissingSchema { environment: String, schema: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[environments.uat]
host = "db.uat"
port = 3306
username = "deploy"
reporting = "reporting_uat"
warehouse = "warehouse_uat"
events = "events_uat"

[environments.prod]
host = "db.prod"
check = true
reporting = "reporting"
warehouse = "warehouse"
events = "events"
"#;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.schemas, ["reporting", "warehouse", "events"]);
        assert!(config.environments.is_empty());
    }

    #[test]
    fn parse_environments() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let uat = config.environment(Environment::Uat).unwrap();

        assert_eq!(uat.host.as_deref(), Some("db.uat"));
        assert_eq!(uat.port, Some(3306));
        assert!(uat.check);
        assert_eq!(uat.schema("warehouse"), Some("warehouse_uat"));
        assert!(uat.password.is_none());
    }

    #[test]
    fn unknown_environment() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let err = config.environment(Environment::Local).unwrap_err();
        assert_eq!(err.to_string(), "Environment not found in config: local");
    }

    #[test]
    fn overlay_secrets() {
        let mut config = Config::from_toml(SAMPLE).unwrap();
        config
            .merge_toml("[environments.prod]\npassword = \"hunter2\"\ncheck = false\n\n[environments.local]\nreporting = \"rep\"\n")
            .unwrap();

        let prod = config.environment(Environment::Prod).unwrap();
        assert_eq!(prod.password.as_deref(), Some("hunter2"));
        assert_eq!(prod.host.as_deref(), Some("db.prod"));
        assert!(!prod.check);

        // A table that does not mention `check` keeps the earlier value
        config.merge_toml("[environments.uat]\nusername = \"other\"\n").unwrap();
        assert!(config.environment(Environment::Uat).unwrap().check);

        let local = config.environment(Environment::Local).unwrap();
        assert_eq!(local.schema("reporting"), Some("rep"));
    }

    #[test]
    fn config_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("viewdeploy.toml");
        let secrets = dir.path().join("passwords.toml");
        std::fs::write(&main, SAMPLE).unwrap();
        std::fs::write(&secrets, "[environments.uat]\npassword = \"pw\"\n").unwrap();

        let config = Config::from_files(&[main, secrets, dir.path().join("missing.toml")]).unwrap();

        assert_eq!(config.project_root, dir.path());
        assert_eq!(config.environment(Environment::Uat).unwrap().password.as_deref(), Some("pw"));
    }

    #[test]
    fn invalid_toml() {
        assert!(matches!(Config::from_toml("schemas = 3"), Err(ConfigError::ParseError(_))));
    }
}
