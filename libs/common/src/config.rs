//! Tool configuration
//!
//! Layered with figment, lowest priority first:
//! 1. Built-in defaults
//! 2. `oneclick.yaml` / `oneclick.toml` in the working directory, or an
//!    explicit file (YAML, TOML or JSON by extension)
//! 3. `ONECLICK_*` environment variables, nested keys separated by `__`
//!    (e.g. `ONECLICK_LOGGING__LEVEL=debug`)

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::logging::LoggingConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "ONECLICK_";

/// Default config file names, looked up in the working directory
pub const DEFAULT_CONFIG_FILES: [&str; 2] = ["oneclick.yaml", "oneclick.toml"];

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported config format: {0} (expected .yaml, .yml, .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Invalid(Box::new(err))
    }
}

/// Save-time validation settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Replaces the built-in system-field deny-list when set
    pub excluded_fields: Option<Vec<String>>,
}

/// Evaluation context used when no host is connected
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
    /// `Display Name <unique name>` of the acting user
    pub current_user: Option<String>,
    /// Team iteration paths in schedule order
    pub iterations: Vec<String>,
    /// Current iteration path (one of `iterations`)
    pub current_iteration: Option<String>,
    /// Fixed "today" (`yyyy-MM-dd`), the local date when unset
    pub today: Option<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneClickConfig {
    pub logging: LoggingConfig,
    pub validation: ValidationSettings,
    pub context: ContextSettings,
    /// Root for per-rule decision logs; none are written when unset
    pub log_dir: Option<PathBuf>,
}

impl OneClickConfig {
    /// Load configuration from defaults, file and environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                debug!("Loading config {:?}", path);
                figment = merge_file(figment, path)?;
            },
            None => {
                for name in DEFAULT_CONFIG_FILES {
                    if Path::new(name).exists() {
                        debug!("Loading config {}", name);
                        figment = merge_file(figment, Path::new(name))?;
                    }
                }
            },
        }

        Ok(figment
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()?)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment, ConfigError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("yaml") | Some("yml") => Ok(figment.merge(Yaml::file(path))),
        Some("toml") => Ok(figment.merge(Toml::file(path))),
        Some("json") => Ok(figment.merge(Json::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OneClickConfig::load_with_prefix(None, "ONECLICK_TEST_DEFAULTS_").unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(config.validation.excluded_fields.is_none());
        assert!(config.context.iterations.is_empty());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oneclick.yaml");
        std::fs::write(
            &path,
            r#"
logging:
  level: debug
validation:
  excluded_fields: [System.Id]
context:
  current_user: Jane Doe <jane@contoso.com>
  iterations: ["Web\\Sprint 1", "Web\\Sprint 2"]
  current_iteration: "Web\\Sprint 1"
log_dir: /var/log/oneclick
"#,
        )
        .unwrap();

        let config = OneClickConfig::load_with_prefix(Some(&path), "ONECLICK_TEST_YAML_").unwrap();
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.ansi);
        assert_eq!(
            config.validation.excluded_fields,
            Some(vec!["System.Id".to_string()])
        );
        assert_eq!(
            config.context.current_user.as_deref(),
            Some("Jane Doe <jane@contoso.com>")
        );
        assert_eq!(config.context.iterations.len(), 2);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/oneclick")));
    }

    #[test]
    fn test_toml_file_and_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oneclick.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\nansi = false\n").unwrap();

        std::env::set_var("ONECLICK_TEST_ENV_LOGGING__LEVEL", "trace");
        let config = OneClickConfig::load_with_prefix(Some(&path), "ONECLICK_TEST_ENV_").unwrap();
        std::env::remove_var("ONECLICK_TEST_ENV_LOGGING__LEVEL");

        assert_eq!(config.logging.level, "trace");
        assert!(!config.logging.ansi);
    }

    #[test]
    fn test_file_errors() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            OneClickConfig::load(Some(&missing)),
            Err(ConfigError::NotFound(_))
        ));

        let ini = dir.path().join("oneclick.ini");
        std::fs::write(&ini, "level=debug").unwrap();
        assert!(matches!(
            OneClickConfig::load(Some(&ini)),
            Err(ConfigError::UnsupportedFormat(_))
        ));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "logging:\n  ansi: maybe\n").unwrap();
        assert!(matches!(
            OneClickConfig::load_with_prefix(Some(&bad), "ONECLICK_TEST_BAD_"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
