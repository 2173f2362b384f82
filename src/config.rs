//! Configuration file handling.
//!
//! Settings are read from an optional `.viperview.toml`; every section and
//! field falls back to a default when absent. Command-line flags are applied
//! on top by the binary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::registry::{
    default_interpreter, InterpreterRegistry, PackageRegistry, SitePackagesRegistry,
};

/// Name of the config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".viperview.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Which Python environment to inspect.
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Table and chart settings.
    #[serde(default)]
    pub display: DisplayConfig,

    /// Export settings.
    #[serde(default)]
    pub export: ExportConfig,
}

/// Python environment settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentConfig {
    /// Interpreter used to locate site-packages. Defaults to the active
    /// virtualenv's interpreter, then `python3`.
    #[serde(default)]
    pub python: Option<String>,

    /// Explicit site-packages directories. When set the interpreter is
    /// not consulted.
    #[serde(default)]
    pub site_packages: Vec<PathBuf>,
}

/// Display settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayConfig {
    /// Number of bars in the largest-packages chart.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_top_n() -> usize {
    20
}

/// Export settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportConfig {
    /// File written by the TUI export key.
    #[serde(default = "default_export_path")]
    pub path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            path: default_export_path(),
        }
    }
}

fn default_export_path() -> PathBuf {
    PathBuf::from("viperview_packages.csv")
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// The interpreter to query, falling back to [`default_interpreter`].
    pub fn python(&self) -> String {
        self.environment
            .python
            .clone()
            .unwrap_or_else(default_interpreter)
    }

    /// Builds the registry this configuration points at.
    ///
    /// Explicit directories are read directly; otherwise the interpreter is
    /// asked for its site-packages on every pass.
    pub fn registry(&self) -> Box<dyn PackageRegistry + Send + Sync> {
        if self.environment.site_packages.is_empty() {
            Box::new(InterpreterRegistry::new(self.python()))
        } else {
            Box::new(SitePackagesRegistry::new(
                self.environment.site_packages.clone(),
            ))
        }
    }

    /// Generate a default configuration file as a TOML string.
    pub fn default_toml() -> String {
        format!(
            r#"# viperview configuration

[environment]
# Interpreter used to locate site-packages (defaults to $VIRTUAL_ENV's python, then python3)
# python = "python3"
# Explicit site-packages directories; skips the interpreter when set
site_packages = []

[display]
# Number of packages in the largest-packages chart
top_n = {}

[export]
# File written by the export key in the TUI
path = "{}"
"#,
            default_top_n(),
            default_export_path().display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.environment.python.is_none());
        assert!(config.environment.site_packages.is_empty());
        assert_eq!(config.display.top_n, 20);
        assert_eq!(config.export.path, PathBuf::from("viperview_packages.csv"));
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse("[display]\ntop_n = 5\n").unwrap();
        assert_eq!(config.display.top_n, 5);
        assert_eq!(config.export, ExportConfig::default());
        assert_eq!(config.environment, EnvironmentConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
[environment]
python = "/opt/venv/bin/python"
site_packages = ["/opt/venv/lib/python3.12/site-packages"]

[display]
top_n = 30

[export]
path = "out.csv"
"#;
        let config = Config::parse(content).unwrap();
        assert_eq!(config.python(), "/opt/venv/bin/python");
        assert_eq!(
            config.environment.site_packages,
            vec![PathBuf::from("/opt/venv/lib/python3.12/site-packages")]
        );
        assert_eq!(config.display.top_n, 30);
        assert_eq!(config.export.path, PathBuf::from("out.csv"));
    }

    #[test]
    fn test_default_toml_round_trips() {
        let config = Config::parse(&Config::default_toml()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_invalid_file_has_context() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[display]\ntop_n = \"many\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_registry_uses_explicit_dirs() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.environment.site_packages = vec![dir.path().to_path_buf()];
        config.environment.python = Some("/definitely/not/a/python".to_string());

        // The interpreter is never consulted when directories are given
        let packages = config.registry().packages().unwrap();
        assert!(packages.is_empty());
    }

    #[test]
    fn test_registry_with_missing_interpreter_is_unavailable() {
        let mut config = Config::default();
        config.environment.python = Some("/definitely/not/a/python".to_string());

        let err = config.registry().packages().unwrap_err();
        assert!(err.to_string().contains("/definitely/not/a/python"));
    }
}
