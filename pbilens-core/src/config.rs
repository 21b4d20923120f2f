use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// File name looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "pbilens.toml";

/// Top-level pbilens configuration, matching `pbilens.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LensConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub report: ReportSection,
}

impl LensConfig {
    /// Load a config file. Missing sections fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `./pbilens.toml` if present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let local = Path::new(DEFAULT_CONFIG_FILE);
                if local.exists() {
                    Self::load(local)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extractor.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "extractor.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.extractor.interpreter.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "extractor.interpreter must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub db_path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("powerbi_metadata.db"),
        }
    }
}

/// How to reach the external model-extraction capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Interpreter that runs the probe script (the environment with `pbixray` installed).
    pub interpreter: PathBuf,
    /// Extra directory prepended to the interpreter's import path.
    pub library_dir: Option<PathBuf>,
    /// Use this script instead of the embedded probe.
    pub script: Option<PathBuf>,
    /// Hard bound on one extraction, in seconds.
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            library_dir: None,
            script: None,
            timeout_secs: 30,
        }
    }
}

impl ExtractorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    /// Default row limit for sharing reports (0 = unlimited).
    pub top_n: usize,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self { top_n: 20 }
    }
}
