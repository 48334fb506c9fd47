//! TOML run configuration.
//!
//! A run file has three sections: `[backtest]` (deserialized straight into
//! the core's `BacktestConfig`), `[data]` (where the bars come from), and
//! `[output]` (where artifacts go). Validation happens through the core's
//! `BacktestContext`, so a file that parses here but fails validation maps
//! to the bad-configuration exit code, not a panic later.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tapelab_core::config::BacktestConfig;

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub backtest: BacktestConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct DataConfig {
    /// Directory of per-symbol CSV files named `<SYMBOL>.csv`.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Explicit symbol → file map; wins over `dir` for listed symbols.
    #[serde(default)]
    pub files: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Artifact directory; defaults to `./artifacts`.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { dir: default_output_dir() }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the CSV path for one symbol.
    pub fn data_path(&self, symbol: &str) -> Result<PathBuf, ConfigError> {
        if let Some(path) = self.data.files.get(symbol) {
            return Ok(path.clone());
        }
        if let Some(dir) = &self.data.dir {
            return Ok(dir.join(format!("{symbol}.csv")));
        }
        Err(ConfigError::MissingData(symbol.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("TOML parse error: {0}")]
    Parse(String),
    #[error("no data source configured for symbol {0}")]
    MissingData(String),
}
