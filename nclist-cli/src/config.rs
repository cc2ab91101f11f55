use std::fs::read_to_string;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use nclist_core::consts::{DEFAULT_BATCH_SIZE, DEFAULT_BLOCK_SIZE};

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Copy)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Records per on-disk block
    pub block_size: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Copy)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Records fetched per call while answering a query
    pub batch_size: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

///
/// Settings for the `nclist` tool, read from a TOML file:
///
/// ```toml
/// [build]
/// block_size = 256
///
/// [query]
/// batch_size = 1024
/// ```
///
/// Every key is optional. Command-line flags take precedence over the file.
///
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Copy, Default)]
#[serde(default, deny_unknown_fields)]
pub struct NclistConfig {
    pub build: BuildConfig,
    pub query: QueryConfig,
}

#[derive(Error, Debug)]
pub enum NclistConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

pub type NclistConfigResult<T> = std::result::Result<T, NclistConfigError>;

impl NclistConfig {
    pub fn validate(&self) -> NclistConfigResult<()> {
        if self.build.block_size == 0 {
            return Err(NclistConfigError::InvalidValue(
                "build.block_size must be at least 1".to_string(),
            ));
        }
        if self.query.batch_size == 0 {
            return Err(NclistConfigError::InvalidValue(
                "query.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the file values.
    pub fn with_overrides(
        mut self,
        block_size: Option<usize>,
        batch_size: Option<usize>,
    ) -> NclistConfigResult<Self> {
        if let Some(block_size) = block_size {
            self.build.block_size = block_size;
        }
        if let Some(batch_size) = batch_size {
            self.query.batch_size = batch_size;
        }
        self.validate()?;
        Ok(self)
    }
}

impl TryFrom<&Path> for NclistConfig {
    type Error = NclistConfigError;

    fn try_from(path: &Path) -> Result<Self, Self::Error> {
        let toml_str = read_to_string(path)?;
        let config: NclistConfig = toml::from_str(&toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

///
/// Load the config file if one was given, otherwise fall back to defaults.
///
pub fn load_config(path: Option<&String>) -> NclistConfigResult<NclistConfig> {
    match path {
        Some(path) => NclistConfig::try_from(Path::new(path)),
        None => Ok(NclistConfig::default()),
    }
}
