//! Configuration System
//!
//! Layered configuration for scan behavior and logging. Sources, lowest
//! precedence first: built-in defaults, the global config file, an
//! explicit `--config` file, then `MIRROR__SECTION__KEY` environment
//! variables.

use crate::logging::LoggingConfig;
use crate::tree::hasher::DEFAULT_CHUNK_SIZE;
use crate::tree::path::NameCodec;
use crate::tree::probe::MetadataProbe;
use crate::tree::scanner::TreeScanner;
use serde::{Deserialize, Serialize};

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Scanner and digest settings
    #[serde(default)]
    pub scan: ScanConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scanner and digest settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Bytes read per chunk while digesting a file
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Accept file names that are not valid UTF-8, escaping the invalid
    /// bytes (and `%`) as `%XX` in store keys
    #[serde(default)]
    pub lossy_names: bool,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            lossy_names: false,
        }
    }
}

impl ScanConfig {
    pub fn name_codec(&self) -> NameCodec {
        if self.lossy_names {
            NameCodec::lossy()
        } else {
            NameCodec::strict()
        }
    }

    pub fn scanner(&self) -> TreeScanner {
        TreeScanner::new(self.name_codec())
    }

    pub fn probe(&self) -> MetadataProbe {
        MetadataProbe::new(self.chunk_size)
    }

    /// Validate scan configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Scan(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Scan(msg) => write!(f, "Scan: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl MirrorConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.scan.validate() {
            errors.push(ValidationError::Scan(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
