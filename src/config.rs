//! Configuration System
//!
//! Hierarchical configuration: built-in defaults, the user config file,
//! the workspace `numctx.toml`, then `NUMCTX__*` environment variables
//! (for example `NUMCTX__CONTEXT__LENGTH_POLICY=reject`).

use crate::context::{NumericContext, ValueKinds};
use crate::delegate::{ContextDelegate, DefaultDelegate, LengthPolicy};
use crate::error::ConfigError;
use crate::logging::{parse_destination, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumctxConfig {
    /// Defaults for leaf contexts
    #[serde(default)]
    pub context: ContextConfig,

    /// Snapshot settings
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How leaf contexts are built
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// What happens when an array of a different length is stored
    #[serde(default)]
    pub length_policy: LengthPolicy,

    /// Reject everything but arrays
    #[serde(default)]
    pub arrays_only: bool,
}

impl ContextConfig {
    pub fn delegate(&self) -> Arc<dyn ContextDelegate> {
        Arc::new(DefaultDelegate::with_policy(self.length_policy))
    }

    /// A fresh leaf configured from this section
    pub fn build_leaf(&self) -> NumericContext {
        let kinds = if self.arrays_only {
            ValueKinds::ArraysOnly
        } else {
            ValueKinds::Any
        };
        NumericContext::with_delegate(self.delegate()).with_kinds(kinds)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Fail instead of skipping values that cannot be stored
    #[serde(default)]
    pub strict: bool,
}

/// A configuration problem found by [`NumctxConfig::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub section: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.section, self.message)
    }
}

impl std::error::Error for ValidationError {}

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

impl NumctxConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();
        let logging = |message: String| ValidationError {
            section: "logging",
            message,
        };

        if !LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(logging(format!("unknown level '{}'", self.logging.level)));
        }
        if self.logging.format != "json" && self.logging.format != "text" {
            errors.push(logging(format!(
                "format must be 'json' or 'text', got '{}'",
                self.logging.format
            )));
        }
        if let Err(e) = parse_destination(&self.logging.output) {
            errors.push(logging(e.to_string()));
        }
        for (module, level) in &self.logging.modules {
            if !LEVELS.contains(&level.as_str()) {
                errors.push(logging(format!("unknown level '{}' for '{}'", level, module)));
            }
        }
        if self.logging.output == "file" && self.logging.file.as_os_str().is_empty() {
            errors.push(logging("file output needs a file path".to_string()));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Builds [`NumctxConfig`] from its layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace
    pub fn load(workspace_root: &Path) -> Result<NumctxConfig, ConfigError> {
        let builder = config::Config::builder();
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(
            config::Environment::with_prefix("NUMCTX")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let config: NumctxConfig = builder.build()?.try_deserialize()?;
        debug!(root = %workspace_root.display(), "configuration loaded");
        Ok(config)
    }

    /// Load a single configuration file, without the other layers
    pub fn load_from_file(path: &Path) -> Result<NumctxConfig, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Load(format!(
                "configuration file {} does not exist",
                path.display()
            )));
        }
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}
