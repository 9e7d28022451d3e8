//! CLI route: single route table and run context.

use crate::block::Block;
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{
    format_block_summary, format_context_json, format_context_text, format_skipped,
};
use crate::config::{ConfigLoader, NumctxConfig};
use crate::context::{Context, NumericContext};
use crate::error::CliError;
use crate::snapshot;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Runtime context for CLI execution: the loaded configuration and
/// workspace root.
pub struct RunContext {
    config: NumctxConfig,
    workspace_root: PathBuf,
}

impl RunContext {
    /// Load configuration from `config_path`, or from the layered sources
    /// rooted at `workspace_root`.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let config = match config_path {
            Some(ref path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&workspace_root)?,
        };
        if let Err(errors) = config.validate() {
            let joined = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CliError::Argument(joined));
        }
        Ok(Self::with_config(workspace_root, config))
    }

    pub fn with_config(workspace_root: PathBuf, config: NumctxConfig) -> Self {
        Self {
            config,
            workspace_root,
        }
    }

    pub fn config(&self) -> &NumctxConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Relative paths resolve against the workspace root
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn read_block(&self, path: &Path) -> Result<Block, CliError> {
        let path = self.resolve(path);
        let source = std::fs::read_to_string(&path).map_err(|source| CliError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Block::from_source(&source)?)
    }

    /// A configured leaf, optionally seeded from a snapshot file
    fn open_leaf(&self, snapshot_path: Option<&Path>) -> Result<NumericContext, CliError> {
        let leaf = self.config.context.build_leaf();
        if let Some(path) = snapshot_path {
            let path = self.resolve(path);
            let bytes = std::fs::read(&path).map_err(|source| CliError::Read {
                path: path.display().to_string(),
                source,
            })?;
            snapshot::restore_into(&bytes, &leaf)?;
        }
        Ok(leaf)
    }

    fn render(&self, context: &dyn Context, format: OutputFormat) -> Result<String, CliError> {
        match format {
            OutputFormat::Text => format_context_text(context),
            OutputFormat::Json => format_context_json(context),
        }
    }

    /// Execute a command and return its printable output
    pub fn execute(&self, command: &Commands) -> Result<String, CliError> {
        let started = Instant::now();
        let output = match command {
            Commands::Run {
                block,
                snapshot: seed,
                save,
                format,
            } => {
                let parsed = self.read_block(block)?;
                let leaf = self.open_leaf(seed.as_deref())?;
                parsed.execute(&leaf)?;
                let mut output = self.render(&leaf, *format)?;
                if let Some(path) = save {
                    let snap = snapshot::snapshot_with(&leaf, &self.config.snapshot)?;
                    snap.save(&self.resolve(path))?;
                    if !snap.skipped().is_empty() && *format == OutputFormat::Text {
                        output.push('\n');
                        output.push_str(&format_skipped(snap.skipped()));
                    }
                }
                output
            }
            Commands::Inspect {
                block,
                inputs,
                outputs,
            } => {
                let parsed = self.read_block(block)?;
                if inputs.is_empty() && outputs.is_empty() {
                    format_block_summary(&parsed)
                } else {
                    let inputs: Vec<&str> = inputs.iter().map(String::as_str).collect();
                    let outputs: Vec<&str> = outputs.iter().map(String::as_str).collect();
                    parsed.restrict(&inputs, &outputs)?.to_string()
                }
            }
            Commands::Show { snapshot, format } => {
                let leaf = self.open_leaf(Some(snapshot))?;
                self.render(&leaf, *format)?
            }
        };
        info!(
            command = command_name(command),
            duration_ms = started.elapsed().as_millis() as u64,
            "command finished"
        );
        Ok(output)
    }
}

pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Run { .. } => "run",
        Commands::Inspect { .. } => "inspect",
        Commands::Show { .. } => "show",
    }
}
