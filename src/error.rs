//! Error types for the numeric context pipeline.

use thiserror::Error;

/// Element-level failures raised by array and scalar operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("Type error: {0}")]
    Type(String),

    #[error("Division by zero")]
    ZeroDivision,

    #[error("Shape mismatch: {left} elements vs {right} elements")]
    Shape { left: usize, right: usize },

    #[error("Cannot convert {value} to {target} without losing information")]
    Narrowing { value: String, target: String },
}

/// Context-related errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContextError {
    #[error("Unknown name: {0}")]
    UnknownName(String),

    #[error("Length mismatch for '{name}': context length is {expected}, value has {found}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Invalid item '{name}': {reason}")]
    Item { name: String, reason: String },

    #[error("Value for '{name}' rejected: {reason}")]
    Rejected { name: String, reason: String },

    #[error("Context is read-only: cannot write '{0}'")]
    ReadOnly(String),

    #[error("Cannot store value in '{name}': {source}")]
    TypeMismatch {
        name: String,
        #[source]
        source: ValueError,
    },

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Invalid mask: expected {expected} elements, got {found}")]
    InvalidMask { expected: usize, found: usize },

    #[error("Mask stack underflow: pop_mask without matching push_mask")]
    MaskUnderflow,
}

/// Block parsing, analysis and execution errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlockError {
    #[error("Parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Name '{0}' is not defined")]
    UnknownName(String),

    #[error("Cyclic dependency between statements: {0:?}")]
    CyclicGraph(Vec<usize>),

    #[error("Cannot import '{0}'")]
    Import(String),

    #[error("Error calling {function}(): {message}")]
    Call { function: String, message: String },

    #[error("Mask stack underflow: pop_mask without matching push_mask")]
    MaskUnderflow,

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Filter evaluation errors
///
/// These never escape a pipeline: `filter::evaluate` logs them and treats the
/// filter as inactive.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Filter evaluation failed: {0}")]
    Evaluation(String),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

/// Snapshot encoding and decoding errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to encode snapshot: {0}")]
    Encode(String),

    #[error("Failed to decode snapshot: {0}")]
    Decode(String),

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    Version { expected: u32, found: u32 },

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::Load(err.to_string())
    }
}

/// Failures surfaced by the `numctx` command line
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Failed to render output: {0}")]
    Render(String),

    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
