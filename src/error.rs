use thiserror::Error;

/// Top-level error returned by the parse → obfuscate → print facade.
#[derive(Error, Debug)]
pub enum ObfuscatorError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("failed to parse {file}: {message}")]
    Parse { file: String, message: String },

    #[error("failed to print program: {0}")]
    Print(String),
}

/// Raised before traversal starts; the run never begins.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("stringArrayThreshold must be within [0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("stringArrayEncoding must not be empty while stringArray is enabled")]
    EmptyEncodingSet,

    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("identifiersPrefix `{0}` is not a valid identifier start")]
    InvalidPrefix(String),

    #[error("malformed options: {0}")]
    Json(String),
}

/// Aborts the whole run. `location` is rendered as `file:startLine-endLine`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("{transformer} at {location}: {message}")]
    Node {
        transformer: &'static str,
        message: String,
        location: String,
    },

    #[error("scope layout changed between stages at {location}: expected {expected}, found {found}")]
    ScopeMismatch {
        expected: String,
        found: String,
        location: String,
    },

    #[error("no usable identifier name left after skipping {skipped} reserved candidates")]
    NamesExhausted { skipped: usize },

    #[error("template `{name}` could not be rendered: {message}")]
    Template { name: &'static str, message: String },
}

pub type Result<T, E = ObfuscatorError> = std::result::Result<T, E>;
