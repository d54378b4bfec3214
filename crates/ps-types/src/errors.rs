use thiserror::Error;

/// Main error type for ParamScout
#[derive(Error, Debug)]
pub enum PsError {
    #[error("Unit error: {0}")]
    Unit(#[from] UnitError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Unit parsing and conversion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitError {
    #[error("Unknown unit symbol: {symbol}")]
    Unknown { symbol: String },

    #[error("Malformed unit expression: {expression}")]
    Malformed { expression: String },

    #[error("Incompatible units: cannot convert {from} to {to}")]
    Incompatible { from: String, to: String },

    #[error("Unit mismatch: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

/// Configuration lookup errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No step configuration for parameter: {key}")]
    MissingStep { key: String },

    #[error("No range configuration for parameter: {key}")]
    MissingRange { key: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors raised by the search routines themselves
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("Value {value} is not numeric and cannot be searched")]
    NotNumeric { value: String },

    #[error("Derived start value for {key} refers to unbound parameter {source_key}")]
    UnboundDependency { key: String, source_key: String },

    #[error("Range search exhausted its budget of {max_probes} probes")]
    ProbeBudgetExhausted { max_probes: usize },

    #[error("Initial point has no parameters")]
    EmptyPoint,
}

/// Result type alias for ParamScout operations
pub type PsResult<T> = Result<T, PsError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::PsError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::PsError::Config($crate::ConfigError::Invalid {
            message: format!($($arg)*),
        })
    };
}
