//! Error types for rackradar.

use thiserror::Error;

/// Error type for rackradar operations.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Storage backend error
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Address arithmetic validation error
    #[error(transparent)]
    Range(#[from] RangeError),

    /// Invalid CIDR notation
    #[error("invalid CIDR pattern: {0}")]
    InvalidCidrPattern(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// A list name that has no persisted row
    #[error("unknown list: {0}")]
    UnknownList(String),

    /// Import record rejected
    #[error("import error: {0}")]
    Import(String),
}

/// Result type alias for rackradar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for checked address arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RangeError {
    /// `start > end`
    #[error("inverted range: start {start} is above end {end}")]
    Inverted { start: String, end: String },

    /// The range cannot be written as a single CIDR block
    #[error("range {start}-{end} is not CIDR aligned")]
    NotCidrAligned { start: String, end: String },

    /// Prefix length larger than the address width
    #[error("invalid prefix length /{prefix_len} for a {bits}-bit address")]
    InvalidPrefixLength { prefix_len: u8, bits: u8 },
}
