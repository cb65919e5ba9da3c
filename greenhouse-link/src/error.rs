//! Error types for greenhouse-link

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// greenhouse-link error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Frame could not be decoded into a message
    #[error("Malformed frame: {0}")]
    Malformed(String),

    /// Message contains a token that cannot be put on the wire
    #[error("Cannot encode message: {0}")]
    Encode(String),

    /// Session was already closed
    #[error("Session closed")]
    Closed,

    /// Listening socket could not be bound
    #[error("Failed to bind to {address}: {source}")]
    Bind {
        /// Address that was requested
        address: String,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
