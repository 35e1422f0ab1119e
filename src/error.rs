//! Error types for DrishtiIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// DrishtiIO error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Link-level failure: short write, short read or failed connect
    #[error("Network error: {0}")]
    Network(String),

    /// Well-formed read whose content failed validation
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Device refused or garbled the open-session handshake
    #[error("Session rejected: {0}")]
    SessionRejected(String),

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Discovery reply could not be parsed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Connect attempt went unanswered
    #[error("Communication timeout")]
    Timeout,

    /// Worker thread panicked
    #[error("Thread panicked")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the error means the link itself is gone, as opposed to a
    /// fault reported by (or garbled data from) a reachable device.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Io(_) | Error::Timeout)
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Discovery(e.to_string())
    }
}
