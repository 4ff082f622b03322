// mongo-bridge-core/src/error.rs
// Error taxonomy shared by the facade, the collection contract and the binder

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Empty names, negative skip/limit, conflicting index definitions
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation declared by the contract but not provided by this handle
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A collection factory broke the (owner, name) contract
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Surfaced as-is from the client collaborator
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Encoding(err.to_string())
    }
}

impl From<::config::ConfigError> for BridgeError {
    fn from(err: ::config::ConfigError) -> Self {
        BridgeError::Configuration(err.to_string())
    }
}

impl BridgeError {
    pub(crate) fn not_implemented(operation: &str) -> Self {
        BridgeError::NotImplemented(operation.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
