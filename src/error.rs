// Error taxonomy for image generation

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerateError {
    /// Reported by the invocation collaborator, message passed through verbatim
    #[error("{0}")]
    Service(String),
    /// The response did not have the expected structure
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// Missing or invalid settings, raised when the client is constructed
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Failed to encode request: {0}")]
    Encoding(String),
}
