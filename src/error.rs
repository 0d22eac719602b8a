//! Error types for the voxboard engine
//!
//! Every failure in the core is locally contained: transport and credential
//! problems become state fields, malformed input degrades to a no-op. These
//! types exist so the boundaries can classify and report what went wrong.

use thiserror::Error;

/// Voxboard engine errors
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Inbound control message could not be decoded
    #[error("Malformed control message: {0}")]
    MalformedMessage(String),

    /// Outbound publish or transport-level failure
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Credential exchange with the identity service failed
    #[error("Credential exchange failed: {0}")]
    CredentialError(String),

    /// Real-time connection could not be established
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Channel communication error
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Dataset could not be loaded or parsed
    #[error("Dataset error: {0}")]
    DatasetError(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::DatasetError(e.to_string())
    }
}

impl EngineError {
    /// Check if this error is recoverable
    ///
    /// Recoverable errors allow the session to continue; non-recoverable
    /// errors require the user to re-invoke connect or restart.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Bad messages are dropped and the stream continues
            EngineError::MalformedMessage(_) => true,
            // The next summary change retries the push naturally
            EngineError::TransportError(_) => true,
            // Credential/connection failures require a new connect attempt
            EngineError::CredentialError(_) => false,
            EngineError::ConnectionError(_) => false,
            // Channel errors indicate internal wiring problems
            EngineError::ChannelError(_) => false,
            // Dataset errors require user intervention
            EngineError::DatasetError(_) => false,
        }
    }

    /// Get a user-friendly description of the error
    ///
    /// Returns a message suitable for display in the UI.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::MalformedMessage(_) => {
                "Received an unreadable message from the agent.".to_string()
            }
            EngineError::TransportError(_) => {
                "Could not reach the agent. The next update will retry.".to_string()
            }
            EngineError::CredentialError(_) => {
                "Could not obtain session credentials. Please reconnect.".to_string()
            }
            EngineError::ConnectionError(_) => {
                "Connection to the voice agent failed. Please reconnect.".to_string()
            }
            EngineError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            EngineError::DatasetError(_) => {
                "Sales data could not be loaded. Please check the dataset file.".to_string()
            }
        }
    }
}

/// Result type alias for voxboard operations
pub type Result<T> = std::result::Result<T, EngineError>;
