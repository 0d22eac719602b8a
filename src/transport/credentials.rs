//! Credential exchange boundary
//!
//! Connecting requires short-lived credentials minted by an identity
//! service that holds the real secret server-side. The exchange is a
//! single fallible call with no parameters; the caller's identity is
//! implicit in the channel used to reach the service.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Short-lived credentials for one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    /// Endpoint the session layer should dial
    pub url: String,
    /// Bearer token scoped to this session
    pub token: String,
}

/// One-shot exchange for session credentials
///
/// A failed exchange means no connection attempt happens at all; the
/// engine records the failure for the UI and stays usable locally.
pub trait CredentialProvider {
    fn fetch(&self) -> Result<SessionCredentials>;
}

/// Provider returning fixed credentials
///
/// Used by the demo binary and tests, and handy for development against
/// a local session stack with a static token.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credentials: SessionCredentials,
}

impl StaticCredentialProvider {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            credentials: SessionCredentials {
                url: url.into(),
                token: token.into(),
            },
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn fetch(&self) -> Result<SessionCredentials> {
        Ok(self.credentials.clone())
    }
}
