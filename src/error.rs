use thiserror::Error;

use crate::{ContextId, RemoteError};

/// Errors that can occur during RPC operations
#[derive(Error, Debug)]
pub enum RpcError {
    /// The remote handler failed; carries the decoded error.
    #[error("remote handler failed: {0}")]
    Remote(RemoteError),

    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport rejected an operation
    #[error("transport error: {0}")]
    Transport(String),

    /// The reply channels of a pending call closed before a reply arrived
    #[error("transport closed before a reply arrived")]
    TransportClosed,

    /// An answerer is already registered on this send channel
    #[error("an answerer is already registered on channel: {0}")]
    AlreadyAnswered(String),

    /// Operation not valid for the endpoint's context
    #[error("invalid context: {0}")]
    InvalidContext(String),

    /// Rejected endpoint configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Malformed call envelope
    #[error("invalid call envelope: {0}")]
    InvalidEnvelope(String),

    /// Reply target no longer exists. Only ever observed on the answering side.
    #[error("reply target is gone: {0}")]
    DeadPeer(ContextId),
}

impl RpcError {
    /// Returns the decoded remote error, if this failure came from the remote handler.
    pub fn remote(&self) -> Option<&RemoteError> {
        // ---
        match self {
            RpcError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RemoteError> for RpcError {
    fn from(err: RemoteError) -> Self {
        RpcError::Remote(err)
    }
}

// Lets handlers use `?` on nested calls; a nested remote failure is
// forwarded unchanged instead of being wrapped.
impl From<RpcError> for RemoteError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Remote(remote) => remote,
            other => RemoteError::from_error(&other),
        }
    }
}

/// Result type alias for RPC operations
pub type Result<T> = std::result::Result<T, RpcError>;
