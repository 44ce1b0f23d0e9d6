//! Error taxonomy for the portal client.

use thiserror::Error;

/// Everything that can go wrong at the network boundary, plus the one
/// precondition the engine enforces itself.
///
/// All of these are caught inside the engine operation that issued the call;
/// none propagate past it. Empty send bodies are not an error at all, they
/// are a silent no-op.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Connection-level failure: DNS, refused, timeout, broken body.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success HTTP status with the server-provided message.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The response body did not parse as the expected JSON shape.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Send was attempted with no conversation selected.
    #[error("no active conversation")]
    NoActiveConversation,
}
