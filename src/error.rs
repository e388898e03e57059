//! Error taxonomy for the rewrite pipeline.
//!
//! Every variant is terminal for the run that produced it. Nothing here is
//! retried automatically; the user re-triggers once the cause is fixed.

use thiserror::Error;

/// Failure reported by a transformation backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The backend answered 2xx but no output text could be found.
    #[error("could not extract output text from backend response. Body snippet: {snippet}")]
    UnparseableResponse { snippet: String },

    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("backend request failed: {0}")]
    Transport(String),
}

/// Outcome of a failed rewrite run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error(
        "Accessibility permission is required to rewrite the selection. \
         Grant it in your system privacy settings, then try again."
    )]
    PermissionDenied,

    #[error("No selected text found.")]
    NoSelection,

    #[error(
        "Missing API key. Run `rewrite-text set-key` (stored in the system keyring) \
         or set OPENAI_API_KEY."
    )]
    MissingCredential,

    #[error("Credential storage failed: {0}")]
    CredentialStore(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Could not place the rewritten text on the clipboard: {0}")]
    ReplaceFailed(String),

    #[error("Clipboard unavailable: {0}")]
    Clipboard(String),
}

impl RewriteError {
    /// Short machine-friendly name, used as a tracing field.
    pub fn kind(&self) -> &'static str {
        match self {
            RewriteError::PermissionDenied => "permission_denied",
            RewriteError::NoSelection => "no_selection",
            RewriteError::MissingCredential => "missing_credential",
            RewriteError::CredentialStore(_) => "credential_store",
            RewriteError::Backend(_) => "backend",
            RewriteError::ReplaceFailed(_) => "replace_failed",
            RewriteError::Clipboard(_) => "clipboard",
        }
    }
}
