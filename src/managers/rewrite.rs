//! Rewrite Manager – orchestrates one rewrite of the focused selection.
//!
//! Flow: load credential → capture selection → backend transform → replace selection.

use std::sync::Arc;

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::credentials::CredentialProvider;
use crate::error::RewriteError;
use crate::llm_client::BackendTransform;
use crate::presets::PromptPreset;
use crate::selection::SelectionIo;

/// Runs the rewrite pipeline. Holds no run state; single-flight is the
/// caller's concern.
pub struct RewriteOrchestrator {
    credentials: Arc<dyn CredentialProvider>,
    selection: Arc<dyn SelectionIo>,
    backend: Arc<dyn BackendTransform>,
}

impl RewriteOrchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        selection: Arc<dyn SelectionIo>,
        backend: Arc<dyn BackendTransform>,
    ) -> Self {
        Self {
            credentials,
            selection,
            backend,
        }
    }

    /// Rewrites the current selection with `preset` and returns the new text.
    /// No step is retried.
    pub async fn run(&self, preset: &PromptPreset) -> Result<String, RewriteError> {
        let span = info_span!("rewrite", run_id = %Uuid::new_v4(), preset = %preset.id);
        let result = self.run_inner(preset).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(text) => info!(output_len = text.chars().count(), "Rewrite pipeline complete"),
            Err(e) => warn!(kind = e.kind(), "Rewrite pipeline failed: {}", e),
        });
        result
    }

    async fn run_inner(&self, preset: &PromptPreset) -> Result<String, RewriteError> {
        info!("Starting rewrite pipeline");

        // 1. Credential, before anything touches the clipboard or the network
        let credential = self.load_credential().await?;

        // 2. Capture the selection
        let selected = self.selection.capture().await?;
        debug!(selected_len = selected.chars().count(), "Captured text for rewrite");

        // 3. Transform
        let rewritten = self
            .backend
            .transform(&credential, &preset.instructions, &selected)
            .await?;
        debug!(rewritten_len = rewritten.chars().count(), "Backend returned rewrite");

        // 4. Replace the selection
        self.selection.replace(&rewritten).await?;

        Ok(rewritten)
    }

    async fn load_credential(&self) -> Result<String, RewriteError> {
        // Keychain reads can block on a system prompt.
        let provider = self.credentials.clone();
        let loaded = tokio::task::spawn_blocking(move || provider.load_credential())
            .await
            .map_err(|e| RewriteError::CredentialStore(e.to_string()))?
            .map_err(|e| RewriteError::CredentialStore(format!("{:#}", e)))?;

        match loaded.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(RewriteError::MissingCredential),
        }
    }
}
