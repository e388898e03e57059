//! Selection capture and replacement through the clipboard.
//!
//! Both operations borrow the clipboard for a moment: snapshot, drive the
//! focused application with a copy or paste chord, then put the snapshot back.
//! The snapshot is restored on every exit path, including cancellation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::clipboard::{text::extract_text, RestoreGuard, SystemClipboard};
use crate::error::RewriteError;
use crate::input::{Chord, InputInjector};
use crate::permissions::AutomationPermission;

/// How long to wait for the focused application to react to a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleTiming {
    pub copy: Duration,
    pub paste: Duration,
}

impl Default for SettleTiming {
    fn default() -> Self {
        Self {
            copy: Duration::from_millis(200),
            paste: Duration::from_millis(150),
        }
    }
}

/// Reads and writes the selection of the focused application.
#[async_trait]
pub trait SelectionIo: Send + Sync {
    /// Returns the currently selected text.
    async fn capture(&self) -> Result<String, RewriteError>;

    /// Replaces the current selection with `text`.
    async fn replace(&self, text: &str) -> Result<(), RewriteError>;
}

fn clipboard_error(e: anyhow::Error) -> RewriteError {
    RewriteError::Clipboard(format!("{:#}", e))
}

/// Clipboard + synthetic keystroke implementation of [`SelectionIo`].
pub struct ClipboardSelectionIo {
    clipboard: Arc<dyn SystemClipboard>,
    injector: Arc<dyn InputInjector>,
    permission: Arc<dyn AutomationPermission>,
    timing: SettleTiming,
    /// Serializes snapshot/restore cycles so two never interleave.
    cycle: Mutex<()>,
}

impl ClipboardSelectionIo {
    pub fn new(
        clipboard: Arc<dyn SystemClipboard>,
        injector: Arc<dyn InputInjector>,
        permission: Arc<dyn AutomationPermission>,
        timing: SettleTiming,
    ) -> Self {
        Self {
            clipboard,
            injector,
            permission,
            timing,
            cycle: Mutex::new(()),
        }
    }

    fn ensure_permission(&self) -> Result<(), RewriteError> {
        if self.permission.is_trusted() {
            return Ok(());
        }
        warn!("Automation permission missing, requesting it");
        self.permission.request();
        Err(RewriteError::PermissionDenied)
    }

    async fn inject(&self, chord: Chord) {
        let injector = self.injector.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || injector.send_chord(chord)).await {
            warn!(?chord, "Chord injection task failed: {}", e);
        }
    }

    fn read_copied_text(&self, change_count_before: i64) -> Result<String, RewriteError> {
        let change_count_after = self.clipboard.change_count().map_err(clipboard_error)?;
        if change_count_after == change_count_before {
            debug!(change_count = change_count_after, "Clipboard unchanged after copy");
            return Err(RewriteError::NoSelection);
        }

        let items = self.clipboard.read_items().map_err(clipboard_error)?;
        extract_text(&items).ok_or_else(|| {
            debug!(items = items.len(), "Copied content has no decodable text");
            RewriteError::NoSelection
        })
    }
}

#[async_trait]
impl SelectionIo for ClipboardSelectionIo {
    async fn capture(&self) -> Result<String, RewriteError> {
        self.ensure_permission()?;
        let _cycle = self.cycle.lock().await;

        // 1. Save current clipboard
        let guard = RestoreGuard::capture(self.clipboard.clone()).map_err(clipboard_error)?;
        let change_count_before = guard.snapshot().change_count();

        // 2. Copy the selection and let the app react
        self.inject(Chord::Copy).await;
        tokio::time::sleep(self.timing.copy).await;

        // 3. Extract, then restore regardless of the outcome
        let copied = self.read_copied_text(change_count_before);
        let restored = guard.restore();

        let text = match (copied, restored) {
            (Ok(text), restored) => {
                restored.map_err(clipboard_error)?;
                text
            }
            (Err(e), Err(restore_err)) => {
                error!("Failed to restore clipboard after capture: {:#}", restore_err);
                return Err(e);
            }
            (Err(e), Ok(())) => return Err(e),
        };

        info!(selected_len = text.chars().count(), "Captured selection");
        Ok(text)
    }

    async fn replace(&self, text: &str) -> Result<(), RewriteError> {
        self.ensure_permission()?;
        let _cycle = self.cycle.lock().await;

        // 1. Save current clipboard
        let guard = RestoreGuard::capture(self.clipboard.clone()).map_err(clipboard_error)?;

        // 2. Put the replacement on the clipboard. The guard restores if this fails.
        self.clipboard
            .write_text(text)
            .map_err(|e| RewriteError::ReplaceFailed(format!("{:#}", e)))?;

        // 3. Paste and let the app consume the clipboard
        self.inject(Chord::Paste).await;
        tokio::time::sleep(self.timing.paste).await;

        // 4. Restore original clipboard
        guard.restore().map_err(clipboard_error)?;

        info!(replaced_len = text.chars().count(), "Replaced selection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::{ClipboardItem, Representation};
    use crate::test_support::{text_item, FakeClipboard, FakeInjector, FakePermission};

    const INSTANT: SettleTiming = SettleTiming {
        copy: Duration::ZERO,
        paste: Duration::ZERO,
    };

    fn original_clipboard() -> Vec<ClipboardItem> {
        vec![
            ClipboardItem::new(vec![
                Representation::new("public.utf8-plain-text", "user data"),
                Representation::new("com.example.custom", vec![7u8, 0, 255]),
            ]),
            ClipboardItem::new(vec![Representation::new("public.png", vec![137u8, 80, 78, 71])]),
        ]
    }

    fn io(
        clipboard: &Arc<FakeClipboard>,
        injector: &Arc<FakeInjector>,
        permission: FakePermission,
    ) -> (ClipboardSelectionIo, Arc<FakePermission>) {
        let permission = Arc::new(permission);
        let io = ClipboardSelectionIo::new(
            clipboard.clone(),
            injector.clone(),
            permission.clone(),
            INSTANT,
        );
        (io, permission)
    }

    #[tokio::test]
    async fn test_capture_returns_selection_and_restores_clipboard() {
        let clipboard = Arc::new(FakeClipboard::with_items(original_clipboard()));
        let injector = Arc::new(FakeInjector::selecting(clipboard.clone(), "hello"));
        let (io, _) = io(&clipboard, &injector, FakePermission::trusted());

        let text = io.capture().await.unwrap();

        assert_eq!(text, "hello");
        assert_eq!(injector.chords(), vec![Chord::Copy]);
        assert_eq!(clipboard.items(), original_clipboard());
    }

    #[tokio::test]
    async fn test_capture_of_empty_clipboard_restores_empty() {
        let clipboard = Arc::new(FakeClipboard::default());
        let injector = Arc::new(FakeInjector::selecting(clipboard.clone(), "hello"));
        let (io, _) = io(&clipboard, &injector, FakePermission::trusted());

        assert_eq!(io.capture().await.unwrap(), "hello");
        assert!(clipboard.items().is_empty());
    }

    #[tokio::test]
    async fn test_capture_without_selection_leaves_clipboard_unchanged() {
        let clipboard = Arc::new(FakeClipboard::with_items(original_clipboard()));
        let injector = Arc::new(FakeInjector::new(clipboard.clone(), None));
        let (io, _) = io(&clipboard, &injector, FakePermission::trusted());

        let err = io.capture().await.unwrap_err();

        assert_eq!(err, RewriteError::NoSelection);
        assert_eq!(clipboard.items(), original_clipboard());
    }

    #[tokio::test]
    async fn test_capture_of_non_text_selection_is_no_selection() {
        let clipboard = Arc::new(FakeClipboard::with_items(vec![text_item("before")]));
        let image = vec![ClipboardItem::new(vec![Representation::new("public.png", vec![1u8])])];
        let injector = Arc::new(FakeInjector::new(clipboard.clone(), Some(image)));
        let (io, _) = io(&clipboard, &injector, FakePermission::trusted());

        assert_eq!(io.capture().await.unwrap_err(), RewriteError::NoSelection);
        assert_eq!(clipboard.items(), vec![text_item("before")]);
    }

    #[tokio::test]
    async fn test_capture_prefers_plain_text() {
        let clipboard = Arc::new(FakeClipboard::default());
        let selection = vec![ClipboardItem::new(vec![
            Representation::new("public.rtf", r"{\rtf1\ansi B}"),
            Representation::new("public.utf8-plain-text", "A"),
        ])];
        let injector = Arc::new(FakeInjector::new(clipboard.clone(), Some(selection)));
        let (io, _) = io(&clipboard, &injector, FakePermission::trusted());

        assert_eq!(io.capture().await.unwrap(), "A");
    }

    #[tokio::test]
    async fn test_missing_permission_requests_and_fails_before_touching_clipboard() {
        let clipboard = Arc::new(FakeClipboard::with_items(original_clipboard()));
        let injector = Arc::new(FakeInjector::selecting(clipboard.clone(), "hello"));
        let (io, permission) = io(&clipboard, &injector, FakePermission::denied());

        assert_eq!(io.capture().await.unwrap_err(), RewriteError::PermissionDenied);
        assert_eq!(io.replace("x").await.unwrap_err(), RewriteError::PermissionDenied);

        assert_eq!(permission.requests(), 2);
        assert!(injector.chords().is_empty());
        assert_eq!(clipboard.change_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_replace_pastes_text_and_restores_clipboard() {
        let clipboard = Arc::new(FakeClipboard::with_items(original_clipboard()));
        let injector = Arc::new(FakeInjector::new(clipboard.clone(), None));
        let (io, _) = io(&clipboard, &injector, FakePermission::trusted());

        io.replace("HELLO").await.unwrap();

        assert_eq!(injector.chords(), vec![Chord::Paste]);
        assert_eq!(injector.pasted(), vec!["HELLO".to_string()]);
        assert_eq!(clipboard.items(), original_clipboard());
    }

    #[tokio::test]
    async fn test_replace_on_empty_clipboard_restores_empty() {
        let clipboard = Arc::new(FakeClipboard::default());
        let injector = Arc::new(FakeInjector::new(clipboard.clone(), None));
        let (io, _) = io(&clipboard, &injector, FakePermission::trusted());

        io.replace("HELLO").await.unwrap();

        assert_eq!(injector.pasted(), vec!["HELLO".to_string()]);
        assert!(clipboard.items().is_empty());
    }

    #[tokio::test]
    async fn test_replace_write_failure_skips_paste_and_restores() {
        let clipboard = Arc::new(FakeClipboard::with_items(original_clipboard()));
        clipboard.fail_text_writes();
        let injector = Arc::new(FakeInjector::new(clipboard.clone(), None));
        let (io, _) = io(&clipboard, &injector, FakePermission::trusted());

        let err = io.replace("HELLO").await.unwrap_err();

        assert!(matches!(err, RewriteError::ReplaceFailed(_)));
        assert!(injector.chords().is_empty());
        assert_eq!(clipboard.items(), original_clipboard());
    }
}
