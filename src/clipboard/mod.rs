//! System clipboard access and transparent snapshot/restore.
//!
//! The automation engine borrows the user's clipboard to move text in and out
//! of the focused application. Everything it touches is captured first and
//! written back afterwards, so the user never notices the detour.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
mod rtf;
pub mod text;
#[cfg(target_os = "windows")]
mod windows;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, error, info};

#[cfg(target_os = "linux")]
pub use linux::LinuxClipboard as LocalClipboard;
#[cfg(target_os = "macos")]
pub use macos::MacOSClipboard as LocalClipboard;
#[cfg(target_os = "windows")]
pub use windows::WindowsClipboard as LocalClipboard;

/// One representation of a clipboard item: a platform type identifier and
/// the raw bytes stored under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representation {
    pub type_id: String,
    pub bytes: Vec<u8>,
}

impl Representation {
    pub fn new(type_id: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            type_id: type_id.into(),
            bytes: bytes.into(),
        }
    }
}

/// A single clipboard item with its representations in the order the OS
/// reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardItem {
    pub representations: Vec<Representation>,
}

impl ClipboardItem {
    pub fn new(representations: Vec<Representation>) -> Self {
        Self { representations }
    }

    pub fn total_size_bytes(&self) -> usize {
        self.representations.iter().map(|rep| rep.bytes.len()).sum()
    }
}

/// Port over the shared system clipboard.
///
/// Implementations are the only code that talks to the OS pasteboard.
pub trait SystemClipboard: Send + Sync {
    /// OS-owned counter bumped on every clipboard mutation.
    fn change_count(&self) -> Result<i64>;

    /// Reads every item and every representation currently on the clipboard.
    /// Representations that fail to read are skipped.
    fn read_items(&self) -> Result<Vec<ClipboardItem>>;

    /// Empties the clipboard.
    fn clear(&self) -> Result<()>;

    /// Writes `items` in order. Callers clear first.
    fn write_items(&self, items: &[ClipboardItem]) -> Result<()>;

    /// Replaces the clipboard contents with a single plain-text item.
    fn write_text(&self, text: &str) -> Result<()>;

    /// True when the current contents are served by this process and vanish
    /// when it exits (X11 selection ownership).
    fn serves_contents(&self) -> bool {
        false
    }
}

/// Keeps the process alive while it still serves the clipboard contents,
/// returning once another application (usually a clipboard manager) takes
/// the selection over.
pub async fn hold_until_taken_over(
    clipboard: Arc<dyn SystemClipboard>,
    poll: Duration,
) -> Result<()> {
    if !clipboard.serves_contents() {
        return Ok(());
    }

    let baseline = read_change_count(clipboard.clone()).await?;
    info!("Serving restored clipboard until another application takes it over");
    loop {
        tokio::time::sleep(poll).await;
        if read_change_count(clipboard.clone()).await? != baseline {
            debug!("Clipboard ownership handed off");
            return Ok(());
        }
    }
}

async fn read_change_count(clipboard: Arc<dyn SystemClipboard>) -> Result<i64> {
    tokio::task::spawn_blocking(move || clipboard.change_count()).await?
}

/// Full prior state of the clipboard, restorable bit-for-bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    change_count: i64,
    items: Vec<ClipboardItem>,
}

impl ClipboardSnapshot {
    /// Captures the clipboard without modifying it.
    pub fn capture(clipboard: &dyn SystemClipboard) -> Result<Self> {
        let change_count = clipboard.change_count()?;
        let items = clipboard.read_items()?;

        debug!(
            change_count,
            items = items.len(),
            total_size_bytes = items.iter().map(ClipboardItem::total_size_bytes).sum::<usize>(),
            "Captured clipboard snapshot"
        );

        Ok(Self {
            change_count,
            items,
        })
    }

    pub fn change_count(&self) -> i64 {
        self.change_count
    }

    pub fn items(&self) -> &[ClipboardItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Clears the clipboard and writes the captured items back. An empty
    /// snapshot leaves the clipboard empty.
    pub fn restore(&self, clipboard: &dyn SystemClipboard) -> Result<()> {
        clipboard.clear()?;
        if !self.items.is_empty() {
            clipboard.write_items(&self.items)?;
        }
        debug!(items = self.items.len(), "Restored clipboard snapshot");
        Ok(())
    }
}

/// Restores a snapshot when dropped unless [`RestoreGuard::restore`] already
/// ran. Covers early returns, errors and cancelled futures alike.
pub struct RestoreGuard {
    clipboard: Arc<dyn SystemClipboard>,
    snapshot: ClipboardSnapshot,
    armed: bool,
}

impl RestoreGuard {
    /// Captures the clipboard and arms the guard.
    pub fn capture(clipboard: Arc<dyn SystemClipboard>) -> Result<Self> {
        let snapshot = ClipboardSnapshot::capture(clipboard.as_ref())?;
        Ok(Self {
            clipboard,
            snapshot,
            armed: true,
        })
    }

    pub fn snapshot(&self) -> &ClipboardSnapshot {
        &self.snapshot
    }

    /// Restores now and reports failure to the caller.
    pub fn restore(mut self) -> Result<()> {
        self.armed = false;
        self.snapshot.restore(self.clipboard.as_ref())
    }
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.snapshot.restore(self.clipboard.as_ref()) {
            error!("Failed to restore clipboard after interrupted automation: {:#}", e);
        }
    }
}
