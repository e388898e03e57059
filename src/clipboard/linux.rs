//! X11 clipboard via clipboard-rs.
//!
//! X11 has a single clipboard item and no change counter. The counter is
//! derived from a fingerprint of the current contents plus the selection
//! owner's `TIMESTAMP`, which changes whenever an application takes
//! ownership even if it copies identical bytes.
//!
//! Writing makes this process the selection owner, so the contents live only
//! as long as it does unless a clipboard manager takes them over.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use clipboard_rs::{Clipboard, ClipboardContent, ClipboardContext};
use sha2::{Digest, Sha256};
use tracing::{debug, debug_span, warn};

use super::{ClipboardItem, Representation, SystemClipboard};

/// Targets describing the selection itself rather than its contents.
const META_TARGETS: &[&str] = &[
    "TARGETS",
    "TIMESTAMP",
    "MULTIPLE",
    "SAVE_TARGETS",
    "DELETE",
    "INCR",
];

fn map_clipboard_err<T>(
    result: std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>,
) -> Result<T> {
    result.map_err(|e| anyhow!(e))
}

#[derive(Default)]
struct ChangeTracker {
    fingerprint: Option<[u8; 32]>,
    count: i64,
}

impl ChangeTracker {
    fn observe(&mut self, fingerprint: [u8; 32]) -> i64 {
        match self.fingerprint {
            Some(previous) if previous == fingerprint => {}
            Some(_) => {
                self.count += 1;
                self.fingerprint = Some(fingerprint);
            }
            None => self.fingerprint = Some(fingerprint),
        }
        self.count
    }
}

pub struct LinuxClipboard {
    ctx: Mutex<ClipboardContext>,
    tracker: Mutex<ChangeTracker>,
    /// Set while this process owns the CLIPBOARD selection.
    owner: AtomicBool,
}

impl LinuxClipboard {
    pub fn new() -> Result<Self> {
        if crate::utils::is_wayland() {
            warn!("Running under Wayland; clipboard access goes through XWayland and may miss native apps");
        }
        let ctx = map_clipboard_err(ClipboardContext::new())?;
        Ok(Self {
            ctx: Mutex::new(ctx),
            tracker: Mutex::new(ChangeTracker::default()),
            owner: AtomicBool::new(false),
        })
    }

    fn read_with_timestamp(&self) -> Result<(Vec<ClipboardItem>, Vec<u8>)> {
        let ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
        let formats = map_clipboard_err(ctx.available_formats())?;

        let mut reps = Vec::new();
        for format in &formats {
            if META_TARGETS.contains(&format.as_str()) {
                continue;
            }
            match ctx.get_buffer(format) {
                Ok(bytes) => reps.push(Representation::new(format.as_str(), bytes)),
                Err(e) => debug!(format = %format, "Skipping unreadable clipboard target: {}", e),
            }
        }
        let timestamp = ctx.get_buffer("TIMESTAMP").unwrap_or_default();

        let items = if reps.is_empty() {
            Vec::new()
        } else {
            vec![ClipboardItem::new(reps)]
        };
        Ok((items, timestamp))
    }

    fn fingerprint(items: &[ClipboardItem], timestamp: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(timestamp);
        for rep in items.iter().flat_map(|item| item.representations.iter()) {
            hasher.update(rep.type_id.as_bytes());
            hasher.update((rep.bytes.len() as u64).to_le_bytes());
            hasher.update(&rep.bytes);
        }
        hasher.finalize().into()
    }

    fn bump_after_write(&self) {
        match self.read_with_timestamp() {
            Ok((items, timestamp)) => {
                let fingerprint = Self::fingerprint(&items, &timestamp);
                let mut tracker = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
                tracker.count += 1;
                tracker.fingerprint = Some(fingerprint);
            }
            Err(e) => warn!("Could not re-read clipboard after write: {:#}", e),
        }
    }
}

impl SystemClipboard for LinuxClipboard {
    fn change_count(&self) -> Result<i64> {
        let (items, timestamp) = self.read_with_timestamp()?;
        let fingerprint = Self::fingerprint(&items, &timestamp);
        let mut tracker = self.tracker.lock().unwrap_or_else(|e| e.into_inner());
        let before = tracker.count;
        let count = tracker.observe(fingerprint);
        if count != before {
            // Someone else wrote since our last write.
            self.owner.store(false, Ordering::SeqCst);
        }
        Ok(count)
    }

    fn read_items(&self) -> Result<Vec<ClipboardItem>> {
        let span = debug_span!("platform.linux.read_clipboard");
        span.in_scope(|| self.read_with_timestamp().map(|(items, _)| items))
    }

    fn clear(&self) -> Result<()> {
        {
            let ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
            map_clipboard_err(ctx.clear())?;
        }
        self.owner.store(false, Ordering::SeqCst);
        self.bump_after_write();
        Ok(())
    }

    fn write_items(&self, items: &[ClipboardItem]) -> Result<()> {
        let span = debug_span!("platform.linux.write_clipboard", items = items.len());
        span.in_scope(|| {
            if items.len() > 1 {
                warn!(items = items.len(), "X11 holds one clipboard item; writing the first");
            }
            let contents: Vec<ClipboardContent> = items
                .iter()
                .take(1)
                .flat_map(|item| item.representations.iter())
                .map(|rep| ClipboardContent::Other(rep.type_id.clone(), rep.bytes.clone()))
                .collect();
            {
                let ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
                let owns = !contents.is_empty();
                map_clipboard_err(ctx.set(contents))?;
                self.owner.store(owns, Ordering::SeqCst);
            }
            self.bump_after_write();
            Ok(())
        })
    }

    fn write_text(&self, text: &str) -> Result<()> {
        {
            let ctx = self.ctx.lock().unwrap_or_else(|e| e.into_inner());
            map_clipboard_err(ctx.set_text(text.to_string()))?;
        }
        self.owner.store(true, Ordering::SeqCst);
        self.bump_after_write();
        Ok(())
    }

    fn serves_contents(&self) -> bool {
        self.owner.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts_only_changes() {
        let mut tracker = ChangeTracker::default();
        assert_eq!(tracker.observe([1; 32]), 0);
        assert_eq!(tracker.observe([1; 32]), 0);
        assert_eq!(tracker.observe([2; 32]), 1);
        assert_eq!(tracker.observe([2; 32]), 1);
    }

    #[test]
    fn test_fingerprint_includes_owner_timestamp() {
        let items = vec![ClipboardItem::new(vec![Representation::new("UTF8_STRING", "same")])];
        assert_ne!(
            LinuxClipboard::fingerprint(&items, &[1, 0, 0, 0]),
            LinuxClipboard::fingerprint(&items, &[2, 0, 0, 0])
        );
    }
}
