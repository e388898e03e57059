//! NSPasteboard-backed clipboard.
//!
//! The general pasteboard keeps every item and every type, so snapshots taken
//! here are complete. `changeCount` is the OS change counter.

use anyhow::{anyhow, Result};
use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2_app_kit::{NSPasteboard, NSPasteboardItem, NSPasteboardWriting};
use objc2_foundation::{NSArray, NSData, NSString};
use tracing::{debug, debug_span, warn};

use super::{text::PLAIN_TEXT_TYPE, ClipboardItem, Representation, SystemClipboard};

#[derive(Default)]
pub struct MacOSClipboard;

impl MacOSClipboard {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }

    fn pasteboard() -> Retained<NSPasteboard> {
        unsafe { NSPasteboard::generalPasteboard() }
    }
}

fn build_item(item: &ClipboardItem) -> Retained<NSPasteboardItem> {
    let pb_item = unsafe { NSPasteboardItem::new() };
    for rep in &item.representations {
        let data = NSData::with_bytes(&rep.bytes);
        let ty = NSString::from_str(&rep.type_id);
        let ok = unsafe { pb_item.setData_forType(&data, &ty) };
        if !ok {
            warn!(type_id = %rep.type_id, "Pasteboard rejected representation");
        }
    }
    pb_item
}

impl SystemClipboard for MacOSClipboard {
    fn change_count(&self) -> Result<i64> {
        let count = unsafe { Self::pasteboard().changeCount() };
        Ok(count as i64)
    }

    fn read_items(&self) -> Result<Vec<ClipboardItem>> {
        let span = debug_span!("platform.macos.read_clipboard");
        span.in_scope(|| {
            let pasteboard = Self::pasteboard();
            let Some(pb_items) = (unsafe { pasteboard.pasteboardItems() }) else {
                return Ok(Vec::new());
            };

            let mut items = Vec::with_capacity(pb_items.count());
            for pb_item in pb_items.iter() {
                let mut reps = Vec::new();
                let types = unsafe { pb_item.types() };
                for ty in types.iter() {
                    match unsafe { pb_item.dataForType(&ty) } {
                        Some(data) => reps.push(Representation::new(ty.to_string(), data.to_vec())),
                        None => debug!(type_id = %ty, "Skipping unreadable pasteboard type"),
                    }
                }
                items.push(ClipboardItem::new(reps));
            }
            Ok(items)
        })
    }

    fn clear(&self) -> Result<()> {
        unsafe { Self::pasteboard().clearContents() };
        Ok(())
    }

    fn write_items(&self, items: &[ClipboardItem]) -> Result<()> {
        let span = debug_span!("platform.macos.write_clipboard", items = items.len());
        span.in_scope(|| {
            let objects: Vec<Retained<ProtocolObject<dyn NSPasteboardWriting>>> = items
                .iter()
                .map(|item| ProtocolObject::from_retained(build_item(item)))
                .collect();
            let array = NSArray::from_retained_slice(&objects);
            let written = unsafe { Self::pasteboard().writeObjects(&array) };
            if !written {
                return Err(anyhow!("NSPasteboard refused to write {} item(s)", items.len()));
            }
            Ok(())
        })
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let pasteboard = Self::pasteboard();
        unsafe { pasteboard.clearContents() };
        let value = NSString::from_str(text);
        let ty = NSString::from_str(PLAIN_TEXT_TYPE);
        let ok = unsafe { pasteboard.setString_forType(&value, &ty) };
        if !ok {
            return Err(anyhow!("NSPasteboard refused plain text"));
        }
        Ok(())
    }
}
