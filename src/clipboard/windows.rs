//! Win32 clipboard with all-format backup and restore.
//!
//! Every HGLOBAL-backed format is copied out byte for byte. GDI handle
//! formats (bitmaps, metafiles, palettes) cannot be cloned through
//! `GlobalLock` and are skipped; Windows re-synthesizes bitmaps from `CF_DIB`.

use std::ptr;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, debug_span, warn};
use windows::core::HSTRING;
use windows::Win32::Foundation::{HANDLE, HGLOBAL};
use windows::Win32::System::DataExchange::{
    CloseClipboard, EmptyClipboard, EnumClipboardFormats, GetClipboardData,
    GetClipboardFormatNameW, GetClipboardSequenceNumber, OpenClipboard, RegisterClipboardFormatW,
    SetClipboardData,
};
use windows::Win32::System::Memory::{GlobalAlloc, GlobalLock, GlobalSize, GlobalUnlock, GHND};

use super::{ClipboardItem, Representation, SystemClipboard};

const CF_UNICODETEXT: u32 = 13;

/// Standard formats with stable names.
const STANDARD_FORMATS: &[(u32, &str)] = &[
    (1, "CF_TEXT"),
    (4, "CF_SYLK"),
    (5, "CF_DIF"),
    (6, "CF_TIFF"),
    (7, "CF_OEMTEXT"),
    (8, "CF_DIB"),
    (10, "CF_PENDATA"),
    (11, "CF_RIFF"),
    (12, "CF_WAVE"),
    (CF_UNICODETEXT, "CF_UNICODETEXT"),
    (15, "CF_HDROP"),
    (16, "CF_LOCALE"),
    (17, "CF_DIBV5"),
];

/// Formats whose data is a GDI handle rather than global memory.
const HANDLE_FORMATS: &[u32] = &[2, 3, 9, 14, 0x0080, 0x0082, 0x008E];

/// Closes the clipboard when dropped.
struct OpenedClipboard;

impl OpenedClipboard {
    fn open() -> Result<Self> {
        unsafe { OpenClipboard(None) }.map_err(|e| anyhow!("OpenClipboard failed: {}", e))?;
        Ok(Self)
    }
}

impl Drop for OpenedClipboard {
    fn drop(&mut self) {
        let _ = unsafe { CloseClipboard() };
    }
}

fn format_name(format: u32) -> String {
    if let Some((_, name)) = STANDARD_FORMATS.iter().find(|(id, _)| *id == format) {
        return (*name).to_string();
    }
    let mut buf = [0u16; 256];
    let len = unsafe { GetClipboardFormatNameW(format, &mut buf) };
    if len > 0 {
        String::from_utf16_lossy(&buf[..len as usize])
    } else {
        format!("#{}", format)
    }
}

fn format_id(name: &str) -> Option<u32> {
    if let Some((id, _)) = STANDARD_FORMATS.iter().find(|(_, n)| *n == name) {
        return Some(*id);
    }
    if let Some(numeric) = name.strip_prefix('#') {
        return numeric.parse().ok();
    }
    let id = unsafe { RegisterClipboardFormatW(&HSTRING::from(name)) };
    (id != 0).then_some(id)
}

unsafe fn read_format(format: u32) -> Option<Vec<u8>> {
    let handle = GetClipboardData(format).ok()?;
    if handle.0.is_null() {
        return None;
    }
    let hglobal = HGLOBAL(handle.0);
    let size = GlobalSize(hglobal);
    if size == 0 {
        return None;
    }
    let data = GlobalLock(hglobal);
    if data.is_null() {
        return None;
    }
    let bytes = std::slice::from_raw_parts(data as *const u8, size).to_vec();
    let _ = GlobalUnlock(hglobal);
    Some(bytes)
}

unsafe fn write_format(format: u32, bytes: &[u8]) -> Result<()> {
    let hmem = GlobalAlloc(GHND, bytes.len().max(1))
        .map_err(|e| anyhow!("GlobalAlloc failed: {}", e))?;
    let data = GlobalLock(hmem);
    if data.is_null() {
        bail!("GlobalLock failed");
    }
    ptr::copy_nonoverlapping(bytes.as_ptr(), data as *mut u8, bytes.len());
    let _ = GlobalUnlock(hmem);

    // The clipboard owns the memory once SetClipboardData succeeds.
    SetClipboardData(format, Some(HANDLE(hmem.0)))
        .map_err(|e| anyhow!("SetClipboardData failed: {}", e))?;
    Ok(())
}

#[derive(Default)]
pub struct WindowsClipboard;

impl WindowsClipboard {
    pub fn new() -> Result<Self> {
        Ok(Self)
    }
}

impl SystemClipboard for WindowsClipboard {
    fn change_count(&self) -> Result<i64> {
        Ok(unsafe { GetClipboardSequenceNumber() } as i64)
    }

    fn read_items(&self) -> Result<Vec<ClipboardItem>> {
        let span = debug_span!("platform.windows.read_clipboard");
        let _enter = span.enter();

        let _open = OpenedClipboard::open()?;
        let mut reps = Vec::new();
        let mut format = unsafe { EnumClipboardFormats(0) };
        while format != 0 {
            if !HANDLE_FORMATS.contains(&format) {
                match unsafe { read_format(format) } {
                    Some(bytes) => reps.push(Representation::new(format_name(format), bytes)),
                    None => debug!(format, "Skipping unreadable clipboard format"),
                }
            }
            format = unsafe { EnumClipboardFormats(format) };
        }

        Ok(if reps.is_empty() {
            Vec::new()
        } else {
            vec![ClipboardItem::new(reps)]
        })
    }

    fn clear(&self) -> Result<()> {
        let _open = OpenedClipboard::open()?;
        unsafe { EmptyClipboard() }.map_err(|e| anyhow!("EmptyClipboard failed: {}", e))
    }

    fn write_items(&self, items: &[ClipboardItem]) -> Result<()> {
        let span = debug_span!("platform.windows.write_clipboard", items = items.len());
        let _enter = span.enter();

        if items.len() > 1 {
            warn!(items = items.len(), "Windows holds one clipboard item; writing the first");
        }
        let _open = OpenedClipboard::open()?;
        for rep in items.iter().take(1).flat_map(|item| item.representations.iter()) {
            let Some(format) = format_id(&rep.type_id) else {
                warn!(type_id = %rep.type_id, "Unknown clipboard format, skipping");
                continue;
            };
            if let Err(e) = unsafe { write_format(format, &rep.bytes) } {
                warn!(type_id = %rep.type_id, "Failed to restore clipboard format: {:#}", e);
            }
        }
        Ok(())
    }

    fn write_text(&self, text: &str) -> Result<()> {
        let bytes: Vec<u8> = text
            .encode_utf16()
            .chain(std::iter::once(0))
            .flat_map(|unit| unit.to_le_bytes())
            .collect();

        let _open = OpenedClipboard::open()?;
        unsafe {
            EmptyClipboard().map_err(|e| anyhow!("EmptyClipboard failed: {}", e))?;
            write_format(CF_UNICODETEXT, &bytes)
        }
    }
}
