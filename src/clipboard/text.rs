//! Selection text extraction from clipboard representations.
//!
//! Priority is plain text, then rich text, then rich text with attachments.
//! The first representation that decodes to non-empty text wins. Decoding is
//! strict: invalid UTF-8/UTF-16 skips the representation instead of producing
//! a lossy string.

use super::{rtf, ClipboardItem};

/// Native plain-text type written by [`super::SystemClipboard::write_text`] on macOS.
pub const PLAIN_TEXT_TYPE: &str = "public.utf8-plain-text";
pub const RICH_TEXT_TYPE: &str = "public.rtf";
pub const RICH_TEXT_ATTACHMENTS_TYPE: &str = "com.apple.flat-rtfd";

/// Kind of text a representation carries, in extraction priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TextFlavor {
    PlainText,
    RichText,
    RichTextWithAttachments,
}

impl TextFlavor {
    pub const PRIORITY: [TextFlavor; 3] = [
        TextFlavor::PlainText,
        TextFlavor::RichText,
        TextFlavor::RichTextWithAttachments,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Utf16Le,
}

/// Maps a platform type identifier to its text flavor and encoding, if it
/// carries text.
fn classify(type_id: &str) -> Option<(TextFlavor, Encoding)> {
    let lower = type_id.to_ascii_lowercase();
    match lower.as_str() {
        // macOS UTIs, X11 targets and MIME types
        PLAIN_TEXT_TYPE | "nsstringpboardtype" | "utf8_string" | "text/plain"
        | "text/plain;charset=utf-8" | "string" | "text" => {
            Some((TextFlavor::PlainText, Encoding::Utf8))
        }
        "public.utf16-plain-text" | "public.utf16-external-plain-text" | "cf_unicodetext" => {
            Some((TextFlavor::PlainText, Encoding::Utf16Le))
        }
        RICH_TEXT_TYPE | "nsrtfpboardtype" | "text/rtf" | "text/richtext" | "application/rtf"
        | "rich text format" => Some((TextFlavor::RichText, Encoding::Utf8)),
        RICH_TEXT_ATTACHMENTS_TYPE | "next rtfd pasteboard type" | "nsrtfdpboardtype" => {
            Some((TextFlavor::RichTextWithAttachments, Encoding::Utf8))
        }
        _ => None,
    }
}

/// Extracts the selection text from freshly copied clipboard items.
///
/// Returns `None` when no representation yields non-empty text.
pub fn extract_text(items: &[ClipboardItem]) -> Option<String> {
    TextFlavor::PRIORITY
        .iter()
        .find_map(|flavor| extract_flavor(items, *flavor))
}

fn extract_flavor(items: &[ClipboardItem], wanted: TextFlavor) -> Option<String> {
    items
        .iter()
        .flat_map(|item| item.representations.iter())
        .filter_map(|rep| {
            let (flavor, encoding) = classify(&rep.type_id)?;
            (flavor == wanted).then_some((rep, encoding))
        })
        .find_map(|(rep, encoding)| {
            let decoded = match wanted {
                TextFlavor::PlainText => decode_plain(&rep.bytes, encoding),
                TextFlavor::RichText => rtf::rtf_to_text(&rep.bytes),
                TextFlavor::RichTextWithAttachments => rtf::rtfd_to_text(&rep.bytes),
            }?;
            (!decoded.is_empty()).then_some(decoded)
        })
}

fn decode_plain(bytes: &[u8], encoding: Encoding) -> Option<String> {
    match encoding {
        Encoding::Utf8 => {
            let text = std::str::from_utf8(bytes).ok()?;
            Some(text.trim_end_matches('\0').to_string())
        }
        Encoding::Utf16Le => {
            if bytes.len() % 2 != 0 {
                return None;
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            let text = String::from_utf16(&units).ok()?;
            Some(text.trim_end_matches('\0').to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::Representation;

    fn item(reps: &[(&str, &[u8])]) -> ClipboardItem {
        ClipboardItem::new(
            reps.iter()
                .map(|(ty, bytes)| Representation::new(*ty, bytes.to_vec()))
                .collect(),
        )
    }

    #[test]
    fn test_plain_text_beats_rich_text() {
        let items = vec![item(&[
            (RICH_TEXT_TYPE, br"{\rtf1\ansi B}"),
            (PLAIN_TEXT_TYPE, b"A"),
        ])];
        assert_eq!(extract_text(&items).as_deref(), Some("A"));
    }

    #[test]
    fn test_falls_back_to_rich_text_when_plain_is_empty() {
        let items = vec![item(&[
            (PLAIN_TEXT_TYPE, b""),
            (RICH_TEXT_TYPE, br"{\rtf1\ansi{\fonttbl\f0 Helvetica;}\f0 Hello\par World}"),
        ])];
        assert_eq!(extract_text(&items).as_deref(), Some("Hello\nWorld"));
    }

    #[test]
    fn test_rtfd_used_last() {
        let mut flat = b"rtfd\x00\x00\x00\x03TXT.rtf".to_vec();
        flat.extend_from_slice(br"{\rtf1 attached}");
        flat.extend_from_slice(b"\x89PNG...");
        let items = vec![item(&[(RICH_TEXT_ATTACHMENTS_TYPE, &flat)])];
        assert_eq!(extract_text(&items).as_deref(), Some("attached"));
    }

    #[test]
    fn test_invalid_utf8_is_not_decoded_lossily() {
        let items = vec![item(&[(PLAIN_TEXT_TYPE, &[0x66, 0x6f, 0xff, 0x6f])])];
        assert_eq!(extract_text(&items), None);
    }

    #[test]
    fn test_utf16_plain_text() {
        let bytes: Vec<u8> = "héllo\0"
            .encode_utf16()
            .flat_map(|unit| unit.to_le_bytes())
            .collect();
        let items = vec![item(&[("CF_UNICODETEXT", &bytes)])];
        assert_eq!(extract_text(&items).as_deref(), Some("héllo"));
    }

    #[test]
    fn test_unknown_types_are_ignored() {
        let items = vec![item(&[("public.png", b"not text")])];
        assert_eq!(extract_text(&items), None);
        assert_eq!(classify("public.png"), None);
        assert_eq!(
            classify("UTF8_STRING"),
            Some((TextFlavor::PlainText, Encoding::Utf8))
        );
    }
}
