//! Minimal RTF to plain-text conversion.
//!
//! Handles what editors put on the clipboard: groups, control words,
//! `\uN` unicode escapes with `\ucN` fallback skipping, `\'hh` code page bytes
//! (Windows-1252) and ignorable destinations. Formatting is dropped.

/// Destinations whose content is metadata, not document text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "footer",
    "footerl",
    "footerr",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "xmlnstbl",
    "themedata",
    "colorschememapping",
    "latentstyles",
    "datastore",
    "expandedcolortbl",
    "filetbl",
    "revtbl",
    // Field instructions (e.g. a hyperlink target). The field result stays.
    "fldinst",
];

/// Windows-1252 code points for bytes 0x80..=0x9F.
const CP1252_HIGH: [char; 32] = [
    '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}', '\u{017D}', '\u{FFFD}',
    '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}',
    '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
];

#[derive(Clone, Copy)]
struct GroupState {
    skip: bool,
    unicode_fallback_len: usize,
}

/// Converts an RTF document to plain text. Returns `None` if the bytes are
/// not an RTF document.
pub fn rtf_to_text(bytes: &[u8]) -> Option<String> {
    let start = skip_leading_whitespace(bytes);
    if !bytes[start..].starts_with(b"{\\rtf") {
        return None;
    }
    Some(Parser::new(&bytes[start..]).run())
}

/// Extracts the text of a flattened RTFD bundle by decoding its embedded
/// `TXT.rtf` document. Attachments are ignored.
pub fn rtfd_to_text(bytes: &[u8]) -> Option<String> {
    let offset = bytes.windows(5).position(|window| window == b"{\\rtf")?;
    rtf_to_text(&bytes[offset..])
}

fn skip_leading_whitespace(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len())
}

fn cp1252(byte: u8) -> char {
    match byte {
        0x80..=0x9F => CP1252_HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
    stack: Vec<GroupState>,
    state: GroupState,
    pending_fallback: usize,
    out: String,
}

impl<'a> Parser<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            stack: Vec::new(),
            state: GroupState {
                skip: false,
                unicode_fallback_len: 1,
            },
            pending_fallback: 0,
            out: String::new(),
        }
    }

    fn run(mut self) -> String {
        while let Some(&byte) = self.bytes.get(self.pos) {
            self.pos += 1;
            match byte {
                b'{' => {
                    self.stack.push(self.state);
                    self.pending_fallback = 0;
                }
                b'}' => {
                    match self.stack.pop() {
                        Some(previous) => self.state = previous,
                        None => break,
                    }
                    self.pending_fallback = 0;
                    // Closing the outermost group ends the document.
                    if self.stack.is_empty() {
                        break;
                    }
                }
                b'\\' => self.control(),
                b'\r' | b'\n' => {}
                other => self.emit(cp1252(other)),
            }
        }
        self.out
    }

    fn emit(&mut self, c: char) {
        if self.pending_fallback > 0 {
            self.pending_fallback -= 1;
            return;
        }
        if !self.state.skip {
            self.out.push(c);
        }
    }

    /// Emits a character that is never a `\uN` fallback.
    fn emit_text(&mut self, c: char) {
        self.pending_fallback = 0;
        if !self.state.skip {
            self.out.push(c);
        }
    }

    fn control(&mut self) {
        let Some(&next) = self.bytes.get(self.pos) else {
            return;
        };

        if next.is_ascii_alphabetic() {
            self.control_word();
            return;
        }

        self.pos += 1;
        match next {
            b'\\' | b'{' | b'}' => self.emit(next as char),
            b'\'' => {
                let hex = self.bytes.get(self.pos..self.pos + 2);
                if let Some(value) = hex
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                {
                    self.pos += 2;
                    self.emit(cp1252(value));
                }
            }
            b'*' => self.state.skip = true,
            b'~' => self.emit_text('\u{00A0}'),
            b'_' => self.emit_text('\u{2011}'),
            b'\n' | b'\r' => self.emit_text('\n'),
            // \- (optional hyphen), \| and anything else carry no text
            _ => {}
        }
    }

    fn control_word(&mut self) {
        let word_start = self.pos;
        while self
            .bytes
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_alphabetic())
        {
            self.pos += 1;
        }
        let word = std::str::from_utf8(&self.bytes[word_start..self.pos]).unwrap_or_default();

        let param_start = self.pos;
        if self.bytes.get(self.pos) == Some(&b'-') {
            self.pos += 1;
        }
        while self.bytes.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let param = std::str::from_utf8(&self.bytes[param_start..self.pos])
            .ok()
            .and_then(|p| p.parse::<i32>().ok());

        // A single space delimits the control word and is not text.
        if self.bytes.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }

        match word {
            "par" | "line" | "sect" | "page" | "row" => self.emit_text('\n'),
            "tab" | "cell" => self.emit_text('\t'),
            "emdash" => self.emit_text('\u{2014}'),
            "endash" => self.emit_text('\u{2013}'),
            "bullet" => self.emit_text('\u{2022}'),
            "lquote" => self.emit_text('\u{2018}'),
            "rquote" => self.emit_text('\u{2019}'),
            "ldblquote" => self.emit_text('\u{201C}'),
            "rdblquote" => self.emit_text('\u{201D}'),
            "uc" => {
                self.state.unicode_fallback_len = param.unwrap_or(1).max(0) as usize;
            }
            "u" => {
                if let Some(value) = param {
                    let code = (if value < 0 { value + 65536 } else { value }) as u32;
                    let c = char::from_u32(code).unwrap_or('\u{FFFD}');
                    self.emit_text(c);
                    self.pending_fallback = self.state.unicode_fallback_len;
                }
            }
            "bin" => {
                // Raw binary payload of `param` bytes, never text.
                let len = param.unwrap_or(0).max(0) as usize;
                self.pos = self.pos.saturating_add(len).min(self.bytes.len());
            }
            word if SKIPPED_DESTINATIONS.contains(&word) => self.state.skip = true,
            _ => {}
        }
    }
}
