//! Global hotkey bindings.
//!
//! A binding is a set of modifiers plus one key, written like `cmd+shift+r`.
//! On macOS the listener is a CGEventTap (see [`event_tap`]); other platforms
//! have no listener and rely on a desktop shortcut running `rewrite-text rewrite`.

#[cfg(target_os = "macos")]
pub mod event_tap;
mod reserved;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub use reserved::check_reserved;

pub const DEFAULT_BINDING: &str = "Cmd+Escape";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HotkeyParseError {
    #[error("hotkey binding is empty")]
    Empty,

    #[error("unknown key or modifier '{0}'")]
    UnknownToken(String),

    #[error("hotkey '{0}' has no key, only modifiers")]
    MissingKey(String),

    #[error("hotkey '{0}' has more than one key")]
    MultipleKeys(String),

    #[error("hotkey '{0}' needs at least one modifier")]
    MissingModifier(String),

    #[error("hotkey '{binding}' is reserved for {reason}")]
    Reserved {
        binding: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub command: bool,
    pub control: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub fn is_empty(&self) -> bool {
        !(self.command || self.control || self.alt || self.shift)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyKey {
    /// `a`-`z` or `0`-`9`, stored lowercase.
    Char(char),
    Escape,
    Space,
    Tab,
    Return,
    /// F1-F12
    Function(u8),
}

impl HotkeyKey {
    fn parse(token: &str) -> Option<Self> {
        let key = match token {
            "escape" | "esc" => HotkeyKey::Escape,
            "space" => HotkeyKey::Space,
            "tab" => HotkeyKey::Tab,
            "return" | "enter" => HotkeyKey::Return,
            _ => {
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_alphanumeric() => HotkeyKey::Char(c),
                    _ => {
                        let n: u8 = token.strip_prefix('f')?.parse().ok()?;
                        if !(1..=12).contains(&n) {
                            return None;
                        }
                        HotkeyKey::Function(n)
                    }
                }
            }
        };
        Some(key)
    }

    /// macOS virtual keycode (`kVK_*`), layout-independent.
    pub fn macos_keycode(self) -> i64 {
        match self {
            HotkeyKey::Escape => 53,
            HotkeyKey::Space => 49,
            HotkeyKey::Tab => 48,
            HotkeyKey::Return => 36,
            HotkeyKey::Function(n) => {
                const F_KEYS: [i64; 12] = [122, 120, 99, 118, 96, 97, 98, 100, 101, 109, 103, 111];
                F_KEYS[(n.clamp(1, 12) - 1) as usize]
            }
            HotkeyKey::Char(c) => match c {
                'a' => 0,
                's' => 1,
                'd' => 2,
                'f' => 3,
                'h' => 4,
                'g' => 5,
                'z' => 6,
                'x' => 7,
                'c' => 8,
                'v' => 9,
                'b' => 11,
                'q' => 12,
                'w' => 13,
                'e' => 14,
                'r' => 15,
                'y' => 16,
                't' => 17,
                '1' => 18,
                '2' => 19,
                '3' => 20,
                '4' => 21,
                '6' => 22,
                '5' => 23,
                '9' => 25,
                '7' => 26,
                '8' => 28,
                '0' => 29,
                'o' => 31,
                'u' => 32,
                'i' => 34,
                'p' => 35,
                'l' => 37,
                'j' => 38,
                'k' => 40,
                'n' => 45,
                'm' => 46,
                _ => -1,
            },
        }
    }
}

impl fmt::Display for HotkeyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HotkeyKey::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            HotkeyKey::Escape => write!(f, "Escape"),
            HotkeyKey::Space => write!(f, "Space"),
            HotkeyKey::Tab => write!(f, "Tab"),
            HotkeyKey::Return => write!(f, "Return"),
            HotkeyKey::Function(n) => write!(f, "F{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    pub modifiers: Modifiers,
    pub key: HotkeyKey,
}

impl HotkeyBinding {
    /// Parses and rejects reserved bindings.
    pub fn parse_allowed(binding: &str) -> Result<Self, HotkeyParseError> {
        let parsed: HotkeyBinding = binding.parse()?;
        check_reserved(&parsed).map_err(|reason| HotkeyParseError::Reserved {
            binding: parsed.to_string(),
            reason,
        })?;
        Ok(parsed)
    }
}

impl FromStr for HotkeyBinding {
    type Err = HotkeyParseError;

    fn from_str(binding: &str) -> Result<Self, Self::Err> {
        let normalized = binding.to_lowercase().replace(' ', "");
        if normalized.is_empty() {
            return Err(HotkeyParseError::Empty);
        }

        let mut modifiers = Modifiers::default();
        let mut key = None;
        for token in normalized.split('+') {
            match token {
                "cmd" | "command" | "meta" | "super" => modifiers.command = true,
                "ctrl" | "control" => modifiers.control = true,
                "alt" | "option" | "opt" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                _ => {
                    let parsed = HotkeyKey::parse(token)
                        .ok_or_else(|| HotkeyParseError::UnknownToken(token.to_string()))?;
                    if key.replace(parsed).is_some() {
                        return Err(HotkeyParseError::MultipleKeys(binding.to_string()));
                    }
                }
            }
        }

        let key = key.ok_or_else(|| HotkeyParseError::MissingKey(binding.to_string()))?;
        // Function keys may stand alone; anything else would swallow normal typing.
        if modifiers.is_empty() && !matches!(key, HotkeyKey::Function(_)) {
            return Err(HotkeyParseError::MissingModifier(binding.to_string()));
        }
        Ok(Self { modifiers, key })
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.modifiers;
        for (on, name) in [
            (m.command, "Cmd"),
            (m.control, "Ctrl"),
            (m.alt, "Alt"),
            (m.shift, "Shift"),
        ] {
            if on {
                write!(f, "{}+", name)?;
            }
        }
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_binding() {
        let binding: HotkeyBinding = DEFAULT_BINDING.parse().unwrap();
        assert!(binding.modifiers.command);
        assert!(!binding.modifiers.shift);
        assert_eq!(binding.key, HotkeyKey::Escape);
        assert_eq!(binding.key.macos_keycode(), 53);
    }

    #[test]
    fn test_parse_aliases_and_order() {
        let a: HotkeyBinding = "Option + Shift + command + R".parse().unwrap();
        let b: HotkeyBinding = "cmd+alt+shift+r".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "Cmd+Alt+Shift+R");
        assert_eq!(a.key.macos_keycode(), 15);
    }

    #[test]
    fn test_function_keys() {
        let binding: HotkeyBinding = "f12".parse().unwrap();
        assert_eq!(binding.key, HotkeyKey::Function(12));
        assert_eq!(binding.key.macos_keycode(), 111);
        assert!(matches!(
            "ctrl+f13".parse::<HotkeyBinding>(),
            Err(HotkeyParseError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<HotkeyBinding>(), Err(HotkeyParseError::Empty));
        assert!(matches!(
            "cmd+shift".parse::<HotkeyBinding>(),
            Err(HotkeyParseError::MissingKey(_))
        ));
        assert!(matches!(
            "cmd+a+b".parse::<HotkeyBinding>(),
            Err(HotkeyParseError::MultipleKeys(_))
        ));
        assert!(matches!(
            "r".parse::<HotkeyBinding>(),
            Err(HotkeyParseError::MissingModifier(_))
        ));
        assert!(matches!(
            "hyper+r".parse::<HotkeyBinding>(),
            Err(HotkeyParseError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_every_char_key_has_a_keycode() {
        for c in ('a'..='z').chain('0'..='9') {
            assert!(HotkeyKey::Char(c).macos_keycode() >= 0, "no keycode for {c}");
        }
    }
}
