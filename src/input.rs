use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Keyboard chords the automation engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chord {
    Copy,
    Paste,
}

impl Chord {
    /// Platform primary modifier and layout-independent key for the chord.
    fn keys(self) -> (Key, Key) {
        #[cfg(target_os = "macos")]
        let keys = match self {
            // macOS virtual keycodes: 8 = 'C', 9 = 'V'
            Chord::Copy => (Key::Meta, Key::Other(8)),
            Chord::Paste => (Key::Meta, Key::Other(9)),
        };
        #[cfg(target_os = "windows")]
        let keys = match self {
            Chord::Copy => (Key::Control, Key::Other(0x43)), // VK_C
            Chord::Paste => (Key::Control, Key::Other(0x56)), // VK_V
        };
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let keys = match self {
            Chord::Copy => (Key::Control, Key::Unicode('c')),
            Chord::Paste => (Key::Control, Key::Unicode('v')),
        };
        keys
    }
}

/// Port over synthetic keyboard input.
///
/// Injection failures are logged and swallowed: callers detect a chord that
/// never landed through the clipboard change counter.
pub trait InputInjector: Send + Sync {
    fn send_chord(&self, chord: Chord);
}

/// Enigo-backed injector.
/// The inner Option allows for lazy initialization - Enigo requires accessibility
/// permissions on macOS, so we defer initialization until permissions are granted.
pub struct EnigoInjector(Mutex<Option<Enigo>>);

impl EnigoInjector {
    /// Initialize Enigo immediately only if accessibility permission is
    /// already granted, to avoid triggering the macOS dialog on launch.
    pub fn new() -> Self {
        if crate::permissions::check_accessibility_permission() {
            match Enigo::new(&Settings::default()) {
                Ok(enigo) => {
                    debug!("Enigo initialized at startup (permissions already granted)");
                    return Self(Mutex::new(Some(enigo)));
                }
                Err(e) => {
                    warn!("Failed to initialize Enigo despite permissions: {}", e);
                }
            }
        }
        Self(Mutex::new(None))
    }

    /// Try to initialize Enigo if it hasn't been initialized yet.
    /// Returns true if Enigo is now available, false otherwise.
    pub fn try_init(&self) -> bool {
        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return true;
        }

        match Enigo::new(&Settings::default()) {
            Ok(enigo) => {
                info!("Enigo initialized successfully after permissions granted");
                *guard = Some(enigo);
                true
            }
            Err(e) => {
                warn!("Failed to initialize Enigo: {}", e);
                false
            }
        }
    }
}

impl Default for EnigoInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl InputInjector for EnigoInjector {
    fn send_chord(&self, chord: Chord) {
        #[cfg(target_os = "linux")]
        if crate::utils::is_wayland() {
            warn!(?chord, "Synthetic input may not reach native Wayland windows");
        }

        if !self.try_init() {
            warn!(?chord, "Input synthesis unavailable, chord not sent");
            return;
        }

        let mut guard = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let Some(enigo) = guard.as_mut() else {
            return;
        };
        match press_chord(enigo, chord) {
            Ok(()) => debug!(?chord, "Sent chord"),
            Err(e) => warn!(?chord, "Failed to send chord: {}", e),
        }
    }
}

/// Presses modifier + key using platform-specific virtual key codes so the
/// chord works regardless of keyboard layout (e.g., Russian, AZERTY, DVORAK).
/// Key::Other avoids TSMGetInputSourceProperty, which crashes on non-main
/// threads on macOS.
fn press_chord(enigo: &mut Enigo, chord: Chord) -> Result<(), String> {
    let (modifier_key, key_code) = chord.keys();

    enigo
        .key(modifier_key, Direction::Press)
        .map_err(|e| format!("Failed to press modifier key: {}", e))?;
    let clicked = enigo
        .key(key_code, Direction::Click)
        .map_err(|e| format!("Failed to click {:?} key: {}", chord, e));

    std::thread::sleep(std::time::Duration::from_millis(100));

    // Release the modifier even when the click failed so it never sticks.
    enigo
        .key(modifier_key, Direction::Release)
        .map_err(|e| format!("Failed to release modifier key: {}", e))?;

    clicked
}
