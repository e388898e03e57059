use std::collections::HashMap;
use std::sync::OnceLock;

use super::HotkeyBinding;

/// Static map of reserved shortcuts
/// Key: canonical lowercase binding (e.g., "cmd+space")
/// Value: what the system or this app already uses it for
static RESERVED_SHORTCUTS: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

fn get_reserved_shortcuts() -> &'static HashMap<&'static str, &'static str> {
    RESERVED_SHORTCUTS.get_or_init(|| {
        let mut m = HashMap::new();

        fn insert(
            m: &mut HashMap<&'static str, &'static str>,
            keys: &[&'static str],
            reason: &'static str,
        ) {
            for key in keys {
                m.insert(*key, reason);
            }
        }

        // The chords this app synthesizes would re-trigger the hotkey.
        #[cfg(target_os = "macos")]
        insert(&mut m, &["cmd+c", "cmd+v"], "copy/paste chord used for automation");
        #[cfg(not(target_os = "macos"))]
        insert(&mut m, &["ctrl+c", "ctrl+v"], "copy/paste chord used for automation");

        #[cfg(target_os = "macos")]
        {
            insert(&mut m, &["cmd+q", "cmd+w", "cmd+h", "cmd+m"], "application control");
            insert(&mut m, &["cmd+space", "cmd+alt+space"], "Spotlight");
            insert(&mut m, &["cmd+tab", "cmd+shift+tab"], "app switching");
            insert(&mut m, &["ctrl+space", "ctrl+alt+space"], "input source switching");
            insert(&mut m, &["cmd+alt+escape"], "Force Quit");
            insert(&mut m, &["ctrl+cmd+q", "cmd+shift+q"], "lock screen / log out");
        }

        #[cfg(not(target_os = "macos"))]
        {
            insert(&mut m, &["alt+tab", "alt+shift+tab"], "window switching");
            insert(&mut m, &["alt+f4"], "close window");
            insert(&mut m, &["ctrl+shift+escape"], "task manager");
        }

        m
    })
}

/// Rejects bindings the system or the automation chords already own.
/// Returns the reason when reserved.
pub fn check_reserved(binding: &HotkeyBinding) -> Result<(), &'static str> {
    let normalized = binding.to_string().to_lowercase();
    match get_reserved_shortcuts().get(normalized.as_str()) {
        Some(reason) => Err(reason),
        None => Ok(()),
    }
}
