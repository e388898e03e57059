//! Automation (accessibility) permission checks.
//!
//! Synthesizing keystrokes into other applications requires the process to be
//! trusted for accessibility on macOS. Other platforms have no equivalent gate
//! and always report trusted.

#[cfg(target_os = "macos")]
use tracing::{debug, info};

/// Port over the OS automation trust check.
pub trait AutomationPermission: Send + Sync {
    /// Whether the process may currently synthesize input.
    fn is_trusted(&self) -> bool;

    /// Asks the OS to show its trust prompt. Never blocks on the user.
    fn request(&self);
}

/// Production permission port backed by the platform functions below.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAutomationPermission;

impl AutomationPermission for SystemAutomationPermission {
    fn is_trusted(&self) -> bool {
        check_accessibility_permission()
    }

    fn request(&self) {
        prompt_accessibility_permission();
    }
}

/// Check if the app has accessibility permission on macOS.
///
/// This calls `AXIsProcessTrusted()` from ApplicationServices.framework.
/// Returns true if granted, false otherwise.
#[cfg(target_os = "macos")]
pub fn check_accessibility_permission() -> bool {
    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        // macOS Boolean is actually u8 (unsigned char), not Rust bool
        fn AXIsProcessTrusted() -> u8;
    }

    let result = unsafe { AXIsProcessTrusted() };
    let is_trusted = result != 0;
    debug!("Accessibility permission check: {} (raw: {})", is_trusted, result);
    is_trusted
}

/// Show the system "allow accessibility" prompt if the process is not yet
/// trusted. Returns immediately; the grant takes effect asynchronously.
#[cfg(target_os = "macos")]
pub fn prompt_accessibility_permission() {
    use core_foundation::base::TCFType;
    use core_foundation::boolean::CFBoolean;
    use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
    use core_foundation::string::CFString;

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> u8;
    }

    let options = CFDictionary::from_CFType_pairs(&[(
        CFString::new("AXTrustedCheckOptionPrompt").as_CFType(),
        CFBoolean::from(true).as_CFType(),
    )]);
    let result = unsafe { AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef()) };
    info!(trusted = result != 0, "Requested accessibility permission");
}

// Stub implementations for non-macOS platforms
#[cfg(not(target_os = "macos"))]
pub fn check_accessibility_permission() -> bool {
    true // Assume always granted on non-macOS
}

#[cfg(not(target_os = "macos"))]
pub fn prompt_accessibility_permission() {
    // No-op on non-macOS
}

#[cfg(all(test, not(target_os = "macos")))]
mod tests {
    use super::*;

    #[test]
    fn test_non_macos_is_always_trusted() {
        let permission = SystemAutomationPermission;
        assert!(permission.is_trusted());
        permission.request();
        assert!(permission.is_trusted());
    }
}
