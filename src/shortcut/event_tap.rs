//! macOS global hotkey listener using CGEventTap
//!
//! The tap runs on its own thread with a CFRunLoop. Key-down events matching
//! the binding are consumed so the focused app never sees them, and a trigger
//! is forwarded to the coordinator. Everything else passes through untouched.

use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use anyhow::{anyhow, Result};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType, CallbackResult, EventField,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::HotkeyBinding;
use crate::managers::coordinator::TriggerSource;

/// Running event tap. Dropping it stops the tap thread.
pub struct HotkeyListener {
    run_loop: Arc<Mutex<Option<CFRunLoop>>>,
    thread: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    pub fn stop(&mut self) {
        if let Some(run_loop) = self
            .run_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            run_loop.stop();
            debug!("Stopped event tap thread's run loop");
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn matches_binding(binding: &HotkeyBinding, event: &CGEvent) -> bool {
    let keycode = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
    if keycode != binding.key.macos_keycode() {
        return false;
    }
    // Only the four chord modifiers count; caps lock, fn and keypad flags are ignored.
    let flags = event.get_flags();
    let m = &binding.modifiers;
    flags.contains(CGEventFlags::CGEventFlagCommand) == m.command
        && flags.contains(CGEventFlags::CGEventFlagControl) == m.control
        && flags.contains(CGEventFlags::CGEventFlagAlternate) == m.alt
        && flags.contains(CGEventFlags::CGEventFlagShift) == m.shift
}

/// Starts listening for `binding` and sends a trigger per key press.
/// Fails if the tap cannot be created, which usually means accessibility
/// permission is missing.
pub fn start(
    binding: HotkeyBinding,
    triggers: UnboundedSender<TriggerSource>,
) -> Result<HotkeyListener> {
    let run_loop_slot: Arc<Mutex<Option<CFRunLoop>>> = Arc::new(Mutex::new(None));
    let thread_slot = run_loop_slot.clone();
    let (ready_tx, ready_rx) = std_mpsc::channel::<Result<(), String>>();

    let thread = std::thread::Builder::new()
        .name("hotkey-event-tap".to_string())
        .spawn(move || {
            let tap_result = CGEventTap::new(
                CGEventTapLocation::Session,
                CGEventTapPlacement::HeadInsertEventTap,
                CGEventTapOptions::Default, // Allow consuming events
                vec![CGEventType::KeyDown],
                |_proxy, event_type, event| {
                    if !matches!(event_type, CGEventType::KeyDown) || !matches_binding(&binding, event) {
                        return CallbackResult::Keep;
                    }
                    let repeat =
                        event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT) != 0;
                    if repeat {
                        return CallbackResult::Drop;
                    }
                    debug!(%binding, "Hotkey pressed");
                    if triggers.send(TriggerSource::Hotkey).is_err() {
                        warn!("Trigger channel closed, hotkey ignored");
                    }
                    CallbackResult::Drop
                },
            );

            let tap = match tap_result {
                Ok(tap) => tap,
                Err(()) => {
                    error!("Failed to create CGEventTap. Ensure Accessibility permissions are granted.");
                    let _ = ready_tx.send(Err("failed to create event tap".to_string()));
                    return;
                }
            };

            let source = match tap.mach_port().create_runloop_source(0) {
                Ok(source) => source,
                Err(()) => {
                    let _ = ready_tx.send(Err("failed to create run loop source".to_string()));
                    return;
                }
            };
            let run_loop = CFRunLoop::get_current();
            run_loop.add_source(&source, unsafe { kCFRunLoopCommonModes });
            *thread_slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(run_loop);

            tap.enable();
            info!(%binding, "Hotkey listener started");
            let _ = ready_tx.send(Ok(()));

            // Blocks until HotkeyListener::stop stops the run loop
            CFRunLoop::run_current();
            debug!("Event tap thread exiting normally");
        })
        .map_err(|e| anyhow!("failed to spawn event tap thread: {}", e))?;

    let mut listener = HotkeyListener {
        run_loop: run_loop_slot,
        thread: Some(thread),
    };

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(listener),
        Ok(Err(message)) => {
            listener.stop();
            Err(anyhow!(
                "{}. Grant accessibility permission and try again.",
                message
            ))
        }
        Err(_) => {
            listener.stop();
            Err(anyhow!("event tap thread exited during startup"))
        }
    }
}
