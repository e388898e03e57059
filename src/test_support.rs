//! In-memory fakes for the OS-facing ports.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Notify;

use crate::clipboard::text::{extract_text, PLAIN_TEXT_TYPE};
use crate::clipboard::{ClipboardItem, Representation, SystemClipboard};
use crate::credentials::CredentialProvider;
use crate::error::BackendError;
use crate::input::{Chord, InputInjector};
use crate::llm_client::BackendTransform;
use crate::managers::rewrite::RewriteOrchestrator;
use crate::permissions::AutomationPermission;
use crate::selection::{ClipboardSelectionIo, SettleTiming};

pub fn text_item(text: &str) -> ClipboardItem {
    ClipboardItem::new(vec![Representation::new(PLAIN_TEXT_TYPE, text)])
}

#[derive(Default)]
struct ClipboardState {
    items: Vec<ClipboardItem>,
    change_count: i64,
    clear_count: usize,
}

/// Deterministic clipboard with an honest change counter.
#[derive(Default)]
pub struct FakeClipboard {
    state: Mutex<ClipboardState>,
    fail_text_writes: AtomicBool,
    serving: AtomicBool,
}

impl FakeClipboard {
    pub fn with_items(items: Vec<ClipboardItem>) -> Self {
        let clipboard = Self::default();
        clipboard.state.lock().unwrap().items = items;
        clipboard
    }

    pub fn items(&self) -> Vec<ClipboardItem> {
        self.state.lock().unwrap().items.clone()
    }

    pub fn clear_count(&self) -> usize {
        self.state.lock().unwrap().clear_count
    }

    pub fn fail_text_writes(&self) {
        self.fail_text_writes.store(true, Ordering::SeqCst);
    }

    /// Behaves like an X11 selection owner whose contents die with it.
    pub fn serve_contents(&self) {
        self.serving.store(true, Ordering::SeqCst);
    }
}

impl SystemClipboard for FakeClipboard {
    fn change_count(&self) -> Result<i64> {
        Ok(self.state.lock().unwrap().change_count)
    }

    fn read_items(&self) -> Result<Vec<ClipboardItem>> {
        Ok(self.items())
    }

    fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.items.clear();
        state.change_count += 1;
        state.clear_count += 1;
        Ok(())
    }

    fn write_items(&self, items: &[ClipboardItem]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.items.extend_from_slice(items);
        state.change_count += 1;
        Ok(())
    }

    fn write_text(&self, text: &str) -> Result<()> {
        if self.fail_text_writes.load(Ordering::SeqCst) {
            bail!("pasteboard locked by another process");
        }
        let mut state = self.state.lock().unwrap();
        state.items = vec![text_item(text)];
        state.change_count += 1;
        Ok(())
    }

    fn serves_contents(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }
}

/// Plays the focused application: copy puts its selection on the
/// clipboard, paste records whatever text the clipboard holds.
pub struct FakeInjector {
    clipboard: Arc<FakeClipboard>,
    selection: Option<Vec<ClipboardItem>>,
    chords: Mutex<Vec<Chord>>,
    pasted: Mutex<Vec<String>>,
}

impl FakeInjector {
    pub fn new(clipboard: Arc<FakeClipboard>, selection: Option<Vec<ClipboardItem>>) -> Self {
        Self {
            clipboard,
            selection,
            chords: Mutex::new(Vec::new()),
            pasted: Mutex::new(Vec::new()),
        }
    }

    pub fn selecting(clipboard: Arc<FakeClipboard>, text: &str) -> Self {
        Self::new(clipboard, Some(vec![text_item(text)]))
    }

    pub fn chords(&self) -> Vec<Chord> {
        self.chords.lock().unwrap().clone()
    }

    pub fn pasted(&self) -> Vec<String> {
        self.pasted.lock().unwrap().clone()
    }
}

impl InputInjector for FakeInjector {
    fn send_chord(&self, chord: Chord) {
        self.chords.lock().unwrap().push(chord);
        match chord {
            Chord::Copy => {
                if let Some(selection) = &self.selection {
                    self.clipboard.clear().unwrap();
                    self.clipboard.write_items(selection).unwrap();
                }
            }
            Chord::Paste => {
                if let Some(text) = extract_text(&self.clipboard.items()) {
                    self.pasted.lock().unwrap().push(text);
                }
            }
        }
    }
}

pub struct FakePermission {
    trusted: bool,
    requests: AtomicUsize,
}

impl FakePermission {
    pub fn trusted() -> Self {
        Self {
            trusted: true,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn denied() -> Self {
        Self {
            trusted: false,
            requests: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl AutomationPermission for FakePermission {
    fn is_trusted(&self) -> bool {
        self.trusted
    }

    fn request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Backend that applies a pure function, optionally parking until released.
pub struct FakeBackend {
    respond: Box<dyn Fn(&str, &str) -> Result<String, BackendError> + Send + Sync>,
    calls: AtomicUsize,
    credentials: Mutex<Vec<String>>,
    started: Notify,
    release: Option<Notify>,
}

impl FakeBackend {
    pub fn new(
        respond: impl Fn(&str, &str) -> Result<String, BackendError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
            credentials: Mutex::new(Vec::new()),
            started: Notify::new(),
            release: None,
        }
    }

    pub fn uppercase() -> Self {
        Self::new(|_, input| Ok(input.to_uppercase()))
    }

    /// Every call waits for [`FakeBackend::release`] before answering.
    pub fn blocking(mut self) -> Self {
        self.release = Some(Notify::new());
        self
    }

    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        if let Some(release) = &self.release {
            release.notify_one();
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn credentials(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendTransform for FakeBackend {
    async fn transform(
        &self,
        credential: &str,
        instructions: &str,
        input: &str,
    ) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.credentials.lock().unwrap().push(credential.to_string());
        self.started.notify_one();
        if let Some(release) = &self.release {
            release.notified().await;
        }
        (self.respond)(instructions, input)
    }
}

pub struct FakeCredential {
    value: Result<Option<String>, String>,
    loads: AtomicUsize,
}

impl FakeCredential {
    pub fn key(key: &str) -> Self {
        Self::from_result(Ok(Some(key.to_string())))
    }

    pub fn missing() -> Self {
        Self::from_result(Ok(None))
    }

    pub fn broken(message: &str) -> Self {
        Self::from_result(Err(message.to_string()))
    }

    fn from_result(value: Result<Option<String>, String>) -> Self {
        Self {
            value,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl CredentialProvider for FakeCredential {
    fn load_credential(&self) -> Result<Option<String>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.value {
            Ok(value) => Ok(value.clone()),
            Err(message) => bail!("{}", message),
        }
    }
}

/// Orchestrator wired to fakes, with a non-empty user clipboard.
pub struct Harness {
    pub clipboard: Arc<FakeClipboard>,
    pub injector: Arc<FakeInjector>,
    pub backend: Arc<FakeBackend>,
    pub credential: Arc<FakeCredential>,
}

impl Harness {
    pub fn user_clipboard() -> Vec<ClipboardItem> {
        vec![ClipboardItem::new(vec![
            Representation::new(PLAIN_TEXT_TYPE, "user clipboard"),
            Representation::new("public.rtf", r"{\rtf1 user clipboard}"),
        ])]
    }

    pub fn new(selection: Option<&str>, backend: FakeBackend, credential: FakeCredential) -> Self {
        let clipboard = Arc::new(FakeClipboard::with_items(Self::user_clipboard()));
        let injector = Arc::new(match selection {
            Some(text) => FakeInjector::selecting(clipboard.clone(), text),
            None => FakeInjector::new(clipboard.clone(), None),
        });
        Self {
            clipboard,
            injector,
            backend: Arc::new(backend),
            credential: Arc::new(credential),
        }
    }

    pub fn orchestrator(&self) -> RewriteOrchestrator {
        let selection = ClipboardSelectionIo::new(
            self.clipboard.clone(),
            self.injector.clone(),
            Arc::new(FakePermission::trusted()),
            SettleTiming {
                copy: std::time::Duration::ZERO,
                paste: std::time::Duration::ZERO,
            },
        );
        RewriteOrchestrator::new(
            self.credential.clone(),
            Arc::new(selection),
            self.backend.clone(),
        )
    }
}
