//! Owns the rewrite state: working gate, selected preset and last status.
//!
//! Triggers from the hotkey listener or the CLI arrive here. At most one run
//! is admitted at a time; triggers that arrive while a run is in flight are
//! dropped.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::error::RewriteError;
use crate::managers::rewrite::RewriteOrchestrator;
use crate::managers::working_gate::{WorkingGate, WorkingGuard};
use crate::presets::{PresetCatalog, PresetError, PromptPreset};

/// User-visible status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteStatus {
    Ready,
    Rewriting,
    Rewrote { preset_name: String },
    Error(String),
}

impl fmt::Display for RewriteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RewriteStatus::Ready => write!(f, "Ready"),
            RewriteStatus::Rewriting => write!(f, "Rewriting..."),
            RewriteStatus::Rewrote { preset_name } => {
                write!(f, "Rewrote selection ({})", preset_name)
            }
            RewriteStatus::Error(message) => write!(f, "Error: {}", message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Hotkey,
    Cli,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Another run was in flight; nothing was touched.
    Dropped,
    Completed(Result<String, RewriteError>),
}

/// Puts the status line back to `Ready` when a run is dropped before it
/// publishes its outcome.
struct StatusGuard<'a> {
    status: &'a watch::Sender<RewriteStatus>,
    published: bool,
}

impl StatusGuard<'_> {
    fn publish(mut self, outcome: RewriteStatus) {
        self.published = true;
        self.status.send_replace(outcome);
    }
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        if !self.published {
            self.status.send_replace(RewriteStatus::Ready);
        }
    }
}

pub struct RewriteCoordinator {
    gate: WorkingGate,
    orchestrator: RewriteOrchestrator,
    catalog: PresetCatalog,
    selected: Mutex<PromptPreset>,
    status: watch::Sender<RewriteStatus>,
}

impl RewriteCoordinator {
    pub fn new(
        orchestrator: RewriteOrchestrator,
        catalog: PresetCatalog,
        selected_id: Option<&str>,
    ) -> Self {
        let selected = catalog.resolve(selected_id);
        let (status, _) = watch::channel(RewriteStatus::Ready);
        Self {
            gate: WorkingGate::new(),
            orchestrator,
            catalog,
            selected: Mutex::new(selected),
            status,
        }
    }

    pub fn selected_preset(&self) -> PromptPreset {
        self.selected.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Switches the active preset. Takes effect for the next admitted run.
    pub fn select_preset(&self, id: &str) -> Result<PromptPreset, PresetError> {
        let preset = self.catalog.require(id)?.clone();
        *self.selected.lock().unwrap_or_else(|e| e.into_inner()) = preset.clone();
        info!(preset = %preset.id, "Selected preset");
        Ok(preset)
    }

    pub fn is_working(&self) -> bool {
        self.gate.is_working()
    }

    pub fn last_status(&self) -> RewriteStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<RewriteStatus> {
        self.status.subscribe()
    }

    /// Rewrites the selection with the selected preset, unless a run is
    /// already in flight.
    pub async fn trigger(&self, source: TriggerSource) -> TriggerOutcome {
        let Some(guard) = self.gate.try_enter() else {
            info!(?source, "Rewrite already in progress, ignoring duplicate trigger");
            return TriggerOutcome::Dropped;
        };
        debug!(?source, "Trigger admitted");
        let preset = self.selected_preset();
        TriggerOutcome::Completed(self.run_admitted(guard, preset).await)
    }

    async fn run_admitted(
        &self,
        _guard: WorkingGuard,
        preset: PromptPreset,
    ) -> Result<String, RewriteError> {
        self.status.send_replace(RewriteStatus::Rewriting);
        let status = StatusGuard {
            status: &self.status,
            published: false,
        };

        let result = self.orchestrator.run(&preset).await;

        status.publish(match &result {
            Ok(_) => RewriteStatus::Rewrote {
                preset_name: preset.name.clone(),
            },
            Err(e) => RewriteStatus::Error(e.to_string()),
        });
        result
    }

    /// Consumes triggers until every sender is dropped. Each admitted run
    /// executes as its own task so the loop keeps rejecting duplicates.
    pub async fn listen(self: Arc<Self>, mut triggers: mpsc::UnboundedReceiver<TriggerSource>) {
        while let Some(source) = triggers.recv().await {
            let Some(guard) = self.gate.try_enter() else {
                info!(?source, "Rewrite already in progress, ignoring duplicate trigger");
                continue;
            };
            debug!(?source, "Trigger admitted");
            let coordinator = self.clone();
            let preset = self.selected_preset();
            tokio::spawn(async move {
                // Outcome is published through the status channel.
                let _ = coordinator.run_admitted(guard, preset).await;
            });
        }
        debug!("Trigger channel closed");
    }
}
