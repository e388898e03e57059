pub mod cli;
pub mod clipboard;
pub mod credentials;
pub mod error;
pub mod input;
pub mod llm_client;
pub mod managers;
pub mod permissions;
pub mod presets;
pub mod selection;
pub mod settings;
pub mod shortcut;
#[cfg(test)]
mod test_support;
pub mod tracing_config;
mod utils;

pub use cli::CliArgs;

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use cli::Command;
use clipboard::{hold_until_taken_over, LocalClipboard, SystemClipboard};
use credentials::{CredentialProvider, EnvOrStoredCredential, KeyringCredentialStore, API_KEY_ENV};
use error::RewriteError;
use input::EnigoInjector;
use llm_client::OpenAiClient;
use managers::coordinator::{RewriteCoordinator, TriggerOutcome, TriggerSource};
use managers::rewrite::RewriteOrchestrator;
use permissions::{AutomationPermission, SystemAutomationPermission};
use presets::PresetCatalog;
use selection::ClipboardSelectionIo;
use settings::{AppSettings, SettingsStore};
use shortcut::HotkeyBinding;

const CLIPBOARD_HOLD_POLL: Duration = Duration::from_millis(500);

pub async fn run(cli_args: CliArgs) -> Result<()> {
    let store = SettingsStore::new(match &cli_args.settings {
        Some(path) => path.clone(),
        None => settings::default_settings_path()?,
    });

    let log_dir = match &cli_args.log_dir {
        Some(dir) => dir.clone(),
        None => tracing_config::default_log_dir()
            .unwrap_or_else(|| std::env::temp_dir().join(settings::APP_DIR_NAME)),
    };
    tracing_config::init_tracing(&log_dir, cli_args.verbose)
        .context("failed to initialize logging")?;

    let result = run_command(&cli_args.command, &store).await;
    if let Err(e) = &result {
        warn!("Command failed: {:#}", e);
    }
    tracing_config::shutdown_tracing();
    result
}

async fn run_command(command: &Command, store: &SettingsStore) -> Result<()> {
    let mut settings = store.load()?;
    match tracing_config::parse_level(&settings.file_log_level) {
        Some(level) => tracing_config::set_file_log_level(level),
        None => warn!(level = %settings.file_log_level, "Unknown file log level in settings"),
    }
    let catalog = PresetCatalog::with_custom(&settings.custom_presets)
        .with_context(|| format!("invalid presets in {}", store.path().display()))?;

    match command {
        Command::Listen => listen(&settings, catalog).await,
        Command::Rewrite { preset } => rewrite_once(&settings, catalog, preset.as_deref()).await,
        Command::Presets => {
            let selected = catalog.resolve(settings.selected_preset_id.as_deref());
            for preset in catalog.presets() {
                let marker = if preset.id == selected.id { "*" } else { " " };
                println!("{} {:<20} {}", marker, preset.id, preset.name);
            }
            Ok(())
        }
        Command::SelectPreset { id } => {
            let preset = catalog.require(id)?.clone();
            settings.selected_preset_id = Some(preset.id.clone());
            store.save(&settings)?;
            info!(preset = %preset.id, "Persisted selected preset");
            println!("Selected preset: {}", preset.name);
            Ok(())
        }
        Command::SetKey { key } => {
            let key = match key {
                Some(key) => key.clone(),
                None => read_key_from_stdin()?,
            };
            KeyringCredentialStore::default().save(&key)?;
            println!("Saved API key to the system keyring.");
            if std::env::var(API_KEY_ENV).is_ok() {
                println!("Note: {} is set and takes precedence over the stored key.", API_KEY_ENV);
            }
            Ok(())
        }
        Command::ClearKey => {
            KeyringCredentialStore::default().clear()?;
            println!("Cleared stored API key.");
            Ok(())
        }
        Command::TestKey => test_key(&settings).await,
        Command::Status => print_status(&settings, &catalog).await,
        Command::Permission => {
            let permission = SystemAutomationPermission;
            if permission.is_trusted() {
                println!("Accessibility permission granted.");
                return Ok(());
            }
            permission.request();
            Err(RewriteError::PermissionDenied.into())
        }
    }
}

fn read_key_from_stdin() -> Result<String> {
    eprintln!("Paste your OpenAI API key and press Enter:");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read API key from stdin")?;
    Ok(line)
}

fn credential_provider() -> Arc<dyn CredentialProvider> {
    Arc::new(EnvOrStoredCredential::from_env(Arc::new(
        KeyringCredentialStore::default(),
    )))
}

fn backend_client(settings: &AppSettings) -> Result<OpenAiClient> {
    OpenAiClient::new(
        &settings.api_base_url,
        &settings.model,
        Duration::from_secs(settings.request_timeout_secs),
    )
}

fn open_clipboard() -> Result<Arc<dyn SystemClipboard>> {
    Ok(Arc::new(
        LocalClipboard::new().context("failed to open the system clipboard")?,
    ))
}

fn build_coordinator(
    settings: &AppSettings,
    catalog: PresetCatalog,
    clipboard: Arc<dyn SystemClipboard>,
) -> Result<Arc<RewriteCoordinator>> {
    let selection = ClipboardSelectionIo::new(
        clipboard,
        Arc::new(EnigoInjector::new()),
        Arc::new(SystemAutomationPermission),
        settings.settle_timing(),
    );
    let orchestrator = RewriteOrchestrator::new(
        credential_provider(),
        Arc::new(selection),
        Arc::new(backend_client(settings)?),
    );
    Ok(Arc::new(RewriteCoordinator::new(
        orchestrator,
        catalog,
        settings.selected_preset_id.as_deref(),
    )))
}

async fn rewrite_once(
    settings: &AppSettings,
    catalog: PresetCatalog,
    preset: Option<&str>,
) -> Result<()> {
    let system_clipboard = open_clipboard()?;
    let coordinator = build_coordinator(settings, catalog, system_clipboard.clone())?;
    if let Some(id) = preset {
        coordinator.select_preset(id)?;
    }

    let result = match coordinator.trigger(TriggerSource::Cli).await {
        TriggerOutcome::Completed(Ok(_)) => {
            println!("{}", coordinator.last_status());
            Ok(())
        }
        TriggerOutcome::Completed(Err(e)) => Err(e.into()),
        TriggerOutcome::Dropped => Err(anyhow!("a rewrite is already in progress")),
    };

    // X11 drops the restored clipboard with its owner; wait for a handoff.
    if system_clipboard.serves_contents() {
        eprintln!(
            "Keeping your clipboard available until another application takes it over (Ctrl-C to quit)."
        );
        tokio::select! {
            held = hold_until_taken_over(system_clipboard.clone(), CLIPBOARD_HOLD_POLL) => {
                if let Err(e) = held {
                    warn!("Stopped serving clipboard: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => warn!("Interrupted while serving clipboard"),
        }
    }
    result
}

async fn print_status(settings: &AppSettings, catalog: &PresetCatalog) -> Result<()> {
    let (source, stored) = tokio::task::spawn_blocking(|| {
        let store = KeyringCredentialStore::default();
        let stored = store.has();
        let source = EnvOrStoredCredential::from_env(Arc::new(store)).source();
        (source, stored)
    })
    .await?;

    let source = source?;
    match source {
        Some(source) => println!("API key:        configured ({})", source),
        None => println!("API key:        missing (run `rewrite-text set-key`)"),
    }
    if source == Some("environment") && stored? {
        println!("                stored key is overridden by {}", API_KEY_ENV);
    }

    let trusted = SystemAutomationPermission.is_trusted();
    println!(
        "Accessibility:  {}",
        if trusted { "granted" } else { "missing (run `rewrite-text permission`)" }
    );
    let preset = catalog.resolve(settings.selected_preset_id.as_deref());
    println!("Preset:         {} ({})", preset.name, preset.id);
    println!("Hotkey:         {}", settings.hotkey);
    println!("Model:          {}", settings.model);
    Ok(())
}

async fn test_key(settings: &AppSettings) -> Result<()> {
    let provider = credential_provider();
    let key = tokio::task::spawn_blocking(move || provider.load_credential())
        .await??
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or(RewriteError::MissingCredential)?;

    let reply = backend_client(settings)?.smoke_test(&key).await?;
    println!("API key OK (reply: {})", reply.trim());
    Ok(())
}

#[cfg(target_os = "macos")]
async fn listen(settings: &AppSettings, catalog: PresetCatalog) -> Result<()> {
    use managers::coordinator::RewriteStatus;

    let binding =
        HotkeyBinding::parse_allowed(&settings.hotkey).context("invalid hotkey in settings")?;
    let coordinator = build_coordinator(settings, catalog, open_clipboard()?)?;
    let (triggers_tx, triggers_rx) = tokio::sync::mpsc::unbounded_channel();
    let listener = shortcut::event_tap::start(binding, triggers_tx)?;

    let mut status = coordinator.subscribe_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let line = status.borrow_and_update().clone();
            match line {
                RewriteStatus::Error(_) => eprintln!("{}", line),
                _ => println!("{}", line),
            }
        }
    });
    let listen_task = tokio::spawn(coordinator.clone().listen(triggers_rx));

    println!(
        "Ready ({}) - preset: {}. Press Ctrl-C to quit.",
        binding,
        coordinator.selected_preset().name
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;

    info!("Shutting down hotkey listener");
    // Stopping the tap drops the last trigger sender, which ends the listen loop.
    drop(listener);
    let _ = listen_task.await;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
async fn listen(settings: &AppSettings, _catalog: PresetCatalog) -> Result<()> {
    let binding =
        HotkeyBinding::parse_allowed(&settings.hotkey).context("invalid hotkey in settings")?;
    Err(anyhow!(
        "global hotkeys ({}) are only supported on macOS; bind `rewrite-text rewrite` \
         to a desktop keyboard shortcut instead",
        binding
    ))
}
