use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "rewrite-text")]
#[command(about = "Rewrite the selected text in any application", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Settings file (defaults to <config dir>/rewrite-text/settings.json)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Directory for rolling log files
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Debug-level console logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Listen for the global hotkey and rewrite on every press (Ctrl-C to quit)
    Listen,
    /// Rewrite the current selection once
    Rewrite {
        /// Preset id to use instead of the selected one
        #[arg(short, long)]
        preset: Option<String>,
    },
    /// List presets, marking the selected one
    Presets,
    /// Select the preset used by `listen` and `rewrite`
    SelectPreset { id: String },
    /// Store the API key in the system keyring (reads stdin when omitted)
    SetKey { key: Option<String> },
    /// Remove the stored API key
    ClearKey,
    /// Send a minimal request to verify the API key
    TestKey,
    /// Show where the API key comes from, permission state and the selected preset
    Status,
    /// Check accessibility permission and prompt for it if missing
    Permission,
}
