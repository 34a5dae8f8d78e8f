//! Clap derive structures for the `sir` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// sir -- automated TLS certificate rollovers, including TLSA updates
#[derive(Debug, Parser)]
#[command(
    name = "sir",
    version,
    about = "Automated TLS certificate rollovers, including TLSA updates",
    long_about = "Creates keys and CSRs, calls your sign and rollover scripts, and keeps\n\
        the TLSA records of your zones in sync through nsupdate.\n\n\
        A rollover is two phases: phase1 publishes the new TLSA records next\n\
        to the old ones, phase2 installs the new certs and removes the old\n\
        records. Leave at least one TTL between them.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Certificate document (overrides the `document` setting)
    #[arg(long, short = 'c', env = "SIR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "SIR_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create private keys and associated CSRs
    Key,

    /// Call the sign script to create certs and chains
    Cert,

    /// Add TLSA records for the new certs
    #[command(name = "addtlsa")]
    AddTlsa,

    /// Call the rollover scripts to install the new certs
    Rollover,

    /// Delete all TLSA records and add only the current ones
    #[command(name = "updatetlsa")]
    UpdateTlsa,

    /// Do the key, cert and addtlsa steps
    Phase1,

    /// Do the rollover and updatetlsa steps
    Phase2,

    /// Do all steps
    Full,

    /// Validate the certificate document and list every TLSA record
    Check,

    /// Print the nsupdate scripts without running them
    Script(ScriptArgs),

    /// Show or create the tool settings
    Settings(SettingsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Script ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ScriptArgs {
    /// Render the delete-then-add scripts of `updatetlsa` instead of `addtlsa`
    #[arg(long, short = 'u')]
    pub update: bool,
}

// ── Settings ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Display the resolved settings
    Show,

    /// Print the settings file path
    Path,

    /// Write a settings file with the default values
    Init {
        /// Overwrite an existing settings file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
