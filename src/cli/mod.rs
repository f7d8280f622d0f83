//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Stockbook sync - backup, restore and remote sync for your shop records
#[derive(Parser, Debug)]
#[command(name = "stockbook", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.stockbook/data/stockbook.db)
    #[arg(long, global = true, env = "STOCKBOOK_DB")]
    pub db: Option<PathBuf>,

    /// User the backup belongs to (default: signed-in session)
    #[arg(long, global = true, env = "STOCKBOOK_USER")]
    pub user: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and database
    Init {
        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Sign in or out of the local session
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Show what a backup would contain and when the last one ran
    Status,

    /// Local backup archives and documents
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },

    /// Remote backup storage
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Session Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Remember a user as the signed-in principal
    Login {
        /// User ID
        user_id: String,

        /// Account email
        #[arg(long)]
        email: Option<String>,
    },

    /// Forget the signed-in principal
    Logout,

    /// Show the signed-in principal
    Show,
}

// ============================================================================
// Backup Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Write a zip archive with records and images
    Create {
        /// Destination archive
        output: PathBuf,
    },

    /// Restore records and images from an archive
    Restore {
        /// Archive to restore
        archive: PathBuf,
    },

    /// Write the bare JSON document (no images)
    Export {
        /// Destination file
        output: PathBuf,
    },

    /// Restore records from a bare JSON document
    Import {
        /// Document to import
        input: PathBuf,
    },

    /// Decode an archive or document without touching storage
    Inspect {
        /// Archive or document
        path: PathBuf,
    },
}

// ============================================================================
// Remote Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum RemoteCommands {
    /// Upload a fresh backup for the current user
    Push,

    /// Download and restore the latest backup for the current user
    Pull,

    /// Save remote storage settings
    Configure {
        /// Object storage base URL
        #[arg(long)]
        url: Option<String>,

        /// Host that marks product photo URLs as remote
        #[arg(long)]
        domain: Option<String>,

        /// Bearer token for the storage API
        #[arg(long)]
        token: Option<String>,
    },

    /// Show effective remote settings
    Show,
}
