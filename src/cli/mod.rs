//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// mark - bookmarks replicated through a shared folder
#[derive(Parser, Debug)]
#[command(name = "mark", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store root (default: ~/.config/mark, or MARK_STORE_LOCATION)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Shared change directory (default: <store>/changes, or MARK_CHANGES_DIR)
    #[arg(long, global = true)]
    pub changes_dir: Option<PathBuf>,

    /// Host identity naming this replica's change file (default: hostname, or MARK_HOST_ID)
    #[arg(long, global = true)]
    pub host: Option<String>,

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
    /// Add a bookmark
    Add(AddArgs),

    /// Full-text search over url, title, description and tags
    Search {
        /// Search terms (all must match)
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a bookmark by URL
    Get {
        /// URL of the bookmark
        url: String,
    },

    /// List all bookmarks
    List {
        /// Maximum bookmarks to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Edit a bookmark (omitted fields keep their value)
    Edit(EditArgs),

    /// Delete a bookmark
    Delete {
        /// URL of the bookmark to delete
        url: String,
    },

    /// Manage access keys (local to this host)
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },

    /// Exchange changes with other hosts
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Print version information
    Version,

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
// Bookmark Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct AddArgs {
    /// URL to bookmark
    pub url: String,

    /// Title
    #[arg(short, long)]
    pub title: Option<String>,

    /// Description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Comma-separated tags
    #[arg(long)]
    pub tags: Option<String>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Current URL of the bookmark
    pub url: String,

    /// New URL
    #[arg(long)]
    pub new_url: Option<String>,

    /// New title
    #[arg(short, long)]
    pub title: Option<String>,

    /// New description
    #[arg(short, long)]
    pub description: Option<String>,

    /// New comma-separated tags (empty string clears)
    #[arg(long)]
    pub tags: Option<String>,
}

// ============================================================================
// Key Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum KeysCommands {
    /// Generate and store a new key
    New,

    /// Store an existing key
    Add {
        /// Key value
        key: String,
    },

    /// List keys
    List,

    /// Delete a key
    Delete {
        /// Key value
        key: String,
    },
}

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Import peer changes and export this host's change file
    Run,

    /// Show sync status
    Status,
}
