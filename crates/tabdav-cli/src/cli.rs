use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tabdav")]
#[command(about = "Sync a TabDAV dataset against a WebDAV share")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local data store file
    #[arg(long, global = true, value_name = "PATH")]
    pub data_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the WebDAV connection configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Probe connectivity and credentials against the configured share
    Test,
    /// Show local and remote sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload the local dataset as a new snapshot
    Push,
    /// Reconcile against the newest remote snapshot
    Pull,
    /// Resolve a pending sync conflict
    Resolve {
        /// Which side wins
        #[arg(value_enum)]
        choice: ResolveChoice,
    },
    /// Manage manual remote backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },
    /// Watch the store and upload changes after a quiet period
    Watch,
    /// Manage new-tab shortcuts
    Shortcut {
        #[command(subcommand)]
        command: ShortcutCommands,
    },
    /// Manage the to-do list
    Todo {
        #[command(subcommand)]
        command: TodoCommands,
    },
    /// Manage the notes scratchpad
    Notes {
        #[command(subcommand)]
        command: NotesCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Save the WebDAV connection settings
    Init {
        /// Base URL of the WebDAV share (http/https)
        #[arg(long)]
        url: String,
        /// Basic-auth username (empty disables authentication)
        #[arg(long, default_value = "")]
        username: String,
        /// Basic-auth password
        #[arg(long, default_value = "")]
        password: String,
        /// Per-request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Show the saved connection settings (password redacted)
    Show,
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Push the current dataset as a manual backup
    Create,
    /// List remote backups, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch and apply a named backup
    Restore {
        /// Backup filename as shown by `backup list`
        filename: String,
    },
    /// Delete a named backup
    Delete {
        /// Backup filename as shown by `backup list`
        filename: String,
    },
}

#[derive(Subcommand)]
pub enum ShortcutCommands {
    /// Add a shortcut tile
    Add {
        /// Display name
        name: String,
        /// Target URL
        url: String,
    },
    /// List shortcuts in display order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum TodoCommands {
    /// Add a to-do entry
    Add {
        /// Entry text
        text: Vec<String>,
    },
    /// List to-do entries
    List,
    /// Mark an entry as completed
    Done {
        /// Entry id as shown by `todo list`
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum NotesCommands {
    /// Replace the notes scratchpad
    Set {
        /// New contents
        text: Vec<String>,
    },
    /// Print the notes scratchpad
    Show,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ResolveChoice {
    /// Push the local dataset, ignoring cloud content
    Local,
    /// Adopt the cloud snapshot, overwriting local data
    Remote,
    /// Cloud-biased merge of both datasets
    Merge,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
