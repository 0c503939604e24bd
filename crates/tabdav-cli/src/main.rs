//! TabDAV CLI - drive the sync engine from the terminal
//!
//! Hosts the sync core over a file-backed data store, standing in for
//! the browser extension on machines where only the dataset matters.

mod cli;
mod error;

use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use clap::{CommandFactory, Parser};
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};
use serde::Serialize;
use tabdav_core::models::{Shortcut, Todo};
use tabdav_core::store::{keys, watch_store_file, FileBackend};
use tabdav_core::sync::backup::BackupEntry;
use tabdav_core::{
    ConflictResolution, LocalDataStore, RemoteStore, ResolutionOutcome, StartupOutcome,
    SyncEngine, WebDavClient, WebDavConfig,
};

use crate::cli::{
    BackupCommands, Cli, Commands, CompletionShell, ConfigCommands, NotesCommands, ResolveChoice,
    ShortcutCommands, TodoCommands,
};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tabdav=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let data_path = resolve_data_path(cli.data_path);

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Init {
                url,
                username,
                password,
                timeout_ms,
            } => run_config_init(&url, &username, &password, timeout_ms, &data_path).await?,
            ConfigCommands::Show => run_config_show(&data_path).await?,
        },
        Commands::Test => run_test(&data_path).await?,
        Commands::Status { json } => run_status(json, &data_path).await?,
        Commands::Push => run_push(&data_path).await?,
        Commands::Pull => run_pull(&data_path).await?,
        Commands::Resolve { choice } => run_resolve(choice, &data_path).await?,
        Commands::Backup { command } => match command {
            BackupCommands::Create => run_backup_create(&data_path).await?,
            BackupCommands::List { json } => run_backup_list(json, &data_path).await?,
            BackupCommands::Restore { filename } => run_backup_restore(&filename, &data_path).await?,
            BackupCommands::Delete { filename } => run_backup_delete(&filename, &data_path).await?,
        },
        Commands::Watch => run_watch(&data_path).await?,
        Commands::Shortcut { command } => match command {
            ShortcutCommands::Add { name, url } => {
                let store = open_store(&data_path).await?;
                let shortcut = add_shortcut(&store, &name, &url).await?;
                println!("{}", shortcut.id);
            }
            ShortcutCommands::List { json } => run_shortcut_list(json, &data_path).await?,
        },
        Commands::Todo { command } => match command {
            TodoCommands::Add { text } => {
                let store = open_store(&data_path).await?;
                let todo = add_todo(&store, &text.join(" ")).await?;
                println!("{}", todo.id);
            }
            TodoCommands::List => run_todo_list(&data_path).await?,
            TodoCommands::Done { id } => {
                let store = open_store(&data_path).await?;
                complete_todo(&store, id).await?;
                println!("{id}");
            }
        },
        Commands::Notes { command } => match command {
            NotesCommands::Set { text } => {
                let store = open_store(&data_path).await?;
                store.set_json(keys::NOTES, &text.join(" ")).await?;
            }
            NotesCommands::Show => {
                let store = open_store(&data_path).await?;
                let notes: String = store.get_json(keys::NOTES).await?.unwrap_or_default();
                println!("{notes}");
            }
        },
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}

async fn open_store(path: &Path) -> Result<Arc<LocalDataStore>, CliError> {
    let backend = FileBackend::open(path)?;
    let store = Arc::new(LocalDataStore::new(Arc::new(backend)));
    store.load_offline_mirror().await;
    Ok(store)
}

/// Open the store and build an engine; fails when no WebDAV
/// configuration has been saved yet.
async fn open_engine(path: &Path) -> Result<Arc<SyncEngine>, CliError> {
    let store = open_store(path).await?;
    let config = store.webdav_config().await?.ok_or(CliError::NotConfigured)?;
    let client = WebDavClient::new(&config)?;
    Ok(Arc::new(SyncEngine::new(store, Arc::new(client))))
}

async fn run_config_init(
    url: &str,
    username: &str,
    password: &str,
    timeout_ms: Option<u64>,
    data_path: &Path,
) -> Result<(), CliError> {
    let mut config = WebDavConfig::new(url, username, password);
    if let Some(timeout_ms) = timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    let config = config.normalized()?;

    let store = open_store(data_path).await?;
    store.set_webdav_config(&config).await?;
    println!("Saved WebDAV configuration for {}", config.url);
    Ok(())
}

async fn run_config_show(data_path: &Path) -> Result<(), CliError> {
    let store = open_store(data_path).await?;
    match store.webdav_config().await? {
        // Debug output redacts the password.
        Some(config) => println!("{config:#?}"),
        None => return Err(CliError::NotConfigured),
    }
    Ok(())
}

async fn run_test(data_path: &Path) -> Result<(), CliError> {
    let store = open_store(data_path).await?;
    let config = store.webdav_config().await?.ok_or(CliError::NotConfigured)?;
    let client = WebDavClient::new(&config)?;
    client.test_connection().await?;
    println!("Connection OK");
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport {
    configured: bool,
    local_timestamp: Option<i64>,
    local_time: Option<String>,
    cloud_snapshot: Option<String>,
    cloud_timestamp: Option<i64>,
    in_sync: Option<bool>,
}

async fn run_status(as_json: bool, data_path: &Path) -> Result<(), CliError> {
    let store = open_store(data_path).await?;
    let local_timestamp = store.last_sync_timestamp().await?;
    let configured = store.webdav_config().await?.is_some();

    let cloud = if configured {
        let engine = open_engine(data_path).await?;
        engine.latest_sync_snapshot().await?
    } else {
        None
    };

    let report = StatusReport {
        configured,
        local_timestamp,
        local_time: local_timestamp.map(format_timestamp),
        cloud_snapshot: cloud.as_ref().map(|(name, _)| name.clone()),
        cloud_timestamp: cloud.as_ref().map(|(_, ts)| *ts),
        in_sync: match (local_timestamp, &cloud) {
            (Some(local), Some((_, cloud_ts))) => Some(local == *cloud_ts),
            _ => None,
        },
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if !report.configured {
        println!("WebDAV: not configured");
    }
    match report.local_timestamp {
        Some(ts) => println!("Last sync: {} ({ts})", format_timestamp(ts)),
        None => println!("Last sync: never"),
    }
    match &report.cloud_snapshot {
        Some(name) => println!("Newest remote snapshot: {name}"),
        None if report.configured => println!("Newest remote snapshot: none"),
        None => {}
    }
    if let Some(in_sync) = report.in_sync {
        println!("In sync: {}", if in_sync { "yes" } else { "no" });
    }
    Ok(())
}

async fn run_push(data_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_path).await?;
    let report = engine.upload_now().await?;
    println!("{}", report.filename);
    Ok(())
}

async fn run_pull(data_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_path).await?;
    match engine.startup_check().await? {
        StartupOutcome::NoRemoteData => println!("No remote snapshots found"),
        StartupOutcome::UpToDate => println!("Already up to date"),
        StartupOutcome::Downloaded(report) => {
            println!("Applied {}; reload any open new-tab pages", report.filename);
        }
        StartupOutcome::Conflict {
            cloud_filename,
            local_timestamp,
            cloud_timestamp,
        } => {
            println!("Conflict: local data ({}) is newer than the cloud snapshot {cloud_filename} ({})",
                format_timestamp(local_timestamp),
                format_timestamp(cloud_timestamp));
            println!("Run `tabdav resolve local|remote|merge` to settle it");
        }
    }
    Ok(())
}

async fn run_resolve(choice: ResolveChoice, data_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_path).await?;
    match engine.startup_check().await? {
        StartupOutcome::Conflict { .. } => {}
        other => {
            println!("No conflict to resolve ({other:?})");
            return Ok(());
        }
    }

    let resolution = match choice {
        ResolveChoice::Local => ConflictResolution::KeepLocal,
        ResolveChoice::Remote => ConflictResolution::KeepRemote,
        ResolveChoice::Merge => ConflictResolution::Merge,
    };

    match engine.resolve_conflict(resolution).await? {
        ResolutionOutcome::LocalPushed(report) => println!("Pushed local data as {}", report.filename),
        ResolutionOutcome::RemoteAdopted(report) => {
            println!("Adopted {}; reload any open new-tab pages", report.filename);
        }
        ResolutionOutcome::Merged(report) => {
            println!("Merged and pushed {}; reload any open new-tab pages", report.filename);
        }
    }
    Ok(())
}

async fn run_backup_create(data_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_path).await?;
    let report = engine.create_backup().await?;
    println!("{}", report.filename);
    Ok(())
}

async fn run_backup_list(as_json: bool, data_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_path).await?;
    let backups = engine.list_backups().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&backup_list_items(&backups))?);
    } else if backups.is_empty() {
        println!("No backups found");
    } else {
        for backup in &backups {
            println!(
                "{}  {}  {} bytes",
                backup.filename,
                format_timestamp(backup.timestamp),
                backup.size
            );
        }
    }
    Ok(())
}

async fn run_backup_restore(filename: &str, data_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_path).await?;
    engine.restore_backup(filename).await?;
    println!("Restored {filename}");
    Ok(())
}

async fn run_backup_delete(filename: &str, data_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(data_path).await?;
    engine.delete_backup(filename).await?;
    println!("Deleted {filename}");
    Ok(())
}

/// How often `watch` re-reads the store file for edits made by other
/// invocations.
const STORE_POLL_INTERVAL: Duration = Duration::from_millis(500);

async fn run_watch(data_path: &Path) -> Result<(), CliError> {
    let store = open_store(data_path).await?;
    let config = store.webdav_config().await?.ok_or(CliError::NotConfigured)?;
    let client = WebDavClient::new(&config)?;
    let engine = Arc::new(SyncEngine::new(store.clone(), Arc::new(client)));

    let watcher = engine.watch_changes();
    // Mutations arrive from other `tabdav` processes through the store
    // file; the poller folds them into this store so they reach the
    // debounce loop.
    let poller = watch_store_file(store, data_path.to_path_buf(), STORE_POLL_INTERVAL);
    println!("Watching for changes; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    poller.abort();
    watcher.abort();
    println!("Stopped");
    Ok(())
}

async fn run_shortcut_list(as_json: bool, data_path: &Path) -> Result<(), CliError> {
    let store = open_store(data_path).await?;
    let shortcuts: Vec<Shortcut> = store.get_json(keys::SHORTCUTS).await?.unwrap_or_default();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&shortcuts)?);
    } else {
        for shortcut in &shortcuts {
            println!("{:<24}  {}", shortcut.name, shortcut.url);
        }
    }
    Ok(())
}

async fn run_todo_list(data_path: &Path) -> Result<(), CliError> {
    let store = open_store(data_path).await?;
    let todos: Vec<Todo> = store.get_json(keys::TODOS).await?.unwrap_or_default();
    for todo in &todos {
        let marker = if todo.completed { "x" } else { " " };
        println!("[{marker}] {:<16}  {}", todo.id, todo.text);
    }
    Ok(())
}

async fn add_shortcut(
    store: &LocalDataStore,
    name: &str,
    url: &str,
) -> Result<Shortcut, CliError> {
    let mut shortcuts: Vec<Shortcut> = store.get_json(keys::SHORTCUTS).await?.unwrap_or_default();
    let shortcut = Shortcut::new(name, url);
    shortcuts.push(shortcut.clone());
    store.set_json(keys::SHORTCUTS, &shortcuts).await?;
    Ok(shortcut)
}

async fn add_todo(store: &LocalDataStore, text: &str) -> Result<Todo, CliError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(CliError::EmptyTodoText);
    }
    let mut todos: Vec<Todo> = store.get_json(keys::TODOS).await?.unwrap_or_default();
    let todo = Todo::new(text);
    todos.push(todo.clone());
    store.set_json(keys::TODOS, &todos).await?;
    Ok(todo)
}

async fn complete_todo(store: &LocalDataStore, id: i64) -> Result<(), CliError> {
    let mut todos: Vec<Todo> = store.get_json(keys::TODOS).await?.unwrap_or_default();
    let Some(todo) = todos.iter_mut().find(|todo| todo.id == id) else {
        return Err(CliError::TodoNotFound(id));
    };
    todo.completed = true;
    store.set_json(keys::TODOS, &todos).await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct BackupListItem {
    filename: String,
    timestamp: i64,
    time: String,
    size: u64,
}

fn backup_list_items(backups: &[BackupEntry]) -> Vec<BackupListItem> {
    backups
        .iter()
        .map(|backup| BackupListItem {
            filename: backup.filename.clone(),
            timestamp: backup.timestamp,
            time: format_timestamp(backup.timestamp),
            size: backup.size,
        })
        .collect()
}

fn format_timestamp(timestamp_millis: i64) -> String {
    match Utc.timestamp_millis_opt(timestamp_millis).single() {
        Some(moment) => moment.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("{timestamp_millis}"),
    }
}

fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();

    match shell {
        CompletionShell::Bash => generate_for_shell(shells::Bash, &mut command, &mut buffer),
        CompletionShell::Zsh => generate_for_shell(shells::Zsh, &mut command, &mut buffer),
        CompletionShell::Fish => generate_for_shell(shells::Fish, &mut command, &mut buffer),
    }

    if let Some(path) = output_path {
        std::fs::write(path, &buffer)?;
        println!("{}", path.display());
    } else {
        io::stdout().write_all(&buffer)?;
    }

    Ok(())
}

fn generate_for_shell<G: Generator>(
    generator: G,
    command: &mut clap::Command,
    buffer: &mut Vec<u8>,
) {
    generate(generator, command, "tabdav", buffer);
}

fn resolve_data_path(cli_data_path: Option<PathBuf>) -> PathBuf {
    cli_data_path
        .or_else(|| env::var_os("TABDAV_DATA_PATH").map(PathBuf::from))
        .unwrap_or_else(default_data_path)
}

fn default_data_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabdav")
        .join("store.json")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn temp_store_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("store.json")
    }

    #[test]
    fn resolve_data_path_prefers_explicit_flag() {
        let explicit = PathBuf::from("/tmp/custom.json");
        assert_eq!(resolve_data_path(Some(explicit.clone())), explicit);
    }

    #[test]
    fn default_data_path_ends_with_store_file() {
        let path = default_data_path();
        assert!(path.ends_with("tabdav/store.json"));
    }

    #[test]
    fn format_timestamp_renders_utc() {
        assert_eq!(
            format_timestamp(1_714_550_400_000),
            "2024-05-01 08:00:00 UTC"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn config_init_persists_normalized_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_store_path(&dir);

        run_config_init("https://dav.example.com/share", "alice", "pw", None, &path)
            .await
            .unwrap();

        let store = open_store(&path).await.unwrap();
        let config = store.webdav_config().await.unwrap().unwrap();
        assert_eq!(config.url, "https://dav.example.com/share/");
        assert_eq!(config.username, "alice");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn commands_without_config_report_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_store_path(&dir);

        assert!(matches!(
            open_engine(&path).await.unwrap_err(),
            CliError::NotConfigured
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shortcut_add_appends_in_display_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&temp_store_path(&dir)).await.unwrap();

        add_shortcut(&store, "First", "https://a.example.com").await.unwrap();
        add_shortcut(&store, "Second", "https://b.example.com").await.unwrap();

        let shortcuts: Vec<Shortcut> = store.get_json(keys::SHORTCUTS).await.unwrap().unwrap();
        let names: Vec<&str> = shortcuts.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn todo_done_marks_entry_completed() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&temp_store_path(&dir)).await.unwrap();

        let todo = add_todo(&store, "water the plants").await.unwrap();
        complete_todo(&store, todo.id).await.unwrap();

        let todos: Vec<Todo> = store.get_json(keys::TODOS).await.unwrap().unwrap();
        assert!(todos[0].completed);

        assert!(matches!(
            complete_todo(&store, -1).await.unwrap_err(),
            CliError::TodoNotFound(-1)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn add_todo_rejects_blank_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&temp_store_path(&dir)).await.unwrap();
        assert!(matches!(
            add_todo(&store, "  \n ").await.unwrap_err(),
            CliError::EmptyTodoText
        ));
    }

    #[test]
    fn run_completions_writes_bash_script_file() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("tabdav.bash");

        run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

        let script = std::fs::read_to_string(&output_path).unwrap();
        assert!(script.contains("_tabdav()"));
        assert!(script.contains("complete -F _tabdav"));
    }
}
