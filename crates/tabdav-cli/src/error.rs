use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tabdav_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No to-do text provided")]
    EmptyTodoText,
    #[error("No to-do entry with id {0}")]
    TodoNotFound(i64),
    #[error(
        "WebDAV is not configured. Run `tabdav config init --url <URL> --username <USER> --password <PASS>` first."
    )]
    NotConfigured,
}
