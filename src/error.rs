use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("malformed subtitle block at line {line}: {reason}")]
    MalformedSubtitleBlock { line: usize, reason: &'static str },

    #[error("file name is not an episode number: {}", .0.display())]
    InvalidEpisodeName(PathBuf),

    #[error("no show folder could be derived for {}", .0.display())]
    UnparseableShowFolder(PathBuf),

    #[error("tokenization failed: {0}")]
    Tokenization(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(
        "data directory does not exist and could not be created: {}",
        .0.display()
    )]
    DataDir(PathBuf),
}

impl Error {
    /// Whether the error came from the index database rather than from the
    /// corpus or the tokenizer.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::Redb(_)
                | Error::RedbDatabase(_)
                | Error::RedbStorage(_)
                | Error::RedbTransaction(_)
                | Error::RedbTable(_)
                | Error::RedbCommit(_)
                | Error::Storage(_)
        )
    }

    /// Per-file and per-block errors are skipped during a build; everything
    /// else aborts it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedSubtitleBlock { .. }
                | Error::InvalidEpisodeName(_)
                | Error::UnparseableShowFolder(_)
        )
    }
}
