use stratum_core::{CoreError, ScopeKey};
use stratum_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The store failed while enumerating overrides. The write was not applied
    /// and may be proposed again.
    #[error("conflict scan incomplete, write aborted: {source}")]
    ConflictDetectionIncomplete { source: StorageError },

    /// The store rejected the commit. Nothing was changed.
    #[error("commit to {target} failed: {source}")]
    CommitFailure { target: ScopeKey, source: StorageError },

    #[error("a write is already awaiting a conflict decision")]
    WriteAlreadyPending,

    #[error("no write is awaiting a conflict decision")]
    NoPendingWrite,

    #[error("no active edit session")]
    NoActiveEdit,

    #[error("override acknowledgement does not match the pending write")]
    StaleAcknowledgement,

    #[error("config error: {0}")]
    Config(String),
}
