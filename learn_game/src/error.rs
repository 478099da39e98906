use std::path::PathBuf;

/// Errors raised by the environment, the agent and Q-table persistence.
#[derive(Debug, thiserror::Error)]
pub enum LearnError {
    #[error("no legal actions available")]
    NoLegalActions,

    #[error("episode already finished, reset the environment first")]
    EpisodeAlreadyTerminal,

    #[error("no q-table found at {0}, please train the agent first")]
    PersistenceNotFound(PathBuf),

    #[error("q-table at {path} is corrupt: {reason}")]
    PersistenceCorrupt { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
