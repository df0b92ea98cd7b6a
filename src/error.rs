use std::path::PathBuf;

/// Failures surfaced by the simulation core.
///
/// Winning or losing a session is not an error; those outcomes travel as
/// [`crate::types::GameOverReason`].
#[derive(thiserror::Error, Debug)]
pub enum GameError {
    /// Reading or writing a map or log file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A map description could not be turned into a maze
    #[error("malformed map: {0}")]
    MapFormat(String),

    /// A line of an event log has an unexpected shape
    #[error("malformed log record at line {line}: {reason}")]
    MalformedLogRecord { line: usize, reason: String },

    /// No map could be chosen from the configured source
    #[error("no map available in {}", .0.display())]
    NoMapAvailable(PathBuf),

    /// The game executor is gone
    #[error("game executor is no longer running")]
    ExecutorClosed,

    /// Unexpected internal fault
    #[error("internal fault: {0}")]
    Other(String),
}

pub type GameResult<T> = Result<T, GameError>;
