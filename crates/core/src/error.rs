use std::path::PathBuf;

use crate::AlbumId;

/// Result alias that carries the custom [`OrganizerError`] type.
pub type Result<T> = std::result::Result<T, OrganizerError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum OrganizerError {
    /// Sub-album creation targeted a parent that is not part of the tree.
    #[error("album {0} is not a valid parent")]
    InvalidParent(AlbumId),
    /// The root album is the whole library and can never be detached.
    #[error("the root album cannot be removed")]
    RootRemovalForbidden,
    /// Playback was requested with zero clips.
    #[error("a playback batch needs at least one clip")]
    EmptyBatch,
    /// A single clip could not be played. Scoped to that clip only.
    #[error("failed to play `{}`: {reason}", path.display())]
    ClipPlaybackFailure { path: PathBuf, reason: String },
    #[error("album {0} does not exist")]
    UnknownAlbum(AlbumId),
    #[error("the playback queue has been closed")]
    QueueClosed,
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl OrganizerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn playback(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::ClipPlaybackFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
