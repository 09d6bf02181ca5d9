//! Core library for the Sound Organizer application.
//!
//! The crate holds the two pieces of the organizer with real concurrency
//! concerns: the album hierarchy, shared between command and display
//! threads, and the playback pipeline, which hands batches of clips from the
//! caller's thread to a dedicated player thread. Window construction, export
//! formats and clip discovery live with the callers.

pub mod album;
pub mod clip;
pub mod config;
pub mod error;
pub mod notify;
pub mod organizer;
pub mod player;
pub mod queue;
pub mod snapshot;

pub use album::{AlbumId, AlbumTree, DEFAULT_ROOT_TITLE};
pub use clip::SoundClip;
pub use config::{AppConfig, LibraryConfig, PlaybackConfig};
pub use error::{OrganizerError, Result};
pub use notify::{AlbumEvent, ChangeNotifier, SubscriptionId};
pub use organizer::Organizer;
pub use player::{ClipPlayer, FileClipPlayer, PlaybackEvent, PlayerWorker};
pub use queue::{BatchId, PlaybackBatch, PlaybackQueue, ShutdownMode};
pub use snapshot::{AlbumSnapshot, LibrarySnapshot};
