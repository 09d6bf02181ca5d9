//! Application context tying the album tree to the playback pipeline.

use std::sync::{mpsc::Sender, Arc};

use crate::{
    AlbumTree, AppConfig, BatchId, ClipPlayer, PlaybackEvent, PlaybackQueue, PlayerWorker, Result,
    SoundClip,
};

/// Owns the album tree, the playback queue and the worker draining it.
///
/// Built once at start-up and passed by reference to whatever drives it.
/// The tree and queue are shared through `Arc` so other threads can hold
/// them directly.
#[derive(Debug)]
pub struct Organizer {
    config: AppConfig,
    tree: Arc<AlbumTree>,
    queue: Arc<PlaybackQueue>,
    worker: PlayerWorker,
}

impl Organizer {
    /// Starts with an empty library whose root is titled from `config`.
    pub fn start<P>(config: AppConfig, player: P) -> Result<Self>
    where
        P: ClipPlayer + 'static,
    {
        let tree = AlbumTree::new(config.library.root_title.clone());
        Self::start_with(config, tree, player, None)
    }

    /// Starts around an existing tree, e.g. one restored from a snapshot,
    /// optionally forwarding worker progress to `event_tx`.
    pub fn start_with<P>(
        config: AppConfig,
        tree: AlbumTree,
        player: P,
        event_tx: Option<Sender<PlaybackEvent>>,
    ) -> Result<Self>
    where
        P: ClipPlayer + 'static,
    {
        let queue = Arc::new(PlaybackQueue::new());
        let worker = PlayerWorker::spawn(Arc::clone(&queue), player, event_tx)?;
        tracing::debug!(root = %config.library.root_title, "organizer started");

        Ok(Self {
            config,
            tree: Arc::new(tree),
            queue,
            worker,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn tree(&self) -> &Arc<AlbumTree> {
        &self.tree
    }

    pub fn queue(&self) -> &Arc<PlaybackQueue> {
        &self.queue
    }

    /// Adds clips found by a loader to the root album.
    pub fn import_clips<I>(&self, clips: I) -> Result<()>
    where
        I: IntoIterator<Item = SoundClip>,
    {
        self.tree.add_clips(self.tree.root(), clips)
    }

    /// Queues `clips` for playback as one batch. Never waits on audio.
    pub fn play(&self, clips: Vec<SoundClip>) -> Result<BatchId> {
        let id = self.queue.enqueue_clips(clips)?;
        tracing::debug!(batch = %id, "playback requested");
        Ok(id)
    }

    /// Closes the queue using the configured [`crate::ShutdownMode`] and
    /// waits for the worker to finish.
    pub fn shutdown(self) -> Result<usize> {
        let mode = self.config.playback.shutdown;
        let discarded = self.worker.shutdown(mode)?;
        if discarded > 0 {
            tracing::info!(discarded, "pending playback dropped on shutdown");
        }
        Ok(discarded)
    }
}
