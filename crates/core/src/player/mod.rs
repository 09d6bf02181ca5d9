//! Background playback worker.
//!
//! A single dedicated thread drains the [`PlaybackQueue`] and plays each
//! batch clip by clip through a [`ClipPlayer`]. The caller's thread only ever
//! enqueues, so requesting playback never waits on audio.
//!
//! A clip that fails to play, or a player that panics, is reported as a
//! [`PlaybackEvent::ClipFailed`] and logged; the worker moves on to the next
//! clip. The worker stops only when the queue is closed.

use std::{
    fs::File,
    io::{self, BufReader},
    panic::{self, AssertUnwindSafe},
    sync::{mpsc::Sender, Arc},
    thread::{self, JoinHandle},
};

use crate::{BatchId, OrganizerError, PlaybackQueue, Result, ShutdownMode, SoundClip};

/// Plays one clip, returning once playback has completed.
pub trait ClipPlayer: Send {
    fn play(&mut self, clip: &SoundClip) -> Result<()>;
}

impl<F> ClipPlayer for F
where
    F: FnMut(&SoundClip) -> Result<()> + Send,
{
    fn play(&mut self, clip: &SoundClip) -> Result<()> {
        self(clip)
    }
}

/// Streams the backing file of each clip to a sink.
///
/// Decoding and audio output live outside this crate; this player gives
/// the pipeline a real, blocking unit of work per clip and surfaces missing
/// or unreadable files as [`OrganizerError::ClipPlaybackFailure`].
#[derive(Debug, Default)]
pub struct FileClipPlayer;

impl ClipPlayer for FileClipPlayer {
    fn play(&mut self, clip: &SoundClip) -> Result<()> {
        let file = File::open(clip.path())
            .map_err(|err| OrganizerError::playback(clip.path(), err))?;
        let bytes = io::copy(&mut BufReader::new(file), &mut io::sink())
            .map_err(|err| OrganizerError::playback(clip.path(), err))?;
        tracing::debug!(clip = %clip, bytes, "clip played");
        Ok(())
    }
}

/// Progress reported by the worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    BatchStarted { batch: BatchId, clips: usize },
    ClipStarted { batch: BatchId, clip: SoundClip },
    ClipFinished { batch: BatchId, clip: SoundClip },
    /// Asynchronous report of a clip playback failure.
    ClipFailed {
        batch: BatchId,
        clip: SoundClip,
        reason: String,
    },
    BatchFinished { batch: BatchId, failures: usize },
}

/// Handle to the running playback thread.
#[derive(Debug)]
pub struct PlayerWorker {
    queue: Arc<PlaybackQueue>,
    join_handle: Option<JoinHandle<()>>,
}

impl PlayerWorker {
    /// Spawns the worker thread consuming `queue`.
    ///
    /// # Arguments
    ///
    /// * `queue` - The queue the worker drains.
    /// * `player` - Backend that performs the blocking playback of a clip.
    /// * `event_tx` - Optional channel receiving [`PlaybackEvent`]s.
    pub fn spawn<P>(
        queue: Arc<PlaybackQueue>,
        player: P,
        event_tx: Option<Sender<PlaybackEvent>>,
    ) -> Result<Self>
    where
        P: ClipPlayer + 'static,
    {
        let worker_queue = Arc::clone(&queue);
        let join_handle = thread::Builder::new()
            .name("clip-player".into())
            .spawn(move || run(&worker_queue, player, event_tx))?;

        Ok(Self {
            queue,
            join_handle: Some(join_handle),
        })
    }

    pub fn queue(&self) -> &Arc<PlaybackQueue> {
        &self.queue
    }

    /// Closes the queue and waits for the worker to exit. Returns how many
    /// pending batches were discarded.
    pub fn shutdown(mut self, mode: ShutdownMode) -> Result<usize> {
        let discarded = self.queue.close(mode)?;
        if let Some(handle) = self.join_handle.take() {
            handle
                .join()
                .map_err(|_| OrganizerError::msg("playback worker panicked"))?;
        }
        Ok(discarded)
    }
}

impl Drop for PlayerWorker {
    fn drop(&mut self) {
        if self.join_handle.is_some() {
            let _ = self.queue.close(ShutdownMode::Discard);
        }
    }
}

fn run<P: ClipPlayer>(
    queue: &PlaybackQueue,
    mut player: P,
    event_tx: Option<Sender<PlaybackEvent>>,
) {
    tracing::info!("playback worker started");
    let emit = |event: PlaybackEvent| {
        if let Some(tx) = &event_tx {
            let _ = tx.send(event);
        }
    };

    loop {
        let (batch_id, batch) = match queue.dequeue() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) => {
                tracing::error!(error = %err, "playback queue unavailable");
                break;
            }
        };

        tracing::debug!(batch = %batch_id, clips = batch.len(), "playing batch");
        emit(PlaybackEvent::BatchStarted {
            batch: batch_id,
            clips: batch.len(),
        });

        let mut failures = 0;
        for clip in batch.clips() {
            if queue.is_discarding().unwrap_or(true) {
                tracing::debug!(batch = %batch_id, "batch abandoned on shutdown");
                break;
            }

            emit(PlaybackEvent::ClipStarted {
                batch: batch_id,
                clip: clip.clone(),
            });
            match play_guarded(&mut player, clip) {
                Ok(()) => emit(PlaybackEvent::ClipFinished {
                    batch: batch_id,
                    clip: clip.clone(),
                }),
                Err(err) => {
                    failures += 1;
                    tracing::warn!(clip = %clip, error = %err, "clip playback failed");
                    emit(PlaybackEvent::ClipFailed {
                        batch: batch_id,
                        clip: clip.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        emit(PlaybackEvent::BatchFinished {
            batch: batch_id,
            failures,
        });
    }

    tracing::info!("playback worker stopped");
}

fn play_guarded<P: ClipPlayer>(player: &mut P, clip: &SoundClip) -> Result<()> {
    match panic::catch_unwind(AssertUnwindSafe(|| player.play(clip))) {
        Ok(result) => result,
        Err(_) => Err(OrganizerError::playback(clip.path(), "player panicked")),
    }
}
