//! Unbounded FIFO queue of playback batches.
//!
//! Producers call [`PlaybackQueue::enqueue`] from any thread and never
//! block beyond the short internal critical section. The single consumer
//! parks in [`PlaybackQueue::dequeue`] on a condition variable until a batch
//! arrives or the queue is closed.

use std::{
    collections::VecDeque,
    fmt,
    sync::{Condvar, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::{OrganizerError, Result, SoundClip};

/// Sequence number assigned to a batch when it is enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch {}", self.0)
    }
}

/// An ordered, non-empty list of clips requested for playback together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackBatch {
    clips: Vec<SoundClip>,
}

impl PlaybackBatch {
    pub fn new(clips: Vec<SoundClip>) -> Result<Self> {
        if clips.is_empty() {
            return Err(OrganizerError::EmptyBatch);
        }
        Ok(Self { clips })
    }

    pub fn clips(&self) -> &[SoundClip] {
        &self.clips
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    // Batches are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// What happens to batches still waiting when the queue is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownMode {
    /// Keep handing out pending batches until the queue is empty.
    #[default]
    Drain,
    /// Drop pending batches immediately.
    Discard,
}

#[derive(Debug, Default)]
struct QueueState {
    batches: VecDeque<(BatchId, PlaybackBatch)>,
    next_id: u64,
    closed: bool,
    discarding: bool,
}

#[derive(Debug, Default)]
pub struct PlaybackQueue {
    state: Mutex<QueueState>,
    available: Condvar,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `batch` to the tail of the queue and wakes the consumer.
    pub fn enqueue(&self, batch: PlaybackBatch) -> Result<BatchId> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(OrganizerError::QueueClosed);
        }

        let id = BatchId(state.next_id);
        state.next_id += 1;
        state.batches.push_back((id, batch));
        drop(state);

        self.available.notify_one();
        Ok(id)
    }

    /// Convenience wrapper building the batch from a list of clips.
    pub fn enqueue_clips(&self, clips: Vec<SoundClip>) -> Result<BatchId> {
        self.enqueue(PlaybackBatch::new(clips)?)
    }

    /// Blocks until the oldest batch can be taken.
    ///
    /// Returns `Ok(None)` once the queue is closed and, under
    /// [`ShutdownMode::Drain`], every pending batch has been handed out.
    pub fn dequeue(&self) -> Result<Option<(BatchId, PlaybackBatch)>> {
        let mut state = self.lock()?;
        loop {
            if let Some(entry) = state.batches.pop_front() {
                return Ok(Some(entry));
            }
            if state.closed {
                return Ok(None);
            }
            state = self
                .available
                .wait(state)
                .map_err(|_| OrganizerError::Poisoned("playback queue"))?;
        }
    }

    /// Takes the oldest batch if one is waiting, without blocking.
    pub fn try_dequeue(&self) -> Result<Option<(BatchId, PlaybackBatch)>> {
        Ok(self.lock()?.batches.pop_front())
    }

    /// Stops accepting batches and wakes the consumer. Returns the number
    /// of pending batches that were dropped.
    pub fn close(&self, mode: ShutdownMode) -> Result<usize> {
        let mut state = self.lock()?;
        state.closed = true;
        let discarded = match mode {
            ShutdownMode::Drain => 0,
            ShutdownMode::Discard => {
                state.discarding = true;
                let count = state.batches.len();
                state.batches.clear();
                count
            }
        };
        drop(state);

        self.available.notify_all();
        Ok(discarded)
    }

    pub fn is_closed(&self) -> Result<bool> {
        Ok(self.lock()?.closed)
    }

    /// Whether the queue was closed with [`ShutdownMode::Discard`]. The
    /// worker checks this between clips to abandon its current batch.
    pub fn is_discarding(&self) -> Result<bool> {
        Ok(self.lock()?.discarding)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.batches.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>> {
        self.state
            .lock()
            .map_err(|_| OrganizerError::Poisoned("playback queue"))
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    fn batch(names: &[&str]) -> PlaybackBatch {
        PlaybackBatch::new(
            names
                .iter()
                .map(|name| SoundClip::new(format!("/nonexistent/{name}"), *name))
                .collect(),
        )
        .unwrap()
    }

    fn titles(batch: &PlaybackBatch) -> Vec<&str> {
        batch.clips().iter().map(SoundClip::title).collect()
    }

    #[test]
    fn rejects_empty_batches() {
        let queue = PlaybackQueue::new();
        assert!(matches!(
            queue.enqueue_clips(vec![]),
            Err(OrganizerError::EmptyBatch)
        ));
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn hands_out_batches_in_arrival_order() {
        let queue = PlaybackQueue::new();
        let first = queue.enqueue(batch(&["c1", "c2"])).unwrap();
        let second = queue.enqueue(batch(&["c3"])).unwrap();
        assert!(first < second);

        let (id, b1) = queue.dequeue().unwrap().unwrap();
        assert_eq!(id, first);
        assert_eq!(titles(&b1), ["c1", "c2"]);
        let (id, b2) = queue.dequeue().unwrap().unwrap();
        assert_eq!(id, second);
        assert_eq!(titles(&b2), ["c3"]);
        assert!(queue.try_dequeue().unwrap().is_none());
    }

    #[test]
    fn consumer_parks_until_a_batch_arrives() {
        let queue = Arc::new(PlaybackQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue().unwrap())
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());
        queue.enqueue(batch(&["late"])).unwrap();

        let (_, got) = consumer.join().unwrap().unwrap();
        assert_eq!(titles(&got), ["late"]);
    }

    #[test]
    fn drain_close_still_yields_pending_batches() {
        let queue = PlaybackQueue::new();
        queue.enqueue(batch(&["a"])).unwrap();

        assert_eq!(queue.close(ShutdownMode::Drain).unwrap(), 0);
        assert!(matches!(
            queue.enqueue(batch(&["b"])),
            Err(OrganizerError::QueueClosed)
        ));
        assert!(queue.dequeue().unwrap().is_some());
        assert!(queue.dequeue().unwrap().is_none());
    }

    #[test]
    fn discard_close_drops_pending_batches() {
        let queue = PlaybackQueue::new();
        queue.enqueue(batch(&["a"])).unwrap();
        queue.enqueue(batch(&["b"])).unwrap();

        assert_eq!(queue.close(ShutdownMode::Discard).unwrap(), 2);
        assert!(queue.is_discarding().unwrap());
        assert!(queue.dequeue().unwrap().is_none());
    }

    #[test]
    fn close_wakes_a_parked_consumer() {
        let queue = Arc::new(PlaybackQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.dequeue().unwrap())
        };

        thread::sleep(Duration::from_millis(20));
        queue.close(ShutdownMode::Drain).unwrap();
        assert!(consumer.join().unwrap().is_none());
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let queue = Arc::new(PlaybackQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for n in 0..25 {
                        queue.enqueue(batch(&[format!("{p}-{n}").as_str()])).unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut last = None;
        let mut count = 0;
        while let Some((id, _)) = queue.try_dequeue().unwrap() {
            assert!(last < Some(id));
            last = Some(id);
            count += 1;
        }
        assert_eq!(count, 100);
    }
}
