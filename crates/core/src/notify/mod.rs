//! Change notification side-channel for the album tree.
//!
//! Subscribers register against an album id and are called back after a
//! mutation touching that album has completed. Delivery happens on the
//! mutating thread once the tree lock has been released, so a handler may
//! read the tree freely. A handler that mutates the tree from inside its
//! callback will trigger a nested notification on the same thread; keeping
//! that bounded is up to the caller.

use std::{
    collections::HashMap,
    fmt,
    sync::{mpsc, Arc, Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::{AlbumId, OrganizerError, Result};

/// What happened to the album a subscriber is watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlbumEvent {
    /// The album, or one of its ancestors, was detached from the tree.
    AlbumRemoved,
    /// The album's own clip set changed.
    ClipsUpdated,
    /// A direct child album was created or removed.
    SubAlbumsChanged,
}

/// Handle returned by [`ChangeNotifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(AlbumId, AlbumEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: HashMap<AlbumId, Vec<(SubscriptionId, Handler)>>,
}

/// Subscriber registry keyed by album identity.
#[derive(Default)]
pub struct ChangeNotifier {
    registry: Mutex<Registry>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events on `album`.
    pub fn subscribe<F>(&self, album: AlbumId, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(AlbumId, AlbumEvent) + Send + Sync + 'static,
    {
        let mut registry = self.lock()?;
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry
            .subscribers
            .entry(album)
            .or_default()
            .push((id, Arc::new(handler)));
        Ok(id)
    }

    /// Channel flavoured subscription. Events for `album` are forwarded to
    /// the returned receiver until it is dropped or the subscription removed.
    pub fn watch(&self, album: AlbumId) -> Result<(SubscriptionId, mpsc::Receiver<AlbumEvent>)> {
        let (tx, rx) = mpsc::channel();
        let id = self.subscribe(album, move |_, event| {
            let _ = tx.send(event);
        })?;
        Ok((id, rx))
    }

    /// Removes a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        let mut registry = self.lock()?;
        let mut removed = false;
        registry.subscribers.retain(|_, handlers| {
            let before = handlers.len();
            handlers.retain(|(candidate, _)| *candidate != id);
            removed |= handlers.len() != before;
            !handlers.is_empty()
        });
        Ok(removed)
    }

    pub fn subscriber_count(&self, album: AlbumId) -> Result<usize> {
        let registry = self.lock()?;
        Ok(registry.subscribers.get(&album).map_or(0, Vec::len))
    }

    /// Delivers each notice to the handlers registered for its album.
    ///
    /// Handlers are cloned out of the registry before any of them runs, so
    /// a handler may subscribe or unsubscribe without deadlocking.
    pub(crate) fn publish(&self, notices: &[(AlbumId, AlbumEvent)]) -> Result<()> {
        let deliveries: Vec<(AlbumId, AlbumEvent, Handler)> = {
            let registry = self.lock()?;
            let subscribers = &registry.subscribers;
            notices
                .iter()
                .flat_map(|&(album, event)| {
                    subscribers
                        .get(&album)
                        .into_iter()
                        .flatten()
                        .map(move |(_, handler)| (album, event, Arc::clone(handler)))
                })
                .collect()
        };

        for (album, event, handler) in deliveries {
            handler(album, event);
        }
        Ok(())
    }

    /// Drops every subscription held against the given albums.
    pub(crate) fn forget(&self, albums: &[AlbumId]) -> Result<()> {
        let mut registry = self.lock()?;
        for album in albums {
            registry.subscribers.remove(album);
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Registry>> {
        self.registry
            .lock()
            .map_err(|_| OrganizerError::Poisoned("change notifier"))
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn delivers_only_to_matching_album() {
        let notifier = ChangeNotifier::new();
        let (_, rock) = notifier.watch(AlbumId::from_raw(1)).unwrap();
        let (_, jazz) = notifier.watch(AlbumId::from_raw(2)).unwrap();

        notifier
            .publish(&[(AlbumId::from_raw(1), AlbumEvent::ClipsUpdated)])
            .unwrap();

        assert_eq!(rock.try_recv().unwrap(), AlbumEvent::ClipsUpdated);
        assert!(jazz.try_recv().is_err());
    }

    #[test]
    fn unsubscribed_handlers_are_not_called() {
        let notifier = ChangeNotifier::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let album = AlbumId::from_raw(7);

        let id = notifier
            .subscribe(album, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        notifier.publish(&[(album, AlbumEvent::AlbumRemoved)]).unwrap();

        assert!(notifier.unsubscribe(id).unwrap());
        assert!(!notifier.unsubscribe(id).unwrap());
        notifier.publish(&[(album, AlbumEvent::AlbumRemoved)]).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(album).unwrap(), 0);
    }

    #[test]
    fn handler_can_unsubscribe_itself() {
        let notifier = Arc::new(ChangeNotifier::new());
        let album = AlbumId::from_raw(3);
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::default();

        let inner = Arc::clone(&notifier);
        let inner_slot = Arc::clone(&slot);
        let id = notifier
            .subscribe(album, move |_, _| {
                if let Some(id) = *inner_slot.lock().unwrap() {
                    inner.unsubscribe(id).unwrap();
                }
            })
            .unwrap();
        *slot.lock().unwrap() = Some(id);

        notifier.publish(&[(album, AlbumEvent::ClipsUpdated)]).unwrap();
        assert_eq!(notifier.subscriber_count(album).unwrap(), 0);
    }

    #[test]
    fn forget_drops_all_album_subscriptions() {
        let notifier = ChangeNotifier::new();
        let album = AlbumId::from_raw(9);
        let (_, rx) = notifier.watch(album).unwrap();
        notifier.subscribe(album, |_, _| {}).unwrap();

        notifier.forget(&[album]).unwrap();
        notifier.publish(&[(album, AlbumEvent::ClipsUpdated)]).unwrap();

        assert_eq!(notifier.subscriber_count(album).unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }
}
