//! The album hierarchy.
//!
//! Albums live in an arena keyed by [`AlbumId`]. Parent and child links are
//! ids into that arena, the root is fixed when the tree is built and an
//! album's parent never changes afterwards, so the structure cannot form a
//! cycle or acquire a second root.
//!
//! Every mutation runs under one write lock covering the whole operation,
//! including the walk up the ancestor chain in [`AlbumTree::add_clips`].
//! Readers therefore never see a clip in an album without also seeing it in
//! every ancestor. Change notifications are published once the lock has
//! been released.

use std::{
    collections::{HashMap, HashSet},
    fmt, io,
    sync::{mpsc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::{Deserialize, Serialize};

use crate::{AlbumEvent, ChangeNotifier, OrganizerError, Result, SoundClip, SubscriptionId};

pub const DEFAULT_ROOT_TITLE: &str = "All Sound Clips";

/// Stable identifier of an album inside an [`AlbumTree`]. Ids are never
/// reused, so an id held after its album was removed stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AlbumId(u64);

impl AlbumId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub(crate) struct AlbumNode {
    pub(crate) name: String,
    pub(crate) parent: Option<AlbumId>,
    pub(crate) children: HashSet<AlbumId>,
    pub(crate) clips: HashSet<SoundClip>,
}

impl AlbumNode {
    fn new(name: String, parent: Option<AlbumId>) -> Self {
        Self {
            name,
            parent,
            children: HashSet::new(),
            clips: HashSet::new(),
        }
    }
}

#[derive(Debug)]
pub(crate) struct Arena {
    pub(crate) root: AlbumId,
    next_id: u64,
    pub(crate) nodes: HashMap<AlbumId, AlbumNode>,
}

impl Arena {
    pub(crate) fn new(root_title: String) -> Self {
        let root = AlbumId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, AlbumNode::new(root_title, None));
        Self {
            root,
            next_id: 1,
            nodes,
        }
    }

    pub(crate) fn node(&self, id: AlbumId) -> Result<&AlbumNode> {
        self.nodes.get(&id).ok_or(OrganizerError::UnknownAlbum(id))
    }

    fn node_mut(&mut self, id: AlbumId) -> Result<&mut AlbumNode> {
        self.nodes.get_mut(&id).ok_or(OrganizerError::UnknownAlbum(id))
    }

    pub(crate) fn insert_child(&mut self, name: String, parent: AlbumId) -> Result<AlbumId> {
        if !self.nodes.contains_key(&parent) {
            return Err(OrganizerError::InvalidParent(parent));
        }

        let id = AlbumId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, AlbumNode::new(name, Some(parent)));
        self.node_mut(parent)?.children.insert(id);
        Ok(id)
    }

    /// `id` followed by each ancestor up to and including the root.
    pub(crate) fn lineage(&self, id: AlbumId) -> Result<Vec<AlbumId>> {
        let mut lineage = vec![id];
        let mut current = self.node(id)?.parent;
        while let Some(parent) = current {
            lineage.push(parent);
            current = self.node(parent)?.parent;
        }
        Ok(lineage)
    }

    /// `id` and every album below it, parents before children.
    fn subtree(&self, id: AlbumId) -> Result<Vec<AlbumId>> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            stack.extend(self.node(next)?.children.iter().copied());
            out.push(next);
        }
        Ok(out)
    }
}

/// Thread-safe album hierarchy with an attached change notifier.
#[derive(Debug)]
pub struct AlbumTree {
    root: AlbumId,
    arena: RwLock<Arena>,
    notifier: ChangeNotifier,
}

impl Default for AlbumTree {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_TITLE)
    }
}

impl AlbumTree {
    /// Creates a tree holding only an empty root album.
    pub fn new(root_title: impl Into<String>) -> Self {
        Self::from_arena(Arena::new(root_title.into()))
    }

    pub(crate) fn from_arena(arena: Arena) -> Self {
        Self {
            root: arena.root,
            arena: RwLock::new(arena),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn root(&self) -> AlbumId {
        self.root
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Creates an empty album named `name` under `parent`.
    pub fn create_sub_album(&self, name: impl Into<String>, parent: AlbumId) -> Result<AlbumId> {
        let id = self.write()?.insert_child(name.into(), parent)?;
        self.notifier
            .publish(&[(parent, AlbumEvent::SubAlbumsChanged)])?;
        Ok(id)
    }

    /// Detaches `album` from its parent and discards its whole subtree.
    pub fn remove_sub_album(&self, album: AlbumId) -> Result<()> {
        if album == self.root {
            return Err(OrganizerError::RootRemovalForbidden);
        }

        let (parent, removed) = {
            let mut arena = self.write()?;
            let parent = arena
                .node(album)?
                .parent
                .ok_or(OrganizerError::RootRemovalForbidden)?;
            let removed = arena.subtree(album)?;

            arena.node_mut(parent)?.children.remove(&album);
            for id in &removed {
                arena.nodes.remove(id);
            }
            (parent, removed)
        };

        let mut notices: Vec<_> = removed
            .iter()
            .map(|&id| (id, AlbumEvent::AlbumRemoved))
            .collect();
        notices.push((parent, AlbumEvent::SubAlbumsChanged));
        self.notifier.publish(&notices)?;
        self.notifier.forget(&removed)
    }

    /// Adds `clip` to `album` and every ancestor of it.
    pub fn add_clip(&self, album: AlbumId, clip: SoundClip) -> Result<()> {
        self.add_clips(album, [clip])
    }

    /// Adds each clip to `album` and every ancestor of it in one step.
    pub fn add_clips<I>(&self, album: AlbumId, clips: I) -> Result<()>
    where
        I: IntoIterator<Item = SoundClip>,
    {
        let clips: Vec<SoundClip> = clips.into_iter().collect();

        let changed = {
            let mut arena = self.write()?;
            let lineage = arena.lineage(album)?;
            let mut changed = Vec::new();
            for id in lineage {
                let node = arena.node_mut(id)?;
                let mut touched = false;
                for clip in &clips {
                    touched |= node.clips.insert(clip.clone());
                }
                if touched {
                    changed.push((id, AlbumEvent::ClipsUpdated));
                }
            }
            changed
        };

        self.notifier.publish(&changed)
    }

    /// Removes `clip` from `album`. Returns whether it was a member.
    ///
    /// Outside the root only the album's own set changes. Removing from the
    /// root deletes the clip from the library: the backing file is deleted
    /// and the clip is purged from every album.
    pub fn remove_clip(&self, album: AlbumId, clip: &SoundClip) -> Result<bool> {
        Ok(self.remove_clips(album, std::slice::from_ref(clip))? > 0)
    }

    /// Removes each clip from `album`, returning how many were members.
    ///
    /// Each clip is handled atomically. If deleting a backing file fails the
    /// call stops there with the error and that clip stays in the tree.
    pub fn remove_clips(&self, album: AlbumId, clips: &[SoundClip]) -> Result<usize> {
        let mut removed = 0;
        let mut changed = HashSet::new();

        let outcome = (|| -> Result<()> {
            let mut arena = self.write()?;
            arena.node(album)?;

            for clip in clips {
                if !arena.node(album)?.clips.contains(clip) {
                    continue;
                }

                if album == self.root {
                    delete_backing_file(clip)?;
                    for (&id, node) in arena.nodes.iter_mut() {
                        if node.clips.remove(clip) {
                            changed.insert(id);
                        }
                    }
                } else {
                    arena.node_mut(album)?.clips.remove(clip);
                    changed.insert(album);
                }
                removed += 1;
            }
            Ok(())
        })();

        let notices: Vec<_> = changed
            .into_iter()
            .map(|id| (id, AlbumEvent::ClipsUpdated))
            .collect();
        self.notifier.publish(&notices)?;

        outcome.map(|_| removed)
    }

    /// Whether `clip` is in `album`'s own set or in any descendant's.
    pub fn contains_clip(&self, clip: &SoundClip, album: AlbumId) -> Result<bool> {
        let arena = self.read()?;
        let mut stack = vec![album];
        while let Some(id) = stack.pop() {
            let node = arena.node(id)?;
            if node.clips.contains(clip) {
                return Ok(true);
            }
            stack.extend(node.children.iter().copied());
        }
        Ok(false)
    }

    pub fn list_sub_albums(&self, album: AlbumId) -> Result<HashSet<AlbumId>> {
        Ok(self.read()?.node(album)?.children.clone())
    }

    pub fn list_clips(&self, album: AlbumId) -> Result<HashSet<SoundClip>> {
        Ok(self.read()?.node(album)?.clips.clone())
    }

    pub fn album_name(&self, album: AlbumId) -> Result<String> {
        Ok(self.read()?.node(album)?.name.clone())
    }

    /// Parent of `album`, `None` for the root.
    pub fn parent_of(&self, album: AlbumId) -> Result<Option<AlbumId>> {
        Ok(self.read()?.node(album)?.parent)
    }

    pub fn is_root(&self, album: AlbumId) -> bool {
        album == self.root
    }

    pub fn has_sub_albums(&self, album: AlbumId) -> Result<bool> {
        Ok(!self.read()?.node(album)?.children.is_empty())
    }

    /// Number of clips plus number of direct sub-albums.
    pub fn album_size(&self, album: AlbumId) -> Result<usize> {
        let arena = self.read()?;
        let node = arena.node(album)?;
        Ok(node.clips.len() + node.children.len())
    }

    pub fn contains_album(&self, album: AlbumId) -> Result<bool> {
        Ok(self.read()?.nodes.contains_key(&album))
    }

    pub fn album_count(&self) -> Result<usize> {
        Ok(self.read()?.nodes.len())
    }

    /// Registers `handler` for change events on `album`.
    pub fn subscribe<F>(&self, album: AlbumId, handler: F) -> Result<SubscriptionId>
    where
        F: Fn(AlbumId, AlbumEvent) + Send + Sync + 'static,
    {
        // Held until registered so a concurrent removal forgets this entry.
        let arena = self.read()?;
        arena.node(album)?;
        self.notifier.subscribe(album, handler)
    }

    /// Like [`AlbumTree::subscribe`] but delivers events over a channel.
    pub fn watch(&self, album: AlbumId) -> Result<(SubscriptionId, mpsc::Receiver<AlbumEvent>)> {
        let arena = self.read()?;
        arena.node(album)?;
        self.notifier.watch(album)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<bool> {
        self.notifier.unsubscribe(id)
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, Arena>> {
        self.arena
            .read()
            .map_err(|_| OrganizerError::Poisoned("album tree"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Arena>> {
        self.arena
            .write()
            .map_err(|_| OrganizerError::Poisoned("album tree"))
    }
}

fn delete_backing_file(clip: &SoundClip) -> Result<()> {
    match std::fs::remove_file(clip.path()) {
        Ok(()) => {
            tracing::info!(path = %clip.path().display(), "deleted clip from library");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %clip.path().display(), "backing file already gone");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}
