//! Serializable view of an album tree.
//!
//! Persistence and export formats are owned by the callers. This module
//! exposes just the structure they need (titles, clip sets and the nesting of
//! sub-albums) plus a JSON encoding built on `serde_json`.

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    album::{AlbumTree, Arena},
    AlbumId, OrganizerError, Result, SoundClip,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumSnapshot {
    pub title: String,
    #[serde(default)]
    pub clips: Vec<SoundClip>,
    #[serde(default)]
    pub sub_albums: Vec<AlbumSnapshot>,
}

impl AlbumSnapshot {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            clips: Vec::new(),
            sub_albums: Vec::new(),
        }
    }

    /// Total number of albums in this snapshot, itself included.
    pub fn album_count(&self) -> usize {
        1 + self
            .sub_albums
            .iter()
            .map(AlbumSnapshot::album_count)
            .sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub version: u32,
    pub root: AlbumSnapshot,
}

impl LibrarySnapshot {
    pub const VERSION: u32 = 1;

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.version != Self::VERSION {
            return Err(OrganizerError::InvalidSnapshot(format!(
                "unsupported version {}",
                snapshot.version
            )));
        }
        Ok(snapshot)
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

impl AlbumTree {
    /// Captures the whole tree under a single read lock.
    ///
    /// Clips and sub-albums are sorted (by path and title) so the output is
    /// stable across runs.
    pub fn snapshot(&self) -> Result<LibrarySnapshot> {
        let arena = self.read()?;
        Ok(LibrarySnapshot {
            version: LibrarySnapshot::VERSION,
            root: capture(&arena, arena.root)?,
        })
    }

    /// Builds a fresh tree from a snapshot.
    ///
    /// Clips are propagated up to every ancestor while loading, so a
    /// snapshot missing some ancestor entries still yields a tree where each
    /// album's clips are visible all the way up to the root.
    pub fn from_snapshot(snapshot: &LibrarySnapshot) -> Result<Self> {
        let mut arena = Arena::new(snapshot.root.title.clone());
        let root = arena.root;
        restore(&mut arena, root, &snapshot.root)?;
        Ok(Self::from_arena(arena))
    }
}

fn capture(arena: &Arena, id: AlbumId) -> Result<AlbumSnapshot> {
    let node = arena.node(id)?;

    let mut clips: Vec<SoundClip> = node.clips.iter().cloned().collect();
    clips.sort_by(|a, b| a.path().cmp(b.path()));

    let mut sub_albums = node
        .children
        .iter()
        .map(|&child| capture(arena, child))
        .collect::<Result<Vec<_>>>()?;
    sub_albums.sort_by(|a, b| a.title.cmp(&b.title));

    Ok(AlbumSnapshot {
        title: node.name.clone(),
        clips,
        sub_albums,
    })
}

fn restore(arena: &mut Arena, id: AlbumId, snapshot: &AlbumSnapshot) -> Result<()> {
    let clips: HashSet<SoundClip> = snapshot.clips.iter().cloned().collect();
    for ancestor in arena.lineage(id)? {
        if let Some(node) = arena.nodes.get_mut(&ancestor) {
            node.clips.extend(clips.iter().cloned());
        }
    }

    for child in &snapshot.sub_albums {
        let child_id = arena.insert_child(child.title.clone(), id)?;
        restore(arena, child_id, child)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(name: &str) -> SoundClip {
        SoundClip::new(format!("/nonexistent/{name}"), name)
    }

    fn sample_tree() -> AlbumTree {
        let tree = AlbumTree::new("All");
        let rock = tree.create_sub_album("Rock", tree.root()).unwrap();
        let punk = tree.create_sub_album("Punk", rock).unwrap();
        tree.create_sub_album("Jazz", tree.root()).unwrap();
        tree.add_clip(punk, clip("p.wav")).unwrap();
        tree.add_clip(tree.root(), clip("r.wav")).unwrap();
        tree
    }

    #[test]
    fn snapshot_survives_a_json_trip() {
        let tree = sample_tree();
        let snapshot = tree.snapshot().unwrap();

        let json = snapshot.to_json().unwrap();
        let restored =
            AlbumTree::from_snapshot(&LibrarySnapshot::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored.snapshot().unwrap(), snapshot);
        assert_eq!(restored.album_count().unwrap(), 4);
    }

    #[test]
    fn snapshot_is_sorted() {
        let snapshot = sample_tree().snapshot().unwrap();
        let titles: Vec<_> = snapshot
            .root
            .sub_albums
            .iter()
            .map(|album| album.title.as_str())
            .collect();

        assert_eq!(titles, ["Jazz", "Rock"]);
        assert_eq!(snapshot.root.clips.len(), 2);
        assert_eq!(snapshot.root.album_count(), 4);
    }

    #[test]
    fn restoring_propagates_clips_to_ancestors() {
        let json = r#"{
            "version": 1,
            "root": {
                "title": "All",
                "sub_albums": [
                    { "title": "Rock", "clips": [{ "path": "/nonexistent/x.wav", "title": "x" }] }
                ]
            }
        }"#;

        let tree = AlbumTree::from_snapshot(&LibrarySnapshot::from_json(json).unwrap()).unwrap();

        assert!(tree.list_clips(tree.root()).unwrap().contains(&clip("x.wav")));
        assert_eq!(tree.album_name(tree.root()).unwrap(), "All");
    }

    #[test]
    fn rejects_unknown_versions() {
        let json = r#"{ "version": 7, "root": { "title": "All" } }"#;
        assert!(matches!(
            LibrarySnapshot::from_json(json),
            Err(OrganizerError::InvalidSnapshot(_))
        ));
    }

    #[test]
    fn reads_and_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.json");
        let snapshot = sample_tree().snapshot().unwrap();

        snapshot.write_to(&path).unwrap();
        assert_eq!(LibrarySnapshot::read_from(&path).unwrap(), snapshot);
    }
}
