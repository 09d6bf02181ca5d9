//! Discovery of sound clips on disk.
//!
//! Walks a directory recursively with `walkdir` and turns every file with
//! one of the configured extensions into a [`SoundClip`]. Unreadable entries
//! are logged and skipped. A path that is not a directory yields no clips.

use std::{collections::HashSet, path::Path};

use sound_organizer_core::{LibraryConfig, SoundClip};
use walkdir::WalkDir;

pub fn load_sound_clips(root: &Path, library: &LibraryConfig) -> HashSet<SoundClip> {
    if !root.is_dir() {
        tracing::warn!(path = %root.display(), "not a directory, nothing to load");
        return HashSet::new();
    }

    WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && library.accepts(entry.path()))
        .map(|entry| SoundClip::from_path(entry.path()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_clips_in_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("rock").join("live");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("intro.wav"), b"").unwrap();
        std::fs::write(nested.join("encore.MP3"), b"").unwrap();
        std::fs::write(nested.join("setlist.txt"), b"").unwrap();

        let clips = load_sound_clips(dir.path(), &LibraryConfig::default());

        let mut titles: Vec<_> = clips.iter().map(SoundClip::title).collect();
        titles.sort();
        assert_eq!(titles, ["encore", "intro"]);
    }

    #[test]
    fn missing_directory_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let clips = load_sound_clips(&dir.path().join("absent"), &LibraryConfig::default());
        assert!(clips.is_empty());
    }

    #[test]
    fn honours_configured_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.wav"), b"").unwrap();
        std::fs::write(dir.path().join("b.snd"), b"").unwrap();
        let library = LibraryConfig {
            extensions: vec!["snd".into()],
            ..LibraryConfig::default()
        };

        let clips = load_sound_clips(dir.path(), &library);

        assert_eq!(clips.len(), 1);
        assert!(clips.iter().all(|clip| clip.title() == "b"));
    }
}
