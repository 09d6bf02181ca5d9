use std::{
    fmt,
    hash::{Hash, Hasher},
    path::{Component, Path, PathBuf},
};

use serde::{Deserialize, Serialize};

/// A playable sound clip backed by a file on disk.
///
/// Identity is the resolved file path: two clips with different titles
/// pointing at the same file compare equal. Clips are cheap to clone and
/// are shared by value between any number of albums.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundClip {
    path: PathBuf,
    title: String,
}

impl SoundClip {
    /// Creates a clip for `path` with an explicit display title.
    pub fn new(path: impl AsRef<Path>, title: impl Into<String>) -> Self {
        Self {
            path: resolve(path.as_ref()),
            title: title.into(),
        }
    }

    /// Creates a clip titled after the file stem of `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::new(path, title)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

// Identity must not depend on whether the file exists yet. The path is made
// absolute and `.`/`..` are folded lexically. Only the parent directory is
// canonicalised, so symlinked folders resolve but the final component stays
// as named.
fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let normal = normalize(&absolute);
    let resolved = match (normal.parent(), normal.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize().ok().map(|dir| dir.join(name)),
        _ => None,
    };
    resolved.unwrap_or(normal)
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

impl PartialEq for SoundClip {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for SoundClip {}

impl Hash for SoundClip {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for SoundClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn equality_ignores_title() {
        let a = SoundClip::new("/music/missing/a.wav", "First");
        let b = SoundClip::new("/music/missing/a.wav", "Second");

        assert_eq!(a, b);
        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn resolves_existing_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let file = dir.path().join("clip.wav");
        std::fs::write(&file, b"RIFF").unwrap();

        let direct = SoundClip::from_path(&file);
        let indirect = SoundClip::from_path(dir.path().join("sub").join("..").join("clip.wav"));

        assert_eq!(direct, indirect);
        assert_eq!(direct.title(), "clip");
    }

    #[test]
    fn identity_does_not_depend_on_the_file_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let indirect = dir.path().join("sub").join("..").join("late.wav");

        let before = SoundClip::from_path(&indirect);
        std::fs::write(dir.path().join("late.wav"), b"RIFF").unwrap();
        let after = SoundClip::from_path(&indirect);
        let direct = SoundClip::from_path(dir.path().join("late.wav"));

        assert_eq!(before, after);
        assert_eq!(before, direct);
        assert!(before.path().exists());
    }

    #[test]
    fn relative_paths_become_absolute() {
        let clip = SoundClip::new("./missing/../x.wav", "x");
        assert!(clip.path().is_absolute());
        assert_eq!(clip.path().file_name().unwrap(), "x.wav");
    }

    #[test]
    fn displays_title() {
        let clip = SoundClip::new("/nowhere/x.mp3", "Song X");
        assert_eq!(clip.to_string(), "Song X");
    }
}
