use std::fmt::Write;

use sound_organizer_core::{AlbumSnapshot, LibrarySnapshot};

/// Renders the album hierarchy as an indented plain-text outline.
pub fn render_outline(snapshot: &LibrarySnapshot) -> String {
    let mut out = String::new();
    render_album(&mut out, &snapshot.root, 0);
    out
}

fn render_album(out: &mut String, album: &AlbumSnapshot, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(out, "{indent}[{}] ({} clips)", album.title, album.clips.len());
    for sub_album in &album.sub_albums {
        render_album(out, sub_album, depth + 1);
    }
    for clip in &album.clips {
        let _ = writeln!(out, "{indent}  - {clip}");
    }
}
