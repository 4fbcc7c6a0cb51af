use std::path::{Path, PathBuf};

use crate::{hosts::PlaylistMetadata, sink::sanitize};

const SCRATCH_DIR: &str = ".scratch";
const SCRATCH_ID_BYTES: usize = 16;
const UNNAMED_DIR: &str = "playlist";

/// `<root>/<sanitized title>`, falling back to the playlist id and then to a
/// fixed name when the title does not make a usable single path component.
pub fn playlist_dir(root: &Path, playlist: &PlaylistMetadata) -> PathBuf {
    let name = dir_component(&playlist.title)
        .or_else(|| dir_component(playlist.id.as_str()))
        .unwrap_or_else(|| UNNAMED_DIR.to_owned());

    root.join(name)
}

fn dir_component(name: &str) -> Option<String> {
    let name = sanitize(name);

    match name.trim() {
        "" | "." | ".." => None,
        _ => Some(name),
    }
}

/// A fresh, not yet created directory under `<root>/.scratch/`.
pub fn new_scratch_dir(root: &Path) -> PathBuf {
    let id: [u8; SCRATCH_ID_BYTES] = rand::random();
    root.join(SCRATCH_DIR).join(hex::encode(id))
}

/// `<scratch>.zip`, next to the scratch directory.
pub fn scratch_archive_path(scratch_dir: &Path) -> PathBuf {
    scratch_dir.with_extension("zip")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn playlist(id: &str, title: &str) -> PlaylistMetadata {
        PlaylistMetadata {
            id: id.into(),
            title: title.into(),
        }
    }

    #[test]
    fn test_playlist_dir() {
        let root = Path::new("downloads");

        assert_eq!(
            playlist_dir(root, &playlist("PL1", "My: Mix")),
            PathBuf::from("downloads/My Mix")
        );
        assert_eq!(
            playlist_dir(root, &playlist("PL1", "...")),
            PathBuf::from("downloads/...")
        );
    }

    #[test]
    fn test_playlist_dir_never_leaves_root() {
        let root = Path::new("downloads");

        assert_eq!(playlist_dir(root, &playlist("PL1", "..")), root.join("PL1"));
        assert_eq!(playlist_dir(root, &playlist("PL1", ".")), root.join("PL1"));
        assert_eq!(playlist_dir(root, &playlist("PL1", "")), root.join("PL1"));
        assert_eq!(playlist_dir(root, &playlist("PL1", "/..\\")), root.join("PL1"));
        assert_eq!(playlist_dir(root, &playlist("..", "..")), root.join("playlist"));
    }

    #[test]
    fn test_scratch_dirs_are_unique() {
        let root = Path::new("downloads");
        let first = new_scratch_dir(root);
        let second = new_scratch_dir(root);

        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(Path::new("downloads/.scratch")));
        assert_eq!(
            first.file_name().unwrap().len(),
            SCRATCH_ID_BYTES * 2
        );
    }

    #[test]
    fn test_scratch_archive_path() {
        let dir = Path::new("downloads/.scratch/abc123");
        assert_eq!(
            scratch_archive_path(dir),
            PathBuf::from("downloads/.scratch/abc123.zip")
        );
    }
}
