use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::debug;

/// Make sure the directory exists, keeping its content
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Make sure the directory exists and is empty
pub fn ensure_empty_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;

    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Create a hidden named temporary file in `dir`, next to where `target` will be persisted.
///
/// The file destructor will be called at the handle drop.
/// **As such, one must not simply get the file path and drop the handle.**
pub fn named_tempfile_beside(dir: &Path, target: &str, extension: &str) -> io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(&format!(".{target}."))
        .suffix(&format!(".{extension}"))
        .tempfile_in(dir)
}

/// Move a file, falling back to copying it when a simple rename is not possible
/// (e.g. across filesystems).
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    // First try to do a simple move
    if fs::rename(from, to).is_err() {
        debug!("Moving file failed, falling back to copying");
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}

/// Extension of the path, or the given default
pub fn extension_or(path: &Path, default: &str) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Absolute form of the path, for display purposes
pub fn display_path(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn empty_dir_is_created_or_cleared() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("a/b");

        ensure_empty_dir(&dir).unwrap();
        assert!(dir.is_dir());

        fs::write(dir.join("leftover.mp4"), b"x").unwrap();
        fs::create_dir(dir.join("nested")).unwrap();
        fs::write(dir.join("nested/file"), b"x").unwrap();

        ensure_empty_dir(&dir).unwrap();
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn ensure_dir_keeps_content() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("keep.mp4"), b"x").unwrap();

        ensure_dir(root.path()).unwrap();
        assert!(root.path().join("keep.mp4").exists());
    }

    #[test]
    fn tempfile_is_hidden_next_to_target() {
        let root = TempDir::new().unwrap();
        let tmp = named_tempfile_beside(root.path(), "dQw4w9WgXcQ.360p", "mp4").unwrap();

        let name = tmp.path().file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with(".dQw4w9WgXcQ.360p."));
        assert!(name.ends_with(".mp4"));
        assert_eq!(tmp.path().parent().unwrap(), root.path());
    }

    #[test]
    fn move_file_creates_parent() {
        let root = TempDir::new().unwrap();
        let from = root.path().join("joined.mp4");
        let to = root.path().join("out/dir/final.mp4");
        fs::write(&from, b"video").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"video");
    }

    #[test]
    fn extension_falls_back() {
        assert_eq!(extension_or(Path::new("out.mkv"), "mp4"), "mkv");
        assert_eq!(extension_or(Path::new("out"), "mp4"), "mp4");
    }
}
