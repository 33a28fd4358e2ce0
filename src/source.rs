//! Filesystem collaborator consumed by the registry.
//!
//! The registry only needs three primitives: list a directory, stat a path and
//! read a file. Keeping them behind [`ComponentSource`] lets tests count calls
//! and lets callers serve components from somewhere other than the disk.

use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub trait ComponentSource: Send + Sync {
    /// Names of the immediate entries of `dir`. Fails only when `dir` itself
    /// cannot be read.
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>>;

    fn is_dir(&self, path: &Path) -> io::Result<bool>;

    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiskSource;

impl ComponentSource for DiskSource {
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            match entry {
                Ok(entry) => names.push(entry.file_name().to_string_lossy().to_string()),
                Err(err) if err.depth() == 0 => return Err(err.into()),
                // Dangling links and entries that cannot be stat'ed.
                Err(err) => debug!(error = %err, "skipping unreadable directory entry"),
            }
        }
        Ok(names)
    }

    fn is_dir(&self, path: &Path) -> io::Result<bool> {
        fs::metadata(path).map(|m| m.is_dir())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_disk_source_lists_immediate_entries() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        fs::create_dir(tmp.path().join("card")).unwrap();
        fs::create_dir(tmp.path().join("card").join("nested")).unwrap();
        fs::write(tmp.path().join("README.md"), "hi").unwrap();

        let names = DiskSource.list_dir(tmp.path()).unwrap();
        assert_eq!(names, vec!["README.md".to_string(), "card".to_string()]);

        assert!(DiskSource.is_dir(&tmp.path().join("card")).unwrap());
        assert!(!DiskSource.is_dir(&tmp.path().join("README.md")).unwrap());
        assert_eq!(
            DiskSource
                .read_to_string(&tmp.path().join("README.md"))
                .unwrap(),
            "hi"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_source_skips_dangling_link() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        fs::create_dir(tmp.path().join("card")).unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("dangling")).unwrap();

        let names = DiskSource.list_dir(tmp.path()).unwrap();
        assert_eq!(names, vec!["card".to_string()]);
    }

    #[test]
    fn test_disk_source_missing_root() {
        let tmp = tempfile::tempdir().expect("create temp dir");
        assert!(DiskSource.list_dir(&tmp.path().join("missing")).is_err());
        assert!(DiskSource.is_dir(&tmp.path().join("missing")).is_err());
    }
}
