//! Atomic whole-document persistence.
//!
//! Both on-disk documents (download history, match cache) are rewritten
//! wholesale on every update. Writing into a temp file in the same directory
//! and renaming over the target means a crash mid-write leaves the previous
//! document intact.

use std::io::Write;
use std::path::Path;

use crate::error::PersistenceError;

pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), PersistenceError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| PersistenceError::io(parent, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| PersistenceError::io(path, e))?;
    tmp.write_all(data)
        .map_err(|e| PersistenceError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| PersistenceError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| PersistenceError::io(path, e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn writes_contents_and_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"first");

        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn creates_missing_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/state/doc.json");

        atomic_write(&path, b"data").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }
}
