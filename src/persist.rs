//! File helpers shared by the credential and role stores.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::StoreError;

/// Creates `dir` (and parents) and restricts it to the owning user.
pub fn ensure_private_dir(dir: &Path) -> Result<(), StoreError> {
    let create_err = |source| StoreError::CreateDir {
        path: dir.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(create_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700)).map_err(create_err)?;
    }

    Ok(())
}

/// Replaces `path` with `contents` in one step.
///
/// The data is written and synced to a uniquely named sibling temp file which
/// is then renamed over `path`, so readers see the old file or the new one,
/// never a partial write. Concurrent writers to the same path each get their
/// own temp file and the last rename wins.
pub fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> Result<(), StoreError> {
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    // Removed on drop if anything below fails
    let mut tmp = NamedTempFile::new_in(parent).map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(mode))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    tmp.write_all(contents).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn replaces_existing_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record");

        write_atomic(&path, b"first, longer content", 0o600).unwrap();
        write_atomic(&path, b"second", 0o600).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn private_dir_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("a").join("b");

        ensure_private_dir(&target).unwrap();

        let mode = fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[cfg(unix)]
    #[test]
    fn replacement_gets_requested_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("record");

        write_atomic(&path, b"x", 0o600).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn concurrent_writers_to_one_path_all_succeed() {
        use std::sync::{Arc, Barrier};

        let dir = TempDir::new().unwrap();
        let path = Arc::new(dir.path().join("record"));
        let long = "a-very-long-record-from-the-first-writer";
        let short = "short";

        for _ in 0..100 {
            let barrier = Arc::new(Barrier::new(2));
            let writers: Vec<_> = [long, short]
                .into_iter()
                .map(|contents| {
                    let barrier = Arc::clone(&barrier);
                    let path = Arc::clone(&path);
                    std::thread::spawn(move || {
                        barrier.wait();
                        write_atomic(&path, contents.as_bytes(), 0o600)
                    })
                })
                .collect();

            for writer in writers {
                writer.join().unwrap().unwrap();
            }
            let stored = fs::read_to_string(path.as_path()).unwrap();
            assert!(stored == long || stored == short, "mixed contents: {stored:?}");
        }

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn write_into_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("record");

        assert!(matches!(
            write_atomic(&path, b"x", 0o600),
            Err(StoreError::Write { .. })
        ));
    }
}
