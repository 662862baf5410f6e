//! File fingerprinting and whole-file replacement for the backing files.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Identity of one on-disk revision of a backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVersion {
    pub modified: SystemTime,
    pub len: u64,
}

/// Returns `Ok(None)` when the file does not exist.
pub fn probe(path: &Path) -> io::Result<Option<FileVersion>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(FileVersion {
            modified: meta.modified()?,
            len: meta.len(),
        })),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replaces `path` with `contents` via a sibling temp file and a rename, so
/// a concurrent reader sees either the old or the new file, never a mix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<FileVersion> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_name = format!(
        ".{}.{}.{}.tmp",
        file_name,
        process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let tmp_path = match parent {
        Some(dir) => dir.join(tmp_name),
        None => Path::new(&tmp_name).to_path_buf(),
    };

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    probe(path)?.ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "file vanished after write"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(probe(&dir.path().join("nope.txt")).unwrap().is_none());
    }

    #[test]
    fn test_write_atomic_creates_parent_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let version = write_atomic(&path, b"{}").unwrap();
        assert_eq!(version.len, 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
