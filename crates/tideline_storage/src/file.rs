//! File-based storage backend for persistent storage.

use crate::backend::{StorageBackend, UpdateFn};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Lock file guarding read-modify-write across processes.
const LOCK_FILE: &str = "LOCK";

/// Extension of namespace blob files.
const BLOB_EXT: &str = "blob";

/// A directory-backed storage backend.
///
/// Each namespace is stored as one file in the directory. Writes go to a
/// temporary file which is synced and renamed over the target, so a reader
/// never observes a torn blob.
///
/// # Concurrency
///
/// Mutations hold an in-process mutex and an exclusive advisory lock on the
/// directory's `LOCK` file. Several `FileBackend` handles (in one process
/// or many) opened on the same directory therefore never lose updates.
///
/// # Example
///
/// ```no_run
/// use tideline_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("client-data")).unwrap();
/// backend.write("sync_queue", b"persistent data").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    lock_file: Mutex<File>,
}

impl FileBackend {
    /// Opens a storage directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, is not a
    /// directory, or the lock file cannot be opened.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        if !dir.exists() {
            fs::create_dir_all(dir)?;
        }
        if !dir.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "not a directory: {}",
                dir.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            lock_file: Mutex::new(lock_file),
        })
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the file holding a namespace's blob.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty namespace.
    pub fn blob_path(&self, namespace: &str) -> StorageResult<PathBuf> {
        if namespace.is_empty() {
            return Err(StorageError::InvalidNamespace(namespace.to_string()));
        }
        Ok(self
            .dir
            .join(format!("{}.{}", encode_namespace(namespace), BLOB_EXT)))
    }

    /// Runs `f` while holding both the in-process and the file lock.
    fn locked<T>(&self, f: impl FnOnce() -> StorageResult<T>) -> StorageResult<T> {
        let file = self.lock_file.lock();
        file.lock_exclusive()?;
        let result = f();
        // Closing the descriptor would release the lock too, but the handle
        // is reused for the next mutation.
        let unlocked = FileExt::unlock(&*file);
        let value = result?;
        unlocked?;
        Ok(value)
    }

    fn read_blob(path: &Path) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_blob(path: &Path, blob: &[u8]) -> StorageResult<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(blob)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, namespace: &str) -> StorageResult<Option<Vec<u8>>> {
        Self::read_blob(&self.blob_path(namespace)?)
    }

    fn write(&self, namespace: &str, blob: &[u8]) -> StorageResult<()> {
        let path = self.blob_path(namespace)?;
        self.locked(|| Self::write_blob(&path, blob))
    }

    fn update(&self, namespace: &str, f: &mut UpdateFn<'_>) -> StorageResult<()> {
        let path = self.blob_path(namespace)?;
        self.locked(|| {
            let current = Self::read_blob(&path)?;
            let next = f(current)?;
            Self::write_blob(&path, &next)
        })
    }

    fn remove(&self, namespace: &str) -> StorageResult<()> {
        let path = self.blob_path(namespace)?;
        self.locked(|| match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        })
    }

    fn namespaces(&self) -> StorageResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(decode_namespace(stem)?);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Maps a namespace onto a portable file stem.
///
/// ASCII alphanumerics, `_` and `-` are kept; every other byte becomes `%XX`.
fn encode_namespace(namespace: &str) -> String {
    let mut out = String::with_capacity(namespace.len());
    for byte in namespace.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

fn decode_namespace(stem: &str) -> StorageResult<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem
                .get(i + 1..i + 3)
                .ok_or_else(|| StorageError::corrupted(format!("bad blob name: {stem}")))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| StorageError::corrupted(format!("bad blob name: {stem}")))?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| StorageError::corrupted(format!("bad blob name: {stem}")))
}
