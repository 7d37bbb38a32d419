//! Filesystem cache: one JSON file per key under a root directory.
//!
//! Each file holds `{"expires_at": <unix milliseconds>, "value": "<markup>"}`.
//! Keys are hex digests, so they are always safe file names.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::{CacheError, CacheStore};

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    expires_at: u64,
    value: String,
}

/// A [`CacheStore`] that persists entries as files, so cached pages survive a
/// process restart.
#[derive(Debug, Clone)]
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Opens (and creates, if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Shard on the first two characters to keep directories small.
        let shard = key.get(..2).unwrap_or("__");
        self.root.join(shard).join(format!("{key}.json"))
    }
}

fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Expiry stamp for an entry written now. Sub-millisecond TTLs round up, and a
/// TTL too large to represent saturates to "never".
fn expiry_millis(ttl: Duration) -> u64 {
    let now = SystemTime::now();
    let ttl = if ttl.subsec_nanos() % 1_000_000 == 0 {
        ttl
    } else {
        ttl.saturating_add(Duration::from_millis(1))
    };
    now.checked_add(ttl).map_or(u64::MAX, unix_millis)
}

fn remove_quietly(path: &Path, key: &str) {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            warn!(key, error = %e, "failed to remove cache file");
        }
        _ => {}
    }
}

impl CacheStore for FileCache {
    fn fetch(&self, key: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable cache file");
                remove_quietly(&path, key);
                return Ok(None);
            }
        };

        if envelope.expires_at <= unix_millis(SystemTime::now()) {
            debug!(key, "cache file expired");
            remove_quietly(&path, key);
            return Ok(None);
        }

        Ok(Some(envelope.value))
    }

    fn save(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let parent = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent)?;

        let envelope = Envelope {
            expires_at: expiry_millis(ttl),
            value: value.to_owned(),
        };
        let raw = serde_json::to_string(&envelope).map_err(|source| CacheError::Serialization {
            key: key.to_owned(),
            source,
        })?;

        // Each writer stages into its own temp file, then renames it into place.
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(raw.as_bytes())?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), CacheError> {
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;

    #[test]
    fn round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        let key = CacheKey::page("page.twig", "/about");

        assert_eq!(cache.fetch(key.as_str()).unwrap(), None);
        cache.save(key.as_str(), "<h1>About</h1>", Duration::from_secs(300)).unwrap();
        assert_eq!(cache.fetch(key.as_str()).unwrap().as_deref(), Some("<h1>About</h1>"));

        // A second handle on the same directory sees the entry.
        let reopened = FileCache::new(dir.path()).unwrap();
        assert!(reopened.fetch(key.as_str()).unwrap().is_some());
    }

    #[test]
    fn expired_file_is_absent_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        let key = CacheKey::request("/old");

        cache.save(key.as_str(), "old", Duration::ZERO).unwrap();
        assert_eq!(cache.fetch(key.as_str()).unwrap(), None);
        assert!(!cache.path_for(key.as_str()).exists());
    }

    #[test]
    fn corrupt_file_reads_as_absent_and_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        let key = CacheKey::request("/broken");
        let path = cache.path_for(key.as_str());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{\"expires_at\": 1, \"val").unwrap();

        assert_eq!(cache.fetch(key.as_str()).unwrap(), None);
        assert!(!path.exists());

        cache.save(key.as_str(), "<p>fresh</p>", Duration::from_secs(60)).unwrap();
        assert_eq!(cache.fetch(key.as_str()).unwrap().as_deref(), Some("<p>fresh</p>"));
    }

    #[test]
    fn same_key_saved_from_many_threads() {
        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(FileCache::new(dir.path()).unwrap());
        let key = CacheKey::page("page.twig", "/about");

        let writers: Vec<_> = (0..8)
            .map(|n| {
                let cache = std::sync::Arc::clone(&cache);
                let key = key.clone();
                std::thread::spawn(move || {
                    let page = format!("<p>writer {n}</p>");
                    for _ in 0..50 {
                        cache.save(key.as_str(), &page, Duration::from_secs(60)).unwrap();
                        let read = cache.fetch(key.as_str()).unwrap();
                        assert!(read.is_some_and(|v| v.starts_with("<p>writer ")));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let shard = cache.path_for(key.as_str()).parent().unwrap().to_path_buf();
        assert_eq!(fs::read_dir(shard).unwrap().count(), 1);
    }

    #[test]
    fn sub_second_ttl_is_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        cache.save("cc33", "soon", Duration::from_millis(500)).unwrap();
        assert_eq!(cache.fetch("cc33").unwrap().as_deref(), Some("soon"));
    }

    #[test]
    fn huge_ttl_saturates() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        cache.save("dd44", "forever", Duration::MAX).unwrap();
        assert_eq!(cache.fetch("dd44").unwrap().as_deref(), Some("forever"));
    }

    #[test]
    fn delete_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path()).unwrap();
        cache.save("aa11", "x", Duration::from_secs(60)).unwrap();
        cache.save("bb22", "y", Duration::from_secs(60)).unwrap();

        assert!(cache.delete("aa11").unwrap());
        assert!(!cache.delete("aa11").unwrap());
        cache.clear().unwrap();
        assert_eq!(cache.fetch("bb22").unwrap(), None);
        assert!(cache.root().exists());
    }
}
