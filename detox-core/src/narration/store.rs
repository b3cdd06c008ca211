//! Per-request narration artifacts on disk.
//!
//! Every artifact is written as `<dir>/<uuid>.<ext>` and indexed in memory.
//! [`NarrationStore::take`] hands an artifact out exactly once and removes
//! it; [`NarrationStore::sweep`] drops anything nobody fetched in time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AudioFormat, SynthesizedAudio};
use crate::error::{DetoxError, Result};

#[derive(Debug, Clone)]
struct StoredNarration {
    path: PathBuf,
    format: AudioFormat,
    created_at: DateTime<Utc>,
}

/// Narration audio fetched back out of the store.
#[derive(Debug, Clone)]
pub struct NarrationArtifact {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

#[derive(Debug)]
pub struct NarrationStore {
    dir: PathBuf,
    entries: Mutex<HashMap<Uuid, StoredNarration>>,
}

impl NarrationStore {
    /// Open (creating if needed) the artifact directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Persist `audio` under `id`, replacing any earlier artifact for it.
    pub fn put(&self, id: Uuid, audio: &SynthesizedAudio) -> Result<()> {
        let path = self
            .dir
            .join(format!("{}.{}", id, audio.format.extension()));
        std::fs::write(&path, &audio.bytes)?;
        let previous = self.entries.lock().insert(
            id,
            StoredNarration {
                path: path.clone(),
                format: audio.format,
                created_at: Utc::now(),
            },
        );
        if let Some(old) = previous.filter(|old| old.path != path) {
            remove_quietly(&old.path);
        }
        debug!(%id, bytes = audio.bytes.len(), "narration stored");
        Ok(())
    }

    /// Read and remove the artifact for `id`.
    pub fn take(&self, id: Uuid) -> Result<NarrationArtifact> {
        let entry = self
            .entries
            .lock()
            .remove(&id)
            .ok_or_else(|| DetoxError::NarrationNotFound(id.to_string()))?;
        let bytes = std::fs::read(&entry.path);
        remove_quietly(&entry.path);
        Ok(NarrationArtifact {
            bytes: bytes?,
            format: entry.format,
        })
    }

    /// Remove artifacts older than `max_age`. Returns how many were dropped.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let expired: Vec<StoredNarration> = {
            let mut entries = self.entries.lock();
            let stale: Vec<Uuid> = entries
                .iter()
                .filter(|(_, e)| e.created_at < cutoff)
                .map(|(id, _)| *id)
                .collect();
            stale.iter().filter_map(|id| entries.remove(id)).collect()
        };
        for entry in &expired {
            remove_quietly(&entry.path);
        }
        if !expired.is_empty() {
            debug!(removed = expired.len(), "expired narration artifacts swept");
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove narration artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp3(bytes: &[u8]) -> SynthesizedAudio {
        SynthesizedAudio {
            bytes: bytes.to_vec(),
            format: AudioFormat::Mp3,
        }
    }

    #[test]
    fn take_is_one_shot() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NarrationStore::new(dir.path()).expect("store");
        let id = Uuid::new_v4();
        store.put(id, &mp3(b"abc")).expect("put");

        let artifact = store.take(id).expect("first take");
        assert_eq!(artifact.bytes, b"abc");
        assert_eq!(artifact.format, AudioFormat::Mp3);
        assert!(!dir.path().join(format!("{id}.mp3")).exists());
        assert!(matches!(
            store.take(id),
            Err(DetoxError::NarrationNotFound(_))
        ));
    }

    #[test]
    fn artifacts_are_keyed_per_request() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NarrationStore::new(dir.path()).expect("store");
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.put(a, &mp3(b"first")).expect("put a");
        store.put(b, &mp3(b"second")).expect("put b");

        assert_eq!(store.len(), 2);
        assert_eq!(store.take(b).expect("b").bytes, b"second");
        assert_eq!(store.take(a).expect("a").bytes, b"first");
        assert!(store.is_empty());
    }

    #[test]
    fn sweep_drops_only_expired_entries() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NarrationStore::new(dir.path()).expect("store");
        let id = Uuid::new_v4();
        store.put(id, &mp3(b"x")).expect("put");

        assert_eq!(store.sweep(Duration::minutes(5)), 0);
        assert_eq!(store.sweep(Duration::zero() - Duration::seconds(1)), 1);
        assert!(store.is_empty());
        assert!(!dir.path().join(format!("{id}.mp3")).exists());
    }
}
