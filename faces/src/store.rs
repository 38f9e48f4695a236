use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::FaceStoreError;
use crate::types::{Embedding, FaceRecord};

/// Storage for known identities and in-flight enrollment samples.
///
/// Enrollment goes through a two-phase protocol: `stage_sample` persists
/// captured samples that are not yet part of anyone's identity, and
/// `commit` promotes them to known records under a display name. Known
/// records are append-only during normal operation: `commit` adds and
/// nothing rewrites, so a full `reload` is equivalent to replaying all
/// prior commits.
///
/// Implementations must be safe for concurrent use (Send + Sync).
pub trait IdentityStore: Send + Sync {
    /// Snapshot of all known face samples.
    fn records(&self) -> Vec<FaceRecord>;

    /// Reports whether a person is currently known in backing storage.
    /// Used by strict matching to treat a deleted identity as unknown even
    /// if its records linger in a cache.
    fn contains(&self, person_id: &str) -> bool;

    /// Persists one not-yet-committed enrollment sample.
    fn stage_sample(
        &self,
        person_id: &str,
        image: &[u8],
        embedding: &Embedding,
    ) -> Result<(), FaceStoreError>;

    /// Promotes staged samples into known records under the given display
    /// name. Returns the number of samples committed.
    fn commit(&self, person_id: &str, name: &str) -> Result<usize, FaceStoreError>;

    /// Removes staged data for a person. Missing data is not an error.
    fn discard(&self, person_id: &str) -> Result<(), FaceStoreError>;

    /// Deletes a known identity and all of its samples.
    fn remove(&self, person_id: &str) -> Result<(), FaceStoreError>;

    /// Rebuilds the in-memory records from backing storage.
    /// Returns the number of records loaded.
    fn reload(&self) -> Result<usize, FaceStoreError>;
}

/// In-memory [`IdentityStore`] implementation.
/// Data is lost on restart. Suitable for testing or ephemeral use.
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

struct MemoryStoreInner {
    records: Vec<FaceRecord>,
    staged: HashMap<String, Vec<Embedding>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Creates a store pre-populated with known records.
    pub fn with_records(records: Vec<FaceRecord>) -> Self {
        Self {
            inner: Mutex::new(MemoryStoreInner {
                records,
                staged: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore for MemoryStore {
    fn records(&self) -> Vec<FaceRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    fn contains(&self, person_id: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .any(|r| r.person_id == person_id)
    }

    fn stage_sample(
        &self,
        person_id: &str,
        _image: &[u8],
        embedding: &Embedding,
    ) -> Result<(), FaceStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .staged
            .entry(person_id.to_string())
            .or_default()
            .push(embedding.clone());
        Ok(())
    }

    fn commit(&self, person_id: &str, name: &str) -> Result<usize, FaceStoreError> {
        let mut inner = self.inner.lock().unwrap();
        let staged = inner
            .staged
            .remove(person_id)
            .ok_or_else(|| FaceStoreError::NothingStaged(person_id.to_string()))?;
        let count = staged.len();
        for embedding in staged {
            inner.records.push(FaceRecord {
                person_id: person_id.to_string(),
                name: name.to_string(),
                embedding,
            });
        }
        Ok(count)
    }

    fn discard(&self, person_id: &str) -> Result<(), FaceStoreError> {
        self.inner.lock().unwrap().staged.remove(person_id);
        Ok(())
    }

    fn remove(&self, person_id: &str) -> Result<(), FaceStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.records.retain(|r| r.person_id != person_id);
        inner.staged.remove(person_id);
        Ok(())
    }

    fn reload(&self) -> Result<usize, FaceStoreError> {
        Ok(self.inner.lock().unwrap().records.len())
    }
}
