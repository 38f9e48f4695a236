use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use crate::error::FaceStoreError;
use crate::store::IdentityStore;
use crate::types::{Embedding, FaceRecord};

/// Consolidated record cache at the store root.
const CACHE_FILE: &str = "records.json";

/// Directory-per-person identity store.
///
/// Layout under the root:
///
/// ```text
/// {person_id}/metadata.txt   display name, UTF-8
/// {person_id}/{seq}.jpg      sample image bytes
/// {person_id}/{seq}.json     embedding sidecar for the sample
/// records.json               consolidated cache for fast reload
/// ```
///
/// The cache is a pure accelerator: a missing or corrupt cache is rebuilt
/// by walking the person directories. Embeddings live in JSON sidecars next
/// to their images because the embedding model is an external provider and
/// cannot be re-run at load time.
///
/// A person directory without `metadata.txt` holds staged (uncommitted)
/// enrollment samples; `commit` writes the metadata and folds the samples
/// into the known records.
pub struct DirStore {
    root: PathBuf,
    inner: Mutex<DirStoreInner>,
}

struct DirStoreInner {
    records: Vec<FaceRecord>,
    /// person_id -> staged embeddings, in capture order.
    staged: HashMap<String, Vec<Embedding>>,
}

impl DirStore {
    /// Opens (creating if needed) the store rooted at `root` and loads all
    /// known records.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, FaceStoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let store = Self {
            root,
            inner: Mutex::new(DirStoreInner {
                records: Vec::new(),
                staged: HashMap::new(),
            }),
        };
        let loaded = store.reload()?;
        info!(records = loaded, root = %store.root.display(), "face store opened");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn person_dir(&self, person_id: &str) -> PathBuf {
        self.root.join(person_id)
    }

    fn write_cache(&self, records: &[FaceRecord]) -> Result<(), FaceStoreError> {
        let data = serde_json::to_vec(records)?;
        fs::write(self.root.join(CACHE_FILE), data)?;
        Ok(())
    }

    /// Reads the cache file. `Ok(None)` when it does not exist; errors
    /// bubble up so the caller can fall back to a rebuild.
    fn load_cache(&self) -> Result<Option<Vec<FaceRecord>>, FaceStoreError> {
        let path = self.root.join(CACHE_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Rebuilds records by walking the person directories, then rewrites
    /// the cache. Unreadable sidecars are skipped, not fatal.
    fn rebuild(&self) -> Result<Vec<FaceRecord>, FaceStoreError> {
        let mut records = Vec::new();
        let mut person_dirs: Vec<PathBuf> = fs::read_dir(&self.root)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .collect();
        person_dirs.sort();

        for dir in person_dirs {
            let Some(person_id) = dir.file_name().and_then(|n| n.to_str()).map(String::from)
            else {
                continue;
            };
            let metadata = dir.join("metadata.txt");
            if !metadata.exists() {
                // Staged samples from an interrupted enrollment; not known.
                debug!(person_id = %person_id, "skipping uncommitted person directory");
                continue;
            }
            let name = fs::read_to_string(&metadata)?.trim().to_string();
            let name = if name.is_empty() { person_id.clone() } else { name };

            for path in sample_sidecars(&dir)? {
                match fs::read(&path).map_err(FaceStoreError::from).and_then(|data| {
                    serde_json::from_slice::<Embedding>(&data).map_err(FaceStoreError::from)
                }) {
                    Ok(embedding) => records.push(FaceRecord {
                        person_id: person_id.clone(),
                        name: name.clone(),
                        embedding,
                    }),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unreadable embedding sidecar");
                    }
                }
            }
        }

        if !records.is_empty() {
            self.write_cache(&records)?;
        }
        Ok(records)
    }
}

/// Embedding sidecar files in a person directory, in sample order.
fn sample_sidecars(dir: &Path) -> Result<Vec<PathBuf>, FaceStoreError> {
    let mut sidecars: Vec<PathBuf> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    sidecars.sort();
    Ok(sidecars)
}

/// Next free sample number in a person directory.
fn next_seq(dir: &Path) -> u32 {
    let mut max = 0;
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            if let Some(n) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok())
            {
                max = max.max(n);
            }
        }
    }
    max + 1
}

impl IdentityStore for DirStore {
    fn records(&self) -> Vec<FaceRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    fn contains(&self, person_id: &str) -> bool {
        // The on-disk directory is authoritative: an identity whose folder
        // was deleted is unknown even if its records linger in memory.
        self.person_dir(person_id).is_dir()
    }

    fn stage_sample(
        &self,
        person_id: &str,
        image: &[u8],
        embedding: &Embedding,
    ) -> Result<(), FaceStoreError> {
        let dir = self.person_dir(person_id);
        fs::create_dir_all(&dir)?;
        let seq = next_seq(&dir);
        let stem = format!("{seq:03}");
        fs::write(dir.join(format!("{stem}.jpg")), image)?;
        fs::write(dir.join(format!("{stem}.json")), serde_json::to_vec(embedding)?)?;

        let mut inner = self.inner.lock().unwrap();
        inner
            .staged
            .entry(person_id.to_string())
            .or_default()
            .push(embedding.clone());
        debug!(person_id = %person_id, sample = %stem, "staged enrollment sample");
        Ok(())
    }

    fn commit(&self, person_id: &str, name: &str) -> Result<usize, FaceStoreError> {
        let mut inner = self.inner.lock().unwrap();
        let staged = inner
            .staged
            .get(person_id)
            .cloned()
            .ok_or_else(|| FaceStoreError::NothingStaged(person_id.to_string()))?;

        let dir = self.person_dir(person_id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("metadata.txt"), name)?;

        let mut records = inner.records.clone();
        records.extend(staged.iter().map(|embedding| FaceRecord {
            person_id: person_id.to_string(),
            name: name.to_string(),
            embedding: embedding.clone(),
        }));
        self.write_cache(&records)?;

        // Only after every write succeeded does the commit become visible;
        // a failure above leaves the staged samples intact for retry.
        let count = staged.len();
        inner.records = records;
        inner.staged.remove(person_id);
        info!(person_id = %person_id, name = %name, samples = count, "identity committed");
        Ok(count)
    }

    fn discard(&self, person_id: &str) -> Result<(), FaceStoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.staged.remove(person_id);
        let committed = inner.records.iter().any(|r| r.person_id == person_id);
        drop(inner);

        // Never touch a committed person's directory; only staged-only
        // directories are partial enrollment debris.
        let dir = self.person_dir(person_id);
        if !committed && dir.exists() {
            fs::remove_dir_all(&dir)?;
            debug!(person_id = %person_id, "removed partial person directory");
        }
        Ok(())
    }

    fn remove(&self, person_id: &str) -> Result<(), FaceStoreError> {
        let mut inner = self.inner.lock().unwrap();
        let dir = self.person_dir(person_id);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        inner.records.retain(|r| r.person_id != person_id);
        inner.staged.remove(person_id);
        self.write_cache(&inner.records)?;
        info!(person_id = %person_id, "identity removed");
        Ok(())
    }

    fn reload(&self) -> Result<usize, FaceStoreError> {
        let records = match self.load_cache() {
            Ok(Some(records)) => records,
            Ok(None) => self.rebuild()?,
            Err(err) => {
                warn!(error = %err, "record cache unreadable, rebuilding from directories");
                self.rebuild()?
            }
        };
        let mut inner = self.inner.lock().unwrap();
        inner.records = records;
        Ok(inner.records.len())
    }
}
