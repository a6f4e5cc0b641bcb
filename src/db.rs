use crate::brain::BRAIN_VERSION;
use crate::progress::{ProgressError, ProgressLedger};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored topology {found} does not match this build ({expected})")]
    VersionMismatch { expected: String, found: String },
    #[error("no saved generation under {0}")]
    MissingPersistedData(PathBuf),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("progress ledger error: {0}")]
    Ledger(#[from] ProgressError),
    #[error("save worker panicked")]
    Worker,
}

/// One brain: layer shapes `(outputs, inputs)` plus weights as nested rows.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BrainRecord {
    pub version: u32,
    pub layer_shapes: Vec<(usize, usize)>,
    pub weights: Vec<Vec<Vec<f32>>>, // layer × row × col
    pub biases: Vec<Vec<f32>>,
}

/// A finished generation. `brains` is empty when only the elite was kept.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerationRecord {
    pub version: u32,
    pub generation_id: u32,
    pub population_size: usize,
    pub total_fitness: f64,
    pub elite_fitness: f64,
    pub elite_brain: BrainRecord,
    #[serde(default)]
    pub brains: Vec<BrainRecord>,
}

/// JSON files under `{data_dir}/v{BRAIN_VERSION}/`, one per generation.
#[derive(Clone, Debug)]
pub struct GenerationStore {
    dir: PathBuf,
}

impl GenerationStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self { dir: data_dir.as_ref().join(format!("v{BRAIN_VERSION}")) }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, generation_id: u32) -> PathBuf {
        self.dir.join(format!("generation_{generation_id:06}.json"))
    }

    /// Write through a temporary sibling and rename, so a half-written file never
    /// replaces a good one.
    pub fn save(&self, record: &GenerationRecord) -> Result<PathBuf, StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(record.generation_id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(record)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(path)
    }

    pub fn load(&self, generation_id: u32) -> Result<GenerationRecord, StoreError> {
        let path = self.path_for(generation_id);
        if !path.exists() {
            return Err(StoreError::MissingPersistedData(path));
        }
        let content = fs::read_to_string(&path)?;
        let record: GenerationRecord = serde_json::from_str(&content)?;
        if record.version != BRAIN_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: format!("v{BRAIN_VERSION}"),
                found: format!("v{}", record.version),
            });
        }
        Ok(record)
    }

    /// Highest generation id on disk, if any.
    pub fn latest_generation(&self) -> Result<Option<u32>, StoreError> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let mut latest = None;
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let id = name
                .to_str()
                .and_then(|n| n.strip_prefix("generation_"))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(id) = id {
                latest = latest.max(Some(id));
            }
        }
        Ok(latest)
    }

    pub fn load_latest(&self) -> Result<GenerationRecord, StoreError> {
        match self.latest_generation()? {
            Some(id) => self.load(id),
            None => Err(StoreError::MissingPersistedData(self.dir.clone())),
        }
    }
}

/// Background writer for finished generations.
///
/// Each submitted record is owned by its worker thread; the population has already
/// moved on to the next generation when the write starts. At most one write is in
/// flight: submitting waits for the previous one.
pub struct WriteBehind {
    store: GenerationStore,
    ledger: Option<PathBuf>,
    pending: Option<JoinHandle<Result<PathBuf, StoreError>>>,
}

impl WriteBehind {
    pub fn new(store: GenerationStore, ledger: Option<PathBuf>) -> Self {
        Self { store, ledger, pending: None }
    }

    pub fn store(&self) -> &GenerationStore {
        &self.store
    }

    pub fn submit(&mut self, record: GenerationRecord) {
        if let Some(Err(e)) = self.wait() {
            warn!("previous generation save failed: {e}");
        }
        let store = self.store.clone();
        let ledger = self.ledger.clone();
        self.pending = Some(thread::spawn(move || write_generation(&store, ledger.as_deref(), &record)));
    }

    /// Join the in-flight write, if there is one.
    pub fn wait(&mut self) -> Option<Result<PathBuf, StoreError>> {
        let handle = self.pending.take()?;
        Some(handle.join().unwrap_or(Err(StoreError::Worker)))
    }
}

impl Drop for WriteBehind {
    fn drop(&mut self) {
        if let Some(Err(e)) = self.wait() {
            warn!("generation save failed: {e}");
        }
    }
}

fn write_generation(
    store: &GenerationStore,
    ledger: Option<&Path>,
    record: &GenerationRecord,
) -> Result<PathBuf, StoreError> {
    let path = store.save(record)?;
    debug!(generation = record.generation_id, path = %path.display(), "generation saved");
    if let Some(ledger) = ledger {
        ProgressLedger::open(ledger)?.record_generation(record)?;
    }
    info!(
        generation = record.generation_id,
        elite_fitness = record.elite_fitness,
        "persisted generation"
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::NeuralBrain;
    use crate::utils::create_rng;
    use tempfile::tempdir;

    fn record(generation_id: u32) -> GenerationRecord {
        let brain = NeuralBrain::random(&mut create_rng(generation_id as u64)).to_record();
        GenerationRecord {
            version: BRAIN_VERSION,
            generation_id,
            population_size: 2,
            total_fitness: 12.5,
            elite_fitness: 10.0,
            elite_brain: brain.clone(),
            brains: vec![brain.clone(), brain],
        }
    }

    #[test]
    fn save_then_load_latest() {
        let dir = tempdir().unwrap();
        let store = GenerationStore::new(dir.path());
        assert!(matches!(store.load_latest(), Err(StoreError::MissingPersistedData(_))));

        store.save(&record(3)).unwrap();
        store.save(&record(11)).unwrap();
        assert_eq!(store.latest_generation().unwrap(), Some(11));
        assert_eq!(store.load_latest().unwrap(), record(11));
        assert!(!store.path_for(11).with_extension("json.tmp").exists());
    }

    #[test]
    fn record_from_other_version_is_rejected() {
        let dir = tempdir().unwrap();
        let store = GenerationStore::new(dir.path());
        let mut stale = record(1);
        stale.version = BRAIN_VERSION + 1;
        store.save(&stale).unwrap();
        assert!(matches!(store.load(1), Err(StoreError::VersionMismatch { .. })));
    }

    #[test]
    fn write_behind_persists_and_records_progress() {
        let dir = tempdir().unwrap();
        let ledger = dir.path().join("progress.db");
        let mut writer = WriteBehind::new(GenerationStore::new(dir.path()), Some(ledger.clone()));
        writer.submit(record(0));
        writer.submit(record(1));
        let path = writer.wait().expect("write in flight").unwrap();
        assert!(path.ends_with("generation_000001.json"));

        let history = ProgressLedger::open(&ledger).unwrap().history(10).unwrap();
        assert_eq!(history.iter().map(|r| r.generation_id).collect::<Vec<_>>(), vec![0, 1]);
        drop(writer);
    }
}
