//! FileSink - JSON-lines collections on disk

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{ContractError, LaneAggregateDocument, PersistenceSink, ViolationDocument};
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

/// Violation collection file under `base_path`
pub const VIOLATION_FILE: &str = "violation_vehicles.jsonl";
/// Lane aggregate collection file under `base_path`
pub const AGGREGATE_FILE: &str = "vehicles.jsonl";

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Base output directory
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./store"));

        Self { base_path }
    }
}

#[derive(Debug)]
struct Collections {
    violations: File,
    aggregates: File,
    /// Latest aggregate per camera id
    last: HashMap<String, LaneAggregateDocument>,
}

/// Sink that appends one JSON document per line.
///
/// Each insert is a single `write_all` of a complete line under a lock, so
/// concurrent pipelines never interleave documents.
#[derive(Debug)]
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    collections: Mutex<Collections>,
}

impl FileSink {
    /// Create a new FileSink, reloading the latest aggregates already on disk.
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;
        let aggregates_path = config.base_path.join(AGGREGATE_FILE);
        let last = load_last_aggregates(&aggregates_path)?;
        let collections = Collections {
            violations: open_append(&config.base_path.join(VIOLATION_FILE))?,
            aggregates: open_append(&aggregates_path)?,
            last,
        };
        Ok(Self {
            name: name.into(),
            config,
            collections: Mutex::new(collections),
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_err(&self, e: impl std::fmt::Display) -> ContractError {
        error!(sink = %self.name, error = %e, "Write failed");
        ContractError::sink_write(&self.name, e.to_string())
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn to_line<T: Serialize>(doc: &T) -> serde_json::Result<Vec<u8>> {
    let mut line = serde_json::to_vec(doc)?;
    line.push(b'\n');
    Ok(line)
}

fn load_last_aggregates(path: &Path) -> std::io::Result<HashMap<String, LaneAggregateDocument>> {
    let mut last = HashMap::new();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(last),
        Err(e) => return Err(e),
    };
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LaneAggregateDocument>(&line) {
            Ok(doc) => {
                for counts in &doc.cam {
                    last.insert(counts.cam_id.clone(), doc.clone());
                }
            }
            Err(e) => warn!(path = %path.display(), line = n + 1, error = %e, "Skipping unreadable aggregate"),
        }
    }
    debug!(path = %path.display(), cameras = last.len(), "Loaded previous aggregates");
    Ok(last)
}

impl PersistenceSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_sink_insert_one", skip(self, document), fields(sink = %self.name))]
    fn insert_one(&self, document: &ViolationDocument) -> Result<(), ContractError> {
        let line = to_line(document).map_err(|e| self.write_err(e))?;
        self.lock()
            .violations
            .write_all(&line)
            .map_err(|e| self.write_err(e))
    }

    #[instrument(name = "file_sink_insert_delta", skip(self, document), fields(sink = %self.name))]
    fn insert_delta(&self, document: &LaneAggregateDocument) -> Result<(), ContractError> {
        let line = to_line(document).map_err(|e| self.write_err(e))?;
        let mut collections = self.lock();
        collections
            .aggregates
            .write_all(&line)
            .map_err(|e| self.write_err(e))?;
        for counts in &document.cam {
            collections
                .last
                .insert(counts.cam_id.clone(), document.clone());
        }
        Ok(())
    }

    fn last_aggregate(&self, cam_id: &str) -> Result<Option<LaneAggregateDocument>, ContractError> {
        Ok(self.lock().last.get(cam_id).cloned())
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    fn flush(&self) -> Result<(), ContractError> {
        let mut collections = self.lock();
        collections
            .violations
            .flush()
            .and_then(|_| collections.aggregates.flush())
            .map_err(|e| self.write_err(e))
    }
}
