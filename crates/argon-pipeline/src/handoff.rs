//! Stage handoff store.
//!
//! Stages run as separate process invocations and pass values forward through
//! small `KEY=VALUE` files, one assignment per line. Each stage writes its
//! file once per run, replacing the previous contents.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Handoff file written by the training stage.
pub const ARTIFACTS_FILE: &str = ".env_artifacts";
/// Handoff file written by the evaluation gate.
pub const GATE_FILE: &str = ".env_gate";
/// Handoff file written by the registration stage.
pub const MODEL_FILE: &str = ".env_model";

pub mod keys {
    pub const MODEL_ARTIFACTS: &str = "MODEL_ARTIFACTS";
    pub const TRAINING_JOB_NAME: &str = "TRAINING_JOB_NAME";
    pub const MODEL_OK: &str = "MODEL_OK";
    pub const GATE_METRIC: &str = "GATE_METRIC";
    pub const GATE_METRIC_VALUE: &str = "GATE_METRIC_VALUE";
    pub const MODEL_PACKAGE_ARN: &str = "MODEL_PACKAGE_ARN";
}

/// Key-value store a stage publishes its outputs through.
pub trait HandoffStore: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str);

    /// Makes the current entries durable, replacing anything persisted before.
    fn persist(&mut self) -> PipelineResult<()>;
}

/// Handoff store backed by a flat `KEY=VALUE` file.
#[derive(Debug, Clone)]
pub struct FileHandoffStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileHandoffStore {
    /// Starts an empty store that will overwrite `path` on persist.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), entries: BTreeMap::new() }
    }

    /// Reads an existing handoff file.
    pub fn load(path: impl Into<PathBuf>) -> PipelineResult<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|source| PipelineError::Handoff { path: path.clone(), source })?;
        Ok(Self { entries: parse_assignments(&content).into_iter().collect(), path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HandoffStore for FileHandoffStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn persist(&mut self) -> PipelineResult<()> {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }

        let io_err = |source| PipelineError::Handoff { path: self.path.clone(), source };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&self.path, out).map_err(io_err)?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Persisted handoff file");
        Ok(())
    }
}

/// In-memory handoff store.
#[derive(Debug, Clone, Default)]
pub struct MemoryHandoffStore {
    entries: HashMap<String, String>,
    persisted: HashMap<String, String>,
    persist_count: usize,
}

impl MemoryHandoffStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries as of the last `persist`.
    #[must_use]
    pub fn persisted(&self) -> &HashMap<String, String> {
        &self.persisted
    }

    #[must_use]
    pub const fn persist_count(&self) -> usize {
        self.persist_count
    }
}

impl HandoffStore for MemoryHandoffStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn persist(&mut self) -> PipelineResult<()> {
        self.persisted.clone_from(&self.entries);
        self.persist_count += 1;
        Ok(())
    }
}

/// Parses `KEY=VALUE` lines. Blank lines and `#` comments are skipped.
#[must_use]
pub fn parse_assignments(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim().trim_start_matches("export ").trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Reads every `.env_*` file in `dir`, in file-name order.
///
/// A missing directory yields no assignments.
pub fn load_handoff_dir(dir: &Path) -> PipelineResult<Vec<(String, String)>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(PipelineError::Handoff { path: dir.to_path_buf(), source }),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PipelineError::Handoff { path: dir.to_path_buf(), source })?;
        let path = entry.path();
        let is_handoff = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(".env_"));
        if is_handoff && path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    let mut out = Vec::new();
    for path in files {
        let content = std::fs::read_to_string(&path)
            .map_err(|source| PipelineError::Handoff { path: path.clone(), source })?;
        out.extend(parse_assignments(&content));
    }
    Ok(out)
}
