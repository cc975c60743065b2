//! Result persistence hand-off.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::drills::types::DrillResult;

/// Receives each finished drill result exactly once.
pub trait ResultRecorder: Send + Sync {
    /// Persist a result.
    fn record(&self, result: &DrillResult) -> Result<(), RecorderError>;
}

/// Keeps results in memory.
#[derive(Default)]
pub struct MemoryResultRecorder {
    results: Mutex<Vec<DrillResult>>,
}

impl MemoryResultRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Results recorded so far.
    pub fn results(&self) -> Vec<DrillResult> {
        self.results
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl ResultRecorder for MemoryResultRecorder {
    fn record(&self, result: &DrillResult) -> Result<(), RecorderError> {
        self.results
            .lock()
            .map_err(|e| RecorderError::SaveFailed(format!("Lock poisoned: {}", e)))?
            .push(result.clone());
        Ok(())
    }
}

/// Appends results to a JSON-lines file.
pub struct JsonLinesRecorder {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesRecorder {
    /// Create a recorder writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// File the results are appended to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read back every result in the file.
    pub fn load_all(&self) -> Result<Vec<DrillResult>, RecorderError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file =
            std::fs::File::open(&self.path).map_err(|e| RecorderError::IoError(e.to_string()))?;

        let mut results = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| RecorderError::IoError(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let result = serde_json::from_str(&line)
                .map_err(|e| RecorderError::SerializeError(e.to_string()))?;
            results.push(result);
        }

        Ok(results)
    }
}

impl ResultRecorder for JsonLinesRecorder {
    fn record(&self, result: &DrillResult) -> Result<(), RecorderError> {
        let line =
            serde_json::to_string(result).map_err(|e| RecorderError::SerializeError(e.to_string()))?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| RecorderError::SaveFailed(format!("Lock poisoned: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RecorderError::IoError(e.to_string()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RecorderError::IoError(e.to_string()))?;

        writeln!(file, "{}", line).map_err(|e| RecorderError::IoError(e.to_string()))?;

        tracing::debug!("Recorded drill result {} to {:?}", result.id, self.path);
        Ok(())
    }
}

/// Result recording errors.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Failed to save result: {0}")]
    SaveFailed(String),
}
