// src/logging.rs
//
// Append-only JSONL step logging.
//
// One line-delimited record per executed step, flushed immediately so a
// crashed rollout still leaves a usable prefix. The record schema is the
// sole contract between the rollout loop and the offline trainer.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::{Action, Observation, StepInfo};

/// One logged transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub run_id: String,
    /// Monotonic within a run, starting at 1.
    pub step_id: u64,
    pub goal: String,
    /// Wall-clock seconds at the start of the step.
    pub t_start: f64,
    pub obs_in: Observation,
    pub action: Action,
    pub obs_out: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Destination for step records.
pub trait StepSink {
    fn append(&mut self, record: &StepRecord) -> io::Result<()>;
}

/// Discards every record. Useful for evaluation-only rollouts and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl StepSink for NoopSink {
    fn append(&mut self, _record: &StepRecord) -> io::Result<()> {
        Ok(())
    }
}

/// Writes each run's records to `<dir>/<run_id>.jsonl`, append-only.
///
/// Writers are opened lazily per run id and kept for the sink's lifetime,
/// so interleaved runs land in their own files without contention.
pub struct JsonlSink {
    dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl JsonlSink {
    /// Creates the log directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writers: HashMap::new(),
        })
    }

    /// Path a given run's records are written to.
    pub fn path_for(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{run_id}.jsonl"))
    }

    fn writer_for(&mut self, run_id: &str) -> io::Result<&mut BufWriter<File>> {
        if !self.writers.contains_key(run_id) {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.path_for(run_id))?;
            self.writers
                .insert(run_id.to_string(), BufWriter::new(file));
        }
        Ok(self.writers.get_mut(run_id).unwrap())
    }
}

impl StepSink for JsonlSink {
    fn append(&mut self, record: &StepRecord) -> io::Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let writer = self.writer_for(&record.run_id)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        // Flush per step so partial episodes stay recoverable.
        writer.flush()
    }
}
