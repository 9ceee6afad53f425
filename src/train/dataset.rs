// src/train/dataset.rs
//
// Loads logged step records into flat transition tuples for training.
//
// Malformed rows are skipped rather than failing the job; only an empty
// dataset after filtering is fatal, since that means misconfiguration.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::logging::StepRecord;
use crate::types::ACTION_DIM;

/// One flattened transition: (o, a, r, o', done).
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub obs: Vec<f64>,
    pub action: [f64; ACTION_DIM],
    pub reward: f64,
    pub next_obs: Vec<f64>,
    pub done: bool,
}

/// In-memory training set with a single consistent observation width.
#[derive(Debug, Clone)]
pub struct TransitionDataset {
    transitions: Vec<Transition>,
    obs_dim: usize,
}

impl TransitionDataset {
    /// Build from pre-flattened transitions. The first transition fixes the
    /// observation width; rows with a different width are dropped.
    pub fn from_transitions(transitions: Vec<Transition>) -> Result<Self> {
        let obs_dim = match transitions.first() {
            Some(t) => t.obs.len(),
            None => bail!("transition dataset is empty"),
        };
        let transitions: Vec<Transition> = transitions
            .into_iter()
            .filter(|t| t.obs.len() == obs_dim && t.next_obs.len() == obs_dim)
            .collect();
        if transitions.is_empty() {
            bail!("transition dataset is empty after filtering");
        }
        Ok(Self {
            transitions,
            obs_dim,
        })
    }

    /// Read every JSONL log in `paths`, skipping lines that fail to parse.
    pub fn from_paths(paths: &[PathBuf]) -> Result<Self> {
        let mut transitions = Vec::new();
        for path in paths {
            let file = File::open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            for line in BufReader::new(file).lines() {
                let line = line
                    .with_context(|| format!("reading log file {}", path.display()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let Ok(record) = serde_json::from_str::<StepRecord>(&line) else {
                    continue;
                };
                transitions.push(Transition {
                    obs: record.obs_in.feature_vec(),
                    action: record.action.to_vec(),
                    reward: record.reward,
                    next_obs: record.obs_out.feature_vec(),
                    done: record.done,
                });
            }
        }
        Self::from_transitions(transitions)
            .context("no usable transitions found in the provided logs")
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn obs_dim(&self) -> usize {
        self.obs_dim
    }

    pub fn get(&self, index: usize) -> &Transition {
        &self.transitions[index]
    }
}
