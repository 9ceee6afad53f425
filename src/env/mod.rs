// src/env/mod.rs
//
// Environment capability contract for closed-loop anneal control.
//
// Concrete environments (the digital twin here, a hardware-driving
// environment elsewhere) implement the same trait and are chosen by
// configuration, never by inheritance.

pub mod twin;

use serde::{Deserialize, Serialize};

use crate::types::{Observation, StepInfo};

pub use twin::TwinEnv;

/// Result of executing one macro-step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// The observation after the segment completes.
    pub observation: Observation,
    /// Reward placeholder. Scoring is the reward module's responsibility,
    /// applied by the orchestrator; environments return 0.0.
    pub reward: f64,
    /// Whether the episode has terminated.
    pub done: bool,
    /// Side-channel metadata for this step.
    pub info: StepInfo,
}

/// Capability contract for anneal environments.
pub trait AnnealEnv {
    /// Start a new episode toward `goal_label`. Returns the cold-start
    /// observation; a fresh run identifier becomes available via `run_id`.
    fn reset(&mut self, goal_label: &str) -> Observation;

    /// Execute one ramp+dwell macro-segment. The action must already have
    /// passed through the shield.
    fn step(&mut self, action: &crate::types::Action) -> StepResult;

    /// Release any resources held by the environment.
    fn close(&mut self);

    /// Identifier of the current run (valid after `reset`).
    fn run_id(&self) -> &str;
}
