// src/types.rs
//
// Shared record types for the anneal control loop.
//
// Observation, Action and StepInfo are immutable value types with structural
// equality: the environment and policies always produce fresh instances, and
// the shield returns a clamped copy rather than mutating in place. All three
// serialize with serde so logged trajectories replay exactly.

use serde::{Deserialize, Serialize};

/// Current observation schema version.
/// Increment when adding/removing/changing fields.
pub const OBS_VERSION: u32 = 1;

/// Number of scalars in the action vector: [T_set, dwell_min, r_cmd].
pub const ACTION_DIM: usize = 3;

/// Snapshot of simulated / sensed process state.
///
/// Fields are ordered to match the fixed feature flattening used for model
/// input (see [`Observation::feature_vec`]). The class-probability vector is
/// always kept renormalized; use [`normalize_probs`] after any adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    // ----- Diffraction-derived signal -----
    /// Probability distribution over reconstruction classes.
    /// Invariant: nonnegative, sums to 1.
    pub recon_probs: Vec<f64>,
    /// Diffraction-pattern clarity proxy in [0, 1].
    pub sharpness: f64,
    /// Periodicity spacing relative to a reference.
    pub spacing_ratio: f64,
    /// Optional fixed-length embedding from the feature extractor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,

    // ----- Process telemetry -----
    /// Current temperature (°C).
    #[serde(rename = "T_curr")]
    pub t_curr: f64,
    /// Most recent commanded ramp rate (°C/min).
    pub r_curr: f64,
    /// Dwell minutes of the most recent segment.
    pub dwell_elapsed: f64,
    /// Minutes of simulated process time since episode start.
    pub time_since_start: f64,

    // ----- Running summaries -----
    /// Peak temperature seen this episode (°C).
    #[serde(rename = "T_peak")]
    pub t_peak: f64,
    /// Minutes since the peak temperature was last reached.
    pub time_since_peak: f64,
    /// Cumulative minutes spent at or above the high-temperature threshold.
    pub time_above_threshold: f64,
    /// Number of heating/cooling direction reversals.
    pub direction_changes: u32,

    /// Previous executed action as [T_set, dwell_min, r_cmd], if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<[f64; 3]>,
}

impl Observation {
    /// Flatten to the fixed-order numeric feature vector consumed by models:
    ///
    /// recon_probs ++ [sharpness, spacing_ratio] ++ embedding (if present)
    /// ++ [T_curr, r_curr, dwell_elapsed, time_since_start]
    /// ++ [T_peak, time_since_peak, time_above_threshold]
    /// ++ [direction_changes] ++ last_action (zero-filled if absent)
    pub fn feature_vec(&self) -> Vec<f64> {
        let mut x = Vec::with_capacity(self.recon_probs.len() + 12);
        x.extend_from_slice(&self.recon_probs);
        x.push(self.sharpness);
        x.push(self.spacing_ratio);
        if let Some(emb) = &self.embedding {
            x.extend_from_slice(emb);
        }
        x.push(self.t_curr);
        x.push(self.r_curr);
        x.push(self.dwell_elapsed);
        x.push(self.time_since_start);
        x.push(self.t_peak);
        x.push(self.time_since_peak);
        x.push(self.time_above_threshold);
        x.push(self.direction_changes as f64);
        let la = self.last_action.unwrap_or([0.0, 0.0, 0.0]);
        x.extend_from_slice(&la);
        x
    }
}

/// Renormalize a class-probability vector in place so it sums to 1.
///
/// Negative entries are floored at 0 first. A degenerate all-zero vector
/// falls back to uniform rather than propagating a division fault.
pub fn normalize_probs(probs: &mut [f64]) {
    for p in probs.iter_mut() {
        if !p.is_finite() || *p < 0.0 {
            *p = 0.0;
        }
    }
    let sum: f64 = probs.iter().sum();
    if sum <= 0.0 {
        let n = probs.len();
        if n > 0 {
            let uniform = 1.0 / n as f64;
            probs.iter_mut().for_each(|p| *p = uniform);
        }
        return;
    }
    for p in probs.iter_mut() {
        *p /= sum;
    }
}

/// Macro-command for one ramp+dwell segment.
///
/// Produced fresh by a policy call, then passed through the shield; only the
/// shield's output is ever executed by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Target temperature (°C).
    #[serde(rename = "T_set")]
    pub t_set: f64,
    /// Commanded ramp rate (°C/min, magnitude).
    pub r_cmd: f64,
    /// Dwell duration at the target (minutes).
    pub dwell_min: f64,
}

impl Action {
    pub fn new(t_set: f64, r_cmd: f64, dwell_min: f64) -> Self {
        Self {
            t_set,
            r_cmd,
            dwell_min,
        }
    }

    /// Fixed action vector order used for training and inference:
    /// [T_set, dwell_min, r_cmd].
    pub fn to_vec(self) -> [f64; ACTION_DIM] {
        [self.t_set, self.dwell_min, self.r_cmd]
    }

    /// Inverse of [`Action::to_vec`].
    pub fn from_vec(v: &[f64]) -> Self {
        Self {
            t_set: v.first().copied().unwrap_or(0.0),
            dwell_min: v.get(1).copied().unwrap_or(0.0),
            r_cmd: v.get(2).copied().unwrap_or(0.0),
        }
    }
}

/// Per-step side-channel metadata. Auditable only; carries no control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Path of the source image behind this observation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// Whether the shield altered the proposed action this step.
    pub safety_clamped: bool,
    /// Raw diagnostic metrics from the environment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_metrics: Option<serde_json::Value>,
    /// Owning run identifier.
    pub run_id: String,
    /// 1-based step index within the run.
    pub step_id: u64,
}
