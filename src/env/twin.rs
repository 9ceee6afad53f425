// src/env/twin.rs
//
// Digital-twin simulator of the surface-reconstruction anneal.
//
// A coarse thermal/order state machine: each step executes one ramp+dwell
// macro-segment, advances the temperature to the commanded target, updates
// exposure summaries, and evolves the sharpness / class-probability signal
// through a simple order-gain heuristic. All transitions are deterministic
// given the construction seed; run identifiers are drawn from the same
// seeded stream so full trajectories replay exactly.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::json;
use uuid::Uuid;

use crate::config::TwinConfig;
use crate::types::{normalize_probs, Action, Observation, StepInfo};

use super::{AnnealEnv, StepResult};

/// Sign of the previous segment's temperature delta.
///
/// A zero delta carries no direction: it neither counts as a reversal nor
/// overwrites the last real direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RampDirection {
    None,
    Heating,
    Cooling,
}

/// Twin simulator implementing [`AnnealEnv`].
pub struct TwinEnv {
    cfg: TwinConfig,
    rng: ChaCha8Rng,
    goal: String,
    run_id: String,
    step_id: u64,
    state: Observation,
    direction: RampDirection,
    done: bool,
}

impl TwinEnv {
    /// Create a twin with the given config and seed.
    pub fn new(cfg: TwinConfig, seed: u64) -> Self {
        let state = Self::cold_start(&cfg);
        Self {
            cfg,
            rng: ChaCha8Rng::seed_from_u64(seed),
            goal: String::new(),
            run_id: String::new(),
            step_id: 0,
            state,
            direction: RampDirection::None,
            done: false,
        }
    }

    /// Seeded twin with default parameters.
    pub fn with_seed(seed: u64) -> Self {
        Self::new(TwinConfig::default(), seed)
    }

    pub fn config(&self) -> &TwinConfig {
        &self.cfg
    }

    /// Current episode state (for testing).
    pub fn state(&self) -> &Observation {
        &self.state
    }

    fn cold_start(cfg: &TwinConfig) -> Observation {
        let mut probs = cfg.start_probs.clone();
        normalize_probs(&mut probs);
        Observation {
            recon_probs: probs,
            sharpness: cfg.start_sharpness,
            spacing_ratio: cfg.start_spacing_ratio,
            embedding: None,
            t_curr: cfg.ambient_temp,
            r_curr: 0.0,
            dwell_elapsed: 0.0,
            time_since_start: 0.0,
            t_peak: cfg.ambient_temp,
            time_since_peak: 0.0,
            time_above_threshold: 0.0,
            direction_changes: 0,
            last_action: None,
        }
    }

    /// Advance the surface state through one ramp+dwell segment.
    fn evolve(&mut self, action: &Action) -> Observation {
        let cfg = &self.cfg;
        let s = &self.state;

        let delta_t = action.t_set - s.t_curr;
        let rate = action.r_cmd.max(cfg.rate_epsilon);
        let ramp_time = delta_t.abs() / rate;
        let seg_time = ramp_time + action.dwell_min;
        let t_next = action.t_set;

        // Exposure summaries.
        let t_peak = s.t_peak.max(t_next);
        let time_since_peak = if t_next >= s.t_peak {
            0.0
        } else {
            s.time_since_peak + seg_time
        };
        let time_above = s.time_above_threshold
            + if t_next >= cfg.high_temp_threshold {
                seg_time
            } else {
                0.0
            };

        // Direction reversal accounting; zero deltas leave both the counter
        // and the remembered direction untouched.
        let new_direction = if delta_t > 0.0 {
            RampDirection::Heating
        } else if delta_t < 0.0 {
            RampDirection::Cooling
        } else {
            RampDirection::None
        };
        let mut direction_changes = s.direction_changes;
        if new_direction != RampDirection::None {
            if self.direction != RampDirection::None && self.direction != new_direction {
                direction_changes += 1;
            }
            self.direction = new_direction;
        }

        // Order gain: prior high-T exposure followed by a segment inside the
        // moderate ordering band raises order; fast ramps lower it.
        let mut order_gain = 0.0;
        if s.t_peak >= cfg.high_temp_threshold
            && t_next >= cfg.order_band_lo
            && t_next <= cfg.order_band_hi
        {
            let exposure = s.time_above_threshold.min(cfg.exposure_saturation)
                / cfg.exposure_saturation;
            order_gain += cfg.order_gain_base + cfg.order_gain_exposure * exposure;
        }
        order_gain -= cfg.ramp_penalty * (action.r_cmd / cfg.ramp_penalty_ref);

        // gen_range panics on an empty range, and zero amplitude is the
        // legitimate way to run the twin noise-free.
        let noise = if cfg.noise_amplitude > 0.0 {
            self.rng
                .gen_range(-cfg.noise_amplitude..cfg.noise_amplitude)
        } else {
            0.0
        };
        let sharpness = (s.sharpness + order_gain + noise).clamp(0.0, 1.0);

        // Nudge the goal class in proportion to positive gain, then
        // renormalize the whole vector.
        let mut probs = s.recon_probs.clone();
        if let Some(p) = probs.get_mut(cfg.target_index) {
            let bump = (cfg.prob_bump_gain * order_gain).max(0.0);
            *p = (*p + bump).clamp(0.0, 1.0);
        }
        normalize_probs(&mut probs);

        Observation {
            recon_probs: probs,
            sharpness,
            spacing_ratio: s.spacing_ratio,
            embedding: None,
            t_curr: t_next,
            r_curr: action.r_cmd,
            dwell_elapsed: action.dwell_min,
            time_since_start: s.time_since_start + seg_time,
            t_peak,
            time_since_peak,
            time_above_threshold: time_above,
            direction_changes,
            last_action: Some(action.to_vec()),
        }
    }
}

impl AnnealEnv for TwinEnv {
    fn reset(&mut self, goal_label: &str) -> Observation {
        self.goal = goal_label.to_string();
        self.run_id = Uuid::from_u128(self.rng.gen::<u128>()).to_string();
        self.step_id = 0;
        self.state = Self::cold_start(&self.cfg);
        self.direction = RampDirection::None;
        self.done = false;
        self.state.clone()
    }

    fn step(&mut self, action: &Action) -> StepResult {
        self.step_id += 1;
        let next = self.evolve(action);

        let info = StepInfo {
            source_path: None,
            safety_clamped: false,
            raw_metrics: Some(json!({ "fft_snr": next.sharpness * 5.0 })),
            run_id: self.run_id.clone(),
            step_id: self.step_id,
        };

        self.done = next.time_since_start >= self.cfg.time_cap;
        self.state = next.clone();

        StepResult {
            observation: next,
            reward: 0.0,
            done: self.done,
            info,
        }
    }

    fn close(&mut self) {
        // The twin holds no external resources.
    }

    fn run_id(&self) -> &str {
        &self.run_id
    }
}
