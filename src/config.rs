// src/config.rs
//
// Central configuration for the anneal control loop and trainer.
//
// Single source of truth for the twin simulator, shield bounds, recipe
// parameters, reward shaping and rollout settings. Defaults mirror the
// furnace envelope the recipes were written for.

use crate::types::Action;

/// Per-field [min, max] envelope for a macro-action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionBounds {
    /// Target temperature bounds (°C).
    pub t_min: f64,
    pub t_max: f64,
    /// Ramp rate bounds (°C/min).
    pub r_min: f64,
    pub r_max: f64,
    /// Dwell bounds (minutes).
    pub dwell_min: f64,
    pub dwell_max: f64,
}

impl Default for ActionBounds {
    fn default() -> Self {
        Self {
            t_min: 300.0,
            t_max: 1050.0,
            r_min: 2.0,
            r_max: 30.0,
            dwell_min: 2.0,
            dwell_max: 20.0,
        }
    }
}

impl ActionBounds {
    /// Clamp every field of `action` into its envelope.
    pub fn clamp(&self, action: &Action) -> Action {
        Action {
            t_set: action.t_set.clamp(self.t_min, self.t_max),
            r_cmd: action.r_cmd.clamp(self.r_min, self.r_max),
            dwell_min: action.dwell_min.clamp(self.dwell_min, self.dwell_max),
        }
    }
}

/// Safety-clamp configuration for the action shield.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShieldConfig {
    /// Per-field envelope applied after the jump limit.
    pub bounds: ActionBounds,
    /// Maximum temperature change per segment relative to the current
    /// temperature (°C).
    pub max_jump: f64,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            bounds: ActionBounds::default(),
            max_jump: Self::DEFAULT_MAX_JUMP,
        }
    }
}

impl ShieldConfig {
    /// Default jump limit matching the furnace controller.
    pub const DEFAULT_MAX_JUMP: f64 = 200.0;

    pub fn new(bounds: ActionBounds, max_jump: f64) -> Self {
        Self { bounds, max_jump }
    }
}

impl From<ActionBounds> for ShieldConfig {
    fn from(bounds: ActionBounds) -> Self {
        Self {
            bounds,
            max_jump: Self::DEFAULT_MAX_JUMP,
        }
    }
}

/// Twin simulator parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TwinConfig {
    /// Cold-start temperature (°C).
    pub ambient_temp: f64,
    /// Cold-start class probabilities.
    pub start_probs: Vec<f64>,
    /// Cold-start sharpness.
    pub start_sharpness: f64,
    /// Cold-start spacing ratio.
    pub start_spacing_ratio: f64,
    /// Index of the goal reconstruction class in `recon_probs`.
    pub target_index: usize,
    /// High-temperature threshold for exposure accounting (°C).
    pub high_temp_threshold: f64,
    /// Moderate-temperature ordering band [lo, hi] (°C) where prior high-T
    /// exposure converts into order.
    pub order_band_lo: f64,
    pub order_band_hi: f64,
    /// Base order gain when the band condition is met.
    pub order_gain_base: f64,
    /// Extra gain per saturated unit of high-T exposure.
    pub order_gain_exposure: f64,
    /// Minutes of high-T exposure at which the exposure bonus saturates.
    pub exposure_saturation: f64,
    /// Order-gain penalty coefficient for fast ramps.
    pub ramp_penalty: f64,
    /// Ramp rate (°C/min) at which the penalty reaches `ramp_penalty`.
    pub ramp_penalty_ref: f64,
    /// Fraction of positive order gain fed into the target-class probability.
    pub prob_bump_gain: f64,
    /// Amplitude of the uniform sharpness perturbation.
    pub noise_amplitude: f64,
    /// Floor applied to the commanded ramp rate before division.
    pub rate_epsilon: f64,
    /// Episode cap in simulated minutes.
    pub time_cap: f64,
}

impl Default for TwinConfig {
    fn default() -> Self {
        Self {
            ambient_temp: 25.0,
            start_probs: vec![0.6, 0.1, 0.1, 0.2],
            start_sharpness: 0.05,
            start_spacing_ratio: 1.0,
            target_index: 2,
            high_temp_threshold: 900.0,
            order_band_lo: 350.0,
            order_band_hi: 500.0,
            order_gain_base: 0.1,
            order_gain_exposure: 0.05,
            exposure_saturation: 30.0,
            ramp_penalty: 0.01,
            ramp_penalty_ref: 30.0,
            prob_bump_gain: 0.15,
            noise_amplitude: 0.01,
            rate_epsilon: 1e-6,
            time_cap: 120.0,
        }
    }
}

/// Step-reward shaping weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardConfig {
    /// Index of the goal class in `recon_probs`.
    pub target_index: usize,
    /// Minimum sharpness for the goal-probability term to count.
    pub sharp_threshold: f64,
    /// Weight of sharpness in the order score.
    pub w_sharpness: f64,
    /// Weight of the capped spacing-ratio term in the order score.
    pub w_spacing: f64,
    /// Weight on the order-score change.
    pub alpha: f64,
    /// Weight on the gated goal probability.
    pub beta: f64,
    /// Linear cost per dwell minute.
    pub lambda_dwell: f64,
    /// Linear cost per °C of commanded temperature change.
    pub lambda_delta_t: f64,
    /// Linear cost per °C/min of commanded ramp rate.
    pub lambda_rate: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            target_index: 2,
            sharp_threshold: 0.2,
            w_sharpness: 0.5,
            w_spacing: 0.5,
            alpha: 0.5,
            beta: 1.0,
            lambda_dwell: 0.02,
            lambda_delta_t: 0.002,
            lambda_rate: 0.02,
        }
    }
}

/// Windowed terminal-success bonus parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalBonusConfig {
    /// Number of trailing observations examined.
    pub window: usize,
    /// Required mean gated goal probability over the window.
    pub prob_threshold: f64,
    /// Required mean gate weight over the window (stricter than a single
    /// favorable frame).
    pub gate_threshold: f64,
    /// Bonus granted on sustained success.
    pub bonus: f64,
}

impl Default for TerminalBonusConfig {
    fn default() -> Self {
        Self {
            window: 3,
            prob_threshold: 0.8,
            gate_threshold: 0.7,
            bonus: 2.0,
        }
    }
}

/// Named recipe played by the cookbook heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeMode {
    /// Activation peak, then slow cool through the ordering window, then
    /// stabilize near the target temperature.
    Activation,
    /// Long high-temperature dwell, then fast cool, then a short hold.
    Reduction,
}

impl RecipeMode {
    /// Stable lowercase name (used in logs).
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeMode::Activation => "activation",
            RecipeMode::Reduction => "reduction",
        }
    }

    /// Parse a mode name (case-insensitive). Returns None if unrecognized.
    pub fn parse(s: &str) -> Option<RecipeMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "activation" | "act" => Some(RecipeMode::Activation),
            "reduction" | "red" | "htr" => Some(RecipeMode::Reduction),
            _ => None,
        }
    }
}

/// Cookbook heuristic parameters for both recipes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CookbookParams {
    // ----- Activation recipe -----
    /// Activation peak temperature (°C).
    pub act_peak_temp: f64,
    /// Ramp rate up to the peak (°C/min).
    pub act_peak_rate: f64,
    /// Nominal dwell at the peak (minutes).
    pub act_peak_dwell: f64,
    /// Ordering-band center target (°C).
    pub act_target_temp: f64,
    /// Slow-cool ramp rate (°C/min).
    pub act_cool_rate: f64,
    /// Nominal dwell at the target (minutes).
    pub act_target_dwell: f64,
    /// Ordering window bounds (°C).
    pub act_band_lo: f64,
    pub act_band_hi: f64,
    /// Minimum accumulated dwell minutes inside the ordering window before
    /// advancing to stabilization.
    pub act_min_band_time: f64,

    // ----- Reduction recipe -----
    /// High-temperature dwell target (°C).
    pub red_high_temp: f64,
    /// Ramp rate up to the high dwell (°C/min).
    pub red_high_rate: f64,
    /// Nominal high-temperature dwell (minutes).
    pub red_high_dwell: f64,
    /// Quench target temperature (°C).
    pub red_quench_temp: f64,
    /// Fast-cool ramp rate (°C/min).
    pub red_cool_rate: f64,
    /// Hold duration after the quench (minutes).
    pub red_quench_dwell: f64,

    // ----- Adaptivity -----
    /// Sharpness level required before trusting an improving trend.
    pub sharp_gate: f64,
    /// Sharpness delta counted as "improving".
    pub trend_pos: f64,
    /// Sharpness delta counted as "getting worse".
    pub trend_neg: f64,
    /// Dwell extension applied by the adaptive rules (minutes).
    pub dwell_extension: f64,
}

impl Default for CookbookParams {
    fn default() -> Self {
        Self {
            act_peak_temp: 980.0,
            act_peak_rate: 12.0,
            act_peak_dwell: 20.0,
            act_target_temp: 440.0,
            act_cool_rate: 7.0,
            act_target_dwell: 12.0,
            act_band_lo: 400.0,
            act_band_hi: 550.0,
            act_min_band_time: 25.0,
            red_high_temp: 1060.0,
            red_high_rate: 15.0,
            red_high_dwell: 40.0,
            red_quench_temp: 650.0,
            red_cool_rate: 20.0,
            red_quench_dwell: 6.0,
            sharp_gate: 0.18,
            trend_pos: 0.002,
            trend_neg: -0.001,
            dwell_extension: 5.0,
        }
    }
}

/// Fixed schedule for the staircase policy.
#[derive(Debug, Clone, PartialEq)]
pub struct StaircaseConfig {
    /// Ordered macro-actions; the final entry repeats once exhausted.
    pub steps: Vec<Action>,
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        Self {
            steps: vec![
                Action::new(1000.0, 15.0, 15.0),
                Action::new(480.0, 8.0, 5.0),
                Action::new(444.0, 5.0, 10.0),
            ],
        }
    }
}

/// Controller selection for a rollout.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyKind {
    /// Seeded uniform sampling over the action envelope.
    Random { seed: u64 },
    /// Fixed ordered action schedule.
    Staircase,
    /// Recipe phase state machine.
    Cookbook(RecipeMode),
    /// Policy trained offline from prior logs.
    Learned,
}

impl PolicyKind {
    /// Parse a policy name. `mode` applies to the cookbook only.
    /// Returns None for unknown names so callers can fail fast.
    pub fn parse(name: &str, mode: RecipeMode, seed: u64) -> Option<PolicyKind> {
        match name.trim().to_ascii_lowercase().as_str() {
            "random" => Some(PolicyKind::Random { seed }),
            "stair" | "staircase" => Some(PolicyKind::Staircase),
            "cookbook" => Some(PolicyKind::Cookbook(mode)),
            "learned" => Some(PolicyKind::Learned),
            _ => None,
        }
    }
}
