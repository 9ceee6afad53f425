// src/policy/cookbook.rs
//
// Recipe phase state machine.
//
// Two playbooks:
//   - activation: high-T activation peak, slow cool through the ordering
//     window, stabilize near the target temperature.
//   - reduction: long high-T dwell, fast cool to a quench point, short hold.
//
// Phase logic lives in pure handler functions selected by (recipe, phase);
// each handler maps the previous state and the fresh observation to an action
// and the successor state. Phases only ever advance.

use crate::config::{CookbookParams, RecipeMode};
use crate::types::{Action, Observation};

use super::Policy;

/// Recipe phase. Shared by both playbooks; the names follow the activation
/// recipe, the reduction recipe reads them as ramp / long dwell / fast cool /
/// short hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    RampToPeak = 0,
    PeakDwell = 1,
    Cool = 2,
    Stabilize = 3,
}

/// Mutable state threaded between calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseState {
    pub phase: Phase,
    /// Cumulative dwell minutes observed inside the ordering band.
    pub band_time: f64,
    /// Sharpness seen on the previous call, for trend detection.
    pub prev_sharpness: Option<f64>,
}

impl Default for PhaseState {
    fn default() -> Self {
        Self {
            phase: Phase::RampToPeak,
            band_time: 0.0,
            prev_sharpness: None,
        }
    }
}

impl PhaseState {
    /// Sharpness delta since the previous call; zero on the first call.
    fn trend(&self, obs: &Observation) -> f64 {
        match self.prev_sharpness {
            Some(prev) => obs.sharpness - prev,
            None => 0.0,
        }
    }

    fn advance(self, phase: Phase, obs: &Observation) -> Self {
        Self {
            phase,
            prev_sharpness: Some(obs.sharpness),
            ..self
        }
    }
}

type PhaseHandler = fn(&CookbookParams, &PhaseState, &Observation) -> (Action, PhaseState);

fn handler_for(mode: RecipeMode, phase: Phase) -> PhaseHandler {
    match (mode, phase) {
        (RecipeMode::Activation, Phase::RampToPeak) => act_ramp_to_peak,
        (RecipeMode::Activation, Phase::PeakDwell) => act_peak_dwell,
        (RecipeMode::Activation, Phase::Cool) => act_slow_cool,
        (RecipeMode::Activation, Phase::Stabilize) => act_stabilize,
        (RecipeMode::Reduction, Phase::RampToPeak) => red_ramp_to_high,
        (RecipeMode::Reduction, Phase::PeakDwell) => red_long_dwell,
        (RecipeMode::Reduction, Phase::Cool) => red_fast_cool,
        (RecipeMode::Reduction, Phase::Stabilize) => red_short_hold,
    }
}

// ----- Activation handlers -----

fn act_ramp_to_peak(
    p: &CookbookParams,
    state: &PhaseState,
    obs: &Observation,
) -> (Action, PhaseState) {
    let action = Action::new(
        p.act_peak_temp,
        p.act_peak_rate,
        (p.act_peak_dwell * 0.25).max(3.0),
    );
    (action, state.advance(Phase::PeakDwell, obs))
}

fn act_peak_dwell(
    p: &CookbookParams,
    state: &PhaseState,
    obs: &Observation,
) -> (Action, PhaseState) {
    let mut dwell = p.act_peak_dwell;
    // Still improving at the peak: worth one extension.
    if state.trend(obs) > p.trend_pos && obs.sharpness >= p.sharp_gate {
        dwell += p.dwell_extension;
    }
    let action = Action::new(p.act_peak_temp, p.act_peak_rate, dwell);
    (action, state.advance(Phase::Cool, obs))
}

fn act_slow_cool(
    p: &CookbookParams,
    state: &PhaseState,
    obs: &Observation,
) -> (Action, PhaseState) {
    let mut next = *state;
    // Band exposure is approximated by the dwell just completed there;
    // transit time while ramping through the band is not counted.
    if obs.t_curr >= p.act_band_lo && obs.t_curr <= p.act_band_hi {
        next.band_time += obs.dwell_elapsed.max(0.0);
    }
    let band_unmet = next.band_time < p.act_min_band_time;
    let still_hot = obs.t_curr > p.act_target_temp + 15.0;
    if band_unmet || still_hot {
        // Not enough ordering time yet: repeat a cooling step.
        let action = Action::new(
            p.act_target_temp,
            p.act_cool_rate,
            (p.act_target_dwell * 0.5).max(6.0),
        );
        next.prev_sharpness = Some(obs.sharpness);
        return (action, next);
    }
    let action = Action::new(p.act_target_temp, p.act_cool_rate, p.act_target_dwell);
    (action, next.advance(Phase::Stabilize, obs))
}

fn act_stabilize(
    p: &CookbookParams,
    state: &PhaseState,
    obs: &Observation,
) -> (Action, PhaseState) {
    let trend = state.trend(obs);
    let mut dwell = p.act_target_dwell;
    // Flat or worsening without reaching the gate: hold longer.
    if trend < p.trend_neg || (trend.abs() < 1e-3 && obs.sharpness < p.sharp_gate) {
        dwell += p.dwell_extension;
    }
    let action = Action::new(
        p.act_target_temp,
        (p.act_cool_rate - 1.0).max(5.0),
        dwell,
    );
    (action, state.advance(Phase::Stabilize, obs))
}

// ----- Reduction handlers -----

fn red_ramp_to_high(
    p: &CookbookParams,
    state: &PhaseState,
    obs: &Observation,
) -> (Action, PhaseState) {
    let action = Action::new(
        p.red_high_temp,
        p.red_high_rate,
        (p.red_high_dwell * 0.25).max(5.0),
    );
    (action, state.advance(Phase::PeakDwell, obs))
}

fn red_long_dwell(
    p: &CookbookParams,
    state: &PhaseState,
    obs: &Observation,
) -> (Action, PhaseState) {
    let mut dwell = p.red_high_dwell;
    if state.trend(obs) > p.trend_pos {
        dwell += p.dwell_extension.min(5.0);
    }
    let action = Action::new(p.red_high_temp, p.red_high_rate, dwell);
    (action, state.advance(Phase::Cool, obs))
}

fn red_fast_cool(
    p: &CookbookParams,
    state: &PhaseState,
    obs: &Observation,
) -> (Action, PhaseState) {
    let action = Action::new(p.red_quench_temp, p.red_cool_rate, p.red_quench_dwell);
    (action, state.advance(Phase::Stabilize, obs))
}

fn red_short_hold(
    p: &CookbookParams,
    state: &PhaseState,
    obs: &Observation,
) -> (Action, PhaseState) {
    let action = Action::new(p.red_quench_temp, p.red_cool_rate, p.red_quench_dwell);
    (action, state.advance(Phase::Stabilize, obs))
}

/// Stateful policy wrapper around the phase handlers.
#[derive(Debug)]
pub struct CookbookPolicy {
    mode: RecipeMode,
    params: CookbookParams,
    state: PhaseState,
}

impl CookbookPolicy {
    pub fn new(mode: RecipeMode, params: CookbookParams) -> Self {
        Self {
            mode,
            params,
            state: PhaseState::default(),
        }
    }

    pub fn mode(&self) -> RecipeMode {
        self.mode
    }

    /// Current phase, for inspection and tests.
    pub fn phase(&self) -> Phase {
        self.state.phase
    }
}

impl Policy for CookbookPolicy {
    fn predict(&mut self, obs: &Observation) -> Action {
        let handler = handler_for(self.mode, self.state.phase);
        let (action, next) = handler(&self.params, &self.state, obs);
        debug_assert!(next.phase >= self.state.phase);
        self.state = next;
        action
    }

    fn reset_episode(&mut self) {
        self.state = PhaseState::default();
    }
}
