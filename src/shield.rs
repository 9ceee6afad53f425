// src/shield.rs
//
// Deterministic safety layer between policy proposals and the environment.
//
// Clamp events are corrective, not errors: they are reported through the
// `was_clamped` flag and logged via StepInfo, never raised.

use crate::config::ShieldConfig;
use crate::types::{Action, Observation};

/// Stateless safety clamp from a proposed action and the current observation
/// to a bounded, jump-limited action.
#[derive(Debug, Clone, Default)]
pub struct ActionShield {
    cfg: ShieldConfig,
}

impl ActionShield {
    pub fn new(cfg: ShieldConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.cfg
    }

    /// Clamp `action` against `obs`. Returns the clamped copy and whether
    /// any field was altered.
    ///
    /// Two ordered stages:
    /// 1. Limit |T_set - T_curr| to the configured maximum jump, preserving
    ///    the sign of the requested change.
    /// 2. Clamp each field independently into its [min, max] envelope.
    ///
    /// The flag compares the final result against the proposal, not the
    /// intermediate stages: when the current temperature sits outside the
    /// envelope (the cold start does), stage 1 fires on every call and
    /// stage 2 pushes back to the boundary, so per-stage tracking would
    /// report a clamp even when the value came through unchanged.
    ///
    /// Idempotent: reapplying to its own output against the same observation
    /// returns it unchanged with `was_clamped = false`.
    pub fn clamp(&self, action: &Action, obs: &Observation) -> (Action, bool) {
        let mut out = *action;

        let delta = out.t_set - obs.t_curr;
        if delta.abs() > self.cfg.max_jump {
            out.t_set = obs.t_curr + self.cfg.max_jump * delta.signum();
        }

        let bounded = self.cfg.bounds.clamp(&out);
        let clamped = bounded != *action;

        (bounded, clamped)
    }
}
