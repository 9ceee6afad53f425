// src/policy/mod.rs
//
// Policy capability contract and the simple controller variants.
//
// Policies map Observations to proposed Actions; the shield clamps every
// proposal before execution. Concrete variants are selected by configuration
// via `build_policy`, which fails fast on impossible requests.

pub mod cookbook;
pub mod learned;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::{ActionBounds, CookbookParams, PolicyKind, StaircaseConfig};
use crate::types::{Action, Observation};

pub use cookbook::{CookbookPolicy, Phase, PhaseState};
pub use learned::LearnedPolicy;

/// Capability contract for controllers.
pub trait Policy: std::fmt::Debug {
    /// Propose a macro-action for the current observation.
    ///
    /// Stateful variants (staircase, cookbook) advance their internal state
    /// by at most one step per call.
    fn predict(&mut self, obs: &Observation) -> Action;

    /// Reset internal state at the start of a new episode.
    fn reset_episode(&mut self) {}
}

/// Uniform-random controller over the action envelope.
///
/// Each field is sampled independently from its configured range using a
/// seeded generator, so rollouts are reproducible given the seed.
#[derive(Debug)]
pub struct RandomPolicy {
    bounds: ActionBounds,
    rng: ChaCha8Rng,
}

impl RandomPolicy {
    pub fn new(bounds: ActionBounds, seed: u64) -> Self {
        Self {
            bounds,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn predict(&mut self, _obs: &Observation) -> Action {
        let b = &self.bounds;
        Action {
            t_set: self.rng.gen_range(b.t_min..b.t_max),
            r_cmd: self.rng.gen_range(b.r_min..b.r_max),
            dwell_min: self.rng.gen_range(b.dwell_min..b.dwell_max),
        }
    }
}

/// Fixed-schedule controller.
///
/// Emits its ordered action list one entry per call; the final entry repeats
/// once the schedule is exhausted.
#[derive(Debug)]
pub struct StaircasePolicy {
    steps: Vec<Action>,
    index: usize,
}

impl StaircasePolicy {
    /// Fails fast on an empty schedule.
    pub fn new(cfg: StaircaseConfig) -> Result<Self> {
        if cfg.steps.is_empty() {
            bail!("staircase policy requires at least one scheduled action");
        }
        Ok(Self {
            steps: cfg.steps,
            index: 0,
        })
    }
}

impl Policy for StaircasePolicy {
    fn predict(&mut self, _obs: &Observation) -> Action {
        let action = self.steps[self.index];
        self.index = (self.index + 1).min(self.steps.len() - 1);
        action
    }

    fn reset_episode(&mut self) {
        self.index = 0;
    }
}

/// Construct the configured policy, failing fast before any episode runs.
///
/// The learned policy requires prior rollout logs; requesting it with an
/// empty log set is a configuration error. Training happens here, up front,
/// so the rollout loop only ever sees a ready `Policy`.
pub fn build_policy(
    kind: &PolicyKind,
    log_paths: &[PathBuf],
    train_cfg: &crate::train::IqlConfig,
) -> Result<Box<dyn Policy>> {
    match kind {
        PolicyKind::Random { seed } => {
            Ok(Box::new(RandomPolicy::new(ActionBounds::default(), *seed)))
        }
        PolicyKind::Staircase => Ok(Box::new(StaircasePolicy::new(StaircaseConfig::default())?)),
        PolicyKind::Cookbook(mode) => {
            Ok(Box::new(CookbookPolicy::new(*mode, CookbookParams::default())))
        }
        PolicyKind::Learned => {
            if log_paths.is_empty() {
                bail!("learned policy requires prior rollout logs; none were provided");
            }
            let model = crate::train::train_from_logs(log_paths, train_cfg)
                .context("offline training failed")?;
            Ok(Box::new(model.into_policy(Some(ActionBounds::default()))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecipeMode;

    fn obs() -> Observation {
        Observation {
            recon_probs: vec![0.25; 4],
            sharpness: 0.1,
            spacing_ratio: 1.0,
            embedding: None,
            t_curr: 25.0,
            r_curr: 0.0,
            dwell_elapsed: 0.0,
            time_since_start: 0.0,
            t_peak: 25.0,
            time_since_peak: 0.0,
            time_above_threshold: 0.0,
            direction_changes: 0,
            last_action: None,
        }
    }

    #[test]
    fn random_policy_is_reproducible_and_in_bounds() {
        let bounds = ActionBounds::default();
        let mut p1 = RandomPolicy::new(bounds, 9);
        let mut p2 = RandomPolicy::new(bounds, 9);
        let o = obs();
        for _ in 0..16 {
            let a1 = p1.predict(&o);
            let a2 = p2.predict(&o);
            assert_eq!(a1, a2);
            assert!(a1.t_set >= bounds.t_min && a1.t_set < bounds.t_max);
            assert!(a1.r_cmd >= bounds.r_min && a1.r_cmd < bounds.r_max);
            assert!(a1.dwell_min >= bounds.dwell_min && a1.dwell_min < bounds.dwell_max);
        }
    }

    #[test]
    fn random_policies_with_different_seeds_diverge() {
        let bounds = ActionBounds::default();
        let mut p1 = RandomPolicy::new(bounds, 1);
        let mut p2 = RandomPolicy::new(bounds, 2);
        let o = obs();
        assert_ne!(p1.predict(&o), p2.predict(&o));
    }

    #[test]
    fn staircase_repeats_final_entry() {
        let mut p = StaircasePolicy::new(StaircaseConfig::default()).unwrap();
        let o = obs();
        let a1 = p.predict(&o);
        let a2 = p.predict(&o);
        let a3 = p.predict(&o);
        let a4 = p.predict(&o);
        assert_eq!(a1, Action::new(1000.0, 15.0, 15.0));
        assert_ne!(a1, a2);
        assert_eq!(a3, Action::new(444.0, 5.0, 10.0));
        assert_eq!(a3, a4);
    }

    #[test]
    fn staircase_reset_restarts_schedule() {
        let mut p = StaircasePolicy::new(StaircaseConfig::default()).unwrap();
        let o = obs();
        let first = p.predict(&o);
        p.predict(&o);
        p.reset_episode();
        assert_eq!(p.predict(&o), first);
    }

    #[test]
    fn staircase_rejects_empty_schedule() {
        assert!(StaircasePolicy::new(StaircaseConfig { steps: vec![] }).is_err());
    }

    #[test]
    fn build_policy_fails_fast_for_learned_without_logs() {
        let err = build_policy(
            &PolicyKind::Learned,
            &[],
            &crate::train::IqlConfig::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("logs"));
    }

    #[test]
    fn build_policy_constructs_heuristics() {
        let cfg = crate::train::IqlConfig::default();
        assert!(build_policy(&PolicyKind::Random { seed: 0 }, &[], &cfg).is_ok());
        assert!(build_policy(&PolicyKind::Staircase, &[], &cfg).is_ok());
        assert!(build_policy(&PolicyKind::Cookbook(RecipeMode::Activation), &[], &cfg).is_ok());
    }
}
