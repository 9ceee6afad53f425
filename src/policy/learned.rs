// src/policy/learned.rs
//
// Policy wrapping an offline-trained actor network.

use crate::config::ActionBounds;
use crate::train::nn::Mlp;
use crate::types::{Action, Observation};

use super::Policy;

/// Deterministic mean-action inference over a fitted actor.
///
/// Flattens the observation into the fixed feature order, evaluates the
/// actor's mean head, and optionally re-applies the envelope clamp as
/// defense in depth (the shield clamps again downstream).
#[derive(Debug)]
pub struct LearnedPolicy {
    actor: Mlp,
    clamp: Option<ActionBounds>,
}

impl LearnedPolicy {
    pub fn new(actor: Mlp, clamp: Option<ActionBounds>) -> Self {
        Self { actor, clamp }
    }

    /// Width of the feature vector the actor was trained on.
    pub fn in_dim(&self) -> usize {
        self.actor.in_dim()
    }
}

impl Policy for LearnedPolicy {
    fn predict(&mut self, obs: &Observation) -> Action {
        let features = obs.feature_vec();
        let mean = self.actor.forward(&features);
        let mut action = Action::from_vec(&mean);
        if let Some(bounds) = &self.clamp {
            action = bounds.clamp(&action);
        }
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ACTION_DIM;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn obs() -> Observation {
        Observation {
            recon_probs: vec![0.25; 4],
            sharpness: 0.1,
            spacing_ratio: 1.0,
            embedding: None,
            t_curr: 500.0,
            r_curr: 10.0,
            dwell_elapsed: 5.0,
            time_since_start: 40.0,
            t_peak: 900.0,
            time_since_peak: 10.0,
            time_above_threshold: 8.0,
            direction_changes: 1,
            last_action: None,
        }
    }

    #[test]
    fn clamped_output_stays_in_envelope() {
        let o = obs();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let actor = Mlp::new(&[o.feature_vec().len(), 16, ACTION_DIM], &mut rng);
        let bounds = ActionBounds::default();
        let mut policy = LearnedPolicy::new(actor, Some(bounds));
        let a = policy.predict(&o);
        assert!(a.t_set >= bounds.t_min && a.t_set <= bounds.t_max);
        assert!(a.r_cmd >= bounds.r_min && a.r_cmd <= bounds.r_max);
        assert!(a.dwell_min >= bounds.dwell_min && a.dwell_min <= bounds.dwell_max);
    }

    #[test]
    fn unclamped_output_is_raw_network_mean() {
        let o = obs();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let actor = Mlp::new(&[o.feature_vec().len(), 16, ACTION_DIM], &mut rng);
        let raw = actor.forward(&o.feature_vec());
        let mut policy = LearnedPolicy::new(actor, None);
        let a = policy.predict(&o);
        assert_eq!(a.to_vec().to_vec(), raw);
    }
}
