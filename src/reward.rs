// src/reward.rs
//
// Reward scoring for logged transitions.
//
// Pure functions only: the environment returns a reward placeholder and the
// orchestrator applies these after each macro-step, so the same scoring runs
// identically over simulated and replayed trajectories.

use crate::config::{RewardConfig, TerminalBonusConfig};
use crate::types::{Action, Observation};

/// Composite order proxy: weighted sharpness plus the spacing-ratio term
/// capped at 1.0.
pub fn order_score(cfg: &RewardConfig, obs: &Observation) -> f64 {
    cfg.w_sharpness * obs.sharpness + cfg.w_spacing * obs.spacing_ratio.min(1.0)
}

/// Goal-class probability gated on sharpness.
///
/// Returns `(gated probability, gate weight)`. The gate weight is 1 when
/// sharpness meets the threshold and 0 otherwise, so a confident class signal
/// on a blurry pattern contributes nothing.
pub fn gated_goal_prob(cfg: &RewardConfig, obs: &Observation) -> (f64, f64) {
    let p = obs
        .recon_probs
        .get(cfg.target_index)
        .copied()
        .unwrap_or(0.0);
    let w = if obs.sharpness >= cfg.sharp_threshold {
        1.0
    } else {
        0.0
    };
    (w * p, w)
}

/// Per-step reward for executing `action` between `before` and `after`.
///
/// Order-score improvement plus the gated goal probability, minus linear
/// costs on dwell time, commanded temperature change, and ramp rate.
pub fn step_reward(
    cfg: &RewardConfig,
    before: &Observation,
    after: &Observation,
    action: &Action,
) -> f64 {
    let dq = order_score(cfg, after) - order_score(cfg, before);
    let (p_goal, _) = gated_goal_prob(cfg, after);
    let delta_t = (action.t_set - before.t_curr).abs();

    cfg.alpha * dq + cfg.beta * p_goal
        - cfg.lambda_dwell * action.dwell_min
        - cfg.lambda_delta_t * delta_t
        - cfg.lambda_rate * action.r_cmd
}

/// Windowed terminal-success bonus.
///
/// Examines the trailing `cfg.window` observations and grants the bonus only
/// when both the mean gated goal probability and the mean gate weight meet
/// their thresholds, i.e. sustained trustworthy success rather than a single
/// favorable frame. Returns `(0.0, false)` when the history is shorter than
/// the window.
pub fn terminal_bonus(
    cfg: &TerminalBonusConfig,
    reward_cfg: &RewardConfig,
    history: &[Observation],
) -> (f64, bool) {
    if cfg.window == 0 || history.len() < cfg.window {
        return (0.0, false);
    }
    let tail = &history[history.len() - cfg.window..];
    let mut p_sum = 0.0;
    let mut w_sum = 0.0;
    for obs in tail {
        let (p, w) = gated_goal_prob(reward_cfg, obs);
        p_sum += p;
        w_sum += w;
    }
    let k = cfg.window as f64;
    if p_sum / k >= cfg.prob_threshold && w_sum / k >= cfg.gate_threshold {
        (cfg.bonus, true)
    } else {
        (0.0, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(goal_prob: f64, sharpness: f64) -> Observation {
        let rest = (1.0 - goal_prob) / 3.0;
        Observation {
            recon_probs: vec![rest, rest, goal_prob, rest],
            sharpness,
            spacing_ratio: 1.0,
            embedding: None,
            t_curr: 440.0,
            r_curr: 7.0,
            dwell_elapsed: 10.0,
            time_since_start: 50.0,
            t_peak: 980.0,
            time_since_peak: 20.0,
            time_above_threshold: 15.0,
            direction_changes: 1,
            last_action: None,
        }
    }

    #[test]
    fn order_score_caps_spacing_term() {
        let cfg = RewardConfig::default();
        let mut o = obs(0.5, 0.4);
        o.spacing_ratio = 3.0;
        assert!((order_score(&cfg, &o) - (0.5 * 0.4 + 0.5 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn gate_zeroes_blurry_signal() {
        let cfg = RewardConfig::default();
        let (p, w) = gated_goal_prob(&cfg, &obs(0.9, 0.1));
        assert_eq!((p, w), (0.0, 0.0));

        let (p, w) = gated_goal_prob(&cfg, &obs(0.9, 0.3));
        assert!((p - 0.9).abs() < 1e-12);
        assert_eq!(w, 1.0);
    }

    #[test]
    fn gate_handles_out_of_range_target_index() {
        let cfg = RewardConfig {
            target_index: 10,
            ..RewardConfig::default()
        };
        let (p, w) = gated_goal_prob(&cfg, &obs(0.9, 0.9));
        assert_eq!(p, 0.0);
        assert_eq!(w, 1.0);
    }

    #[test]
    fn step_reward_charges_linear_costs() {
        let cfg = RewardConfig::default();
        let before = obs(0.0, 0.0);
        let after = obs(0.0, 0.0);
        // No order change, gated term zero: reward is pure cost.
        let action = Action::new(640.0, 10.0, 10.0);
        let r = step_reward(&cfg, &before, &after, &action);
        let expected = -(0.02 * 10.0) - (0.002 * 200.0) - (0.02 * 10.0);
        assert!((r - expected).abs() < 1e-12);
    }

    #[test]
    fn step_reward_rewards_order_improvement() {
        let cfg = RewardConfig::default();
        let before = obs(0.0, 0.1);
        let after = obs(0.0, 0.5);
        let action = Action::new(440.0, 2.0, 2.0);
        let improved = step_reward(&cfg, &before, &after, &action);
        let flat = step_reward(&cfg, &before, &before, &action);
        assert!(improved > flat);
        assert!((improved - flat - 0.5 * (0.5 * 0.4)).abs() < 1e-12);
    }

    #[test]
    fn terminal_bonus_short_history_returns_zero() {
        let cfg = TerminalBonusConfig::default();
        let rcfg = RewardConfig::default();
        let history = vec![obs(0.9, 0.9), obs(0.9, 0.9)];
        assert_eq!(terminal_bonus(&cfg, &rcfg, &history), (0.0, false));
    }

    #[test]
    fn terminal_bonus_requires_sustained_gated_success() {
        let cfg = TerminalBonusConfig::default();
        let rcfg = RewardConfig::default();

        // Three trailing frames, all sharp and confident.
        let good = vec![obs(0.9, 0.9); 3];
        assert_eq!(terminal_bonus(&cfg, &rcfg, &good), (2.0, true));

        // One blurry frame drops both means below threshold.
        let mixed = vec![obs(0.9, 0.9), obs(0.9, 0.05), obs(0.9, 0.9)];
        assert_eq!(terminal_bonus(&cfg, &rcfg, &mixed), (0.0, false));

        // Sharp but unconfident: gate passes, probability mean fails.
        let unconfident = vec![obs(0.3, 0.9); 3];
        assert_eq!(terminal_bonus(&cfg, &rcfg, &unconfident), (0.0, false));
    }

    #[test]
    fn terminal_bonus_only_examines_trailing_window() {
        let cfg = TerminalBonusConfig::default();
        let rcfg = RewardConfig::default();
        // Early junk must not matter once the last K frames qualify.
        let mut history = vec![obs(0.0, 0.0); 5];
        history.extend(vec![obs(0.9, 0.9); 3]);
        assert_eq!(terminal_bonus(&cfg, &rcfg, &history), (2.0, true));
    }
}
