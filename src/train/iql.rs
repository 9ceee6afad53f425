// src/train/iql.rs
//
// Offline implicit Q-learning over logged transitions.
//
// Three approximators: twin Q networks (bootstrap targets always use their
// minimum), one V network fit by expectile regression, and a Gaussian
// policy (mean network plus a global log-std) fit by advantage-weighted
// regression toward the dataset's own actions. No environment interaction
// happens here.

use std::path::PathBuf;

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::ActionBounds;
use crate::policy::LearnedPolicy;
use crate::types::ACTION_DIM;

use super::dataset::TransitionDataset;
use super::nn::{Adam, Mlp};

/// Trainer hyperparameters.
#[derive(Debug, Clone, PartialEq)]
pub struct IqlConfig {
    /// Discount factor for the one-step bootstrap.
    pub gamma: f64,
    /// Expectile parameter; upweights positive residuals.
    pub tau: f64,
    /// Advantage temperature for the policy weights.
    pub beta: f64,
    pub lr: f64,
    /// Hidden width of every network (two hidden layers each).
    pub hidden: usize,
    /// Total gradient updates.
    pub steps: usize,
    pub batch_size: usize,
    /// Emit loss metrics every this many updates.
    pub log_every: usize,
    pub seed: u64,
}

impl Default for IqlConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            tau: 0.7,
            beta: 3.0,
            lr: 1e-3,
            hidden: 64,
            steps: 2_000,
            batch_size: 256,
            log_every: 500,
            seed: 0,
        }
    }
}

/// Loss values from one update, reported periodically during training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Losses {
    pub v: f64,
    pub q: f64,
    pub pi: f64,
}

/// One expectile-regression step of `net` toward scalar `targets`.
///
/// Residuals `target - prediction` are weighted by `tau` when positive and
/// `1 - tau` when negative; for split targets the minimizer sits at the
/// tau-expectile rather than the mean. Returns the batch loss.
fn expectile_update(
    net: &mut Mlp,
    opt: &mut Adam,
    xs: &[&[f64]],
    targets: &[f64],
    tau: f64,
) -> f64 {
    let b = xs.len() as f64;
    let mut grads = vec![0.0; net.param_count()];
    let mut loss = 0.0;
    for (x, &target) in xs.iter().zip(targets) {
        let (y, cache) = net.forward_cached(x);
        let resid = target - y[0];
        let w = if resid >= 0.0 { tau } else { 1.0 - tau };
        loss += w * resid * resid / b;
        let d_out = [-2.0 * w * resid / b];
        net.backward(&cache, &d_out, &mut grads);
    }
    let mut update = vec![0.0; grads.len()];
    opt.step(&grads, &mut update);
    net.apply_update(&update);
    loss
}

/// One mean-squared-error step of a scalar-headed `net` toward `targets`.
fn mse_update(net: &mut Mlp, opt: &mut Adam, xs: &[Vec<f64>], targets: &[f64]) -> f64 {
    let b = xs.len() as f64;
    let mut grads = vec![0.0; net.param_count()];
    let mut loss = 0.0;
    for (x, &target) in xs.iter().zip(targets) {
        let (y, cache) = net.forward_cached(x);
        let diff = y[0] - target;
        loss += diff * diff / b;
        let d_out = [2.0 * diff / b];
        net.backward(&cache, &d_out, &mut grads);
    }
    let mut update = vec![0.0; grads.len()];
    opt.step(&grads, &mut update);
    net.apply_update(&update);
    loss
}

/// Twin-Q / V / Gaussian-policy trainer state.
pub struct Iql {
    cfg: IqlConfig,
    q1: Mlp,
    q2: Mlp,
    v: Mlp,
    pi_mu: Mlp,
    /// Global per-dimension spread of the policy; receives no gradient, so
    /// inference always uses the mean head.
    log_std: [f64; ACTION_DIM],
    opt_q1: Adam,
    opt_q2: Adam,
    opt_v: Adam,
    opt_pi: Adam,
}

impl Iql {
    pub fn new(obs_dim: usize, cfg: &IqlConfig, rng: &mut ChaCha8Rng) -> Self {
        let h = cfg.hidden;
        let q1 = Mlp::new(&[obs_dim + ACTION_DIM, h, h, 1], rng);
        let q2 = Mlp::new(&[obs_dim + ACTION_DIM, h, h, 1], rng);
        let v = Mlp::new(&[obs_dim, h, h, 1], rng);
        let pi_mu = Mlp::new(&[obs_dim, h, h, ACTION_DIM], rng);
        Self {
            opt_q1: Adam::new(q1.param_count(), cfg.lr),
            opt_q2: Adam::new(q2.param_count(), cfg.lr),
            opt_v: Adam::new(v.param_count(), cfg.lr),
            opt_pi: Adam::new(pi_mu.param_count(), cfg.lr),
            cfg: cfg.clone(),
            q1,
            q2,
            v,
            pi_mu,
            log_std: [0.0; ACTION_DIM],
        }
    }

    fn q_min(&self, x: &[f64]) -> f64 {
        self.q1.forward(x)[0].min(self.q2.forward(x)[0])
    }

    /// One gradient update over the minibatch `idx` indexes into `ds`.
    ///
    /// Order matters: V is fit first against the current twin-Q minimum, the
    /// Q targets then bootstrap through the freshly updated V, and the
    /// policy weights use the post-update critics.
    pub fn update_batch(&mut self, ds: &TransitionDataset, idx: &[usize]) -> Losses {
        let b = idx.len() as f64;

        // V update: expectile regression toward min(Q1, Q2) at the dataset's
        // own actions.
        let mut qx: Vec<Vec<f64>> = Vec::with_capacity(idx.len());
        let mut v_targets = Vec::with_capacity(idx.len());
        let mut obs_refs: Vec<&[f64]> = Vec::with_capacity(idx.len());
        for &i in idx {
            let t = ds.get(i);
            let mut x = t.obs.clone();
            x.extend_from_slice(&t.action);
            v_targets.push(self.q_min(&x));
            obs_refs.push(&t.obs);
            qx.push(x);
        }
        let v_loss = expectile_update(&mut self.v, &mut self.opt_v, &obs_refs, &v_targets, self.cfg.tau);

        // Q update: one-step TD toward r + gamma * (1 - done) * V(o').
        let mut q_targets = Vec::with_capacity(idx.len());
        for &i in idx {
            let t = ds.get(i);
            let mask = if t.done { 0.0 } else { 1.0 };
            q_targets.push(t.reward + self.cfg.gamma * mask * self.v.forward(&t.next_obs)[0]);
        }
        let q_loss = mse_update(&mut self.q1, &mut self.opt_q1, &qx, &q_targets)
            + mse_update(&mut self.q2, &mut self.opt_q2, &qx, &q_targets);

        // Policy update: advantage-weighted regression to dataset actions.
        let mut grads = vec![0.0; self.pi_mu.param_count()];
        let mut pi_loss = 0.0;
        let denom = b * ACTION_DIM as f64;
        for (slot, &i) in idx.iter().enumerate() {
            let t = ds.get(i);
            let adv = self.q_min(&qx[slot]) - self.v.forward(&t.obs)[0];
            let w = (adv / self.cfg.beta).min(20.0).exp().clamp(0.0, 100.0);
            let (mu, cache) = self.pi_mu.forward_cached(&t.obs);
            let mut d_mu = [0.0; ACTION_DIM];
            for j in 0..ACTION_DIM {
                let diff = mu[j] - t.action[j];
                pi_loss += w * diff * diff / denom;
                d_mu[j] = 2.0 * w * diff / denom;
            }
            self.pi_mu.backward(&cache, &d_mu, &mut grads);
        }
        let mut update = vec![0.0; grads.len()];
        self.opt_pi.step(&grads, &mut update);
        self.pi_mu.apply_update(&update);

        Losses {
            v: v_loss,
            q: q_loss,
            pi: pi_loss,
        }
    }

    /// Deterministic mean action for a flattened observation.
    pub fn mean_action(&self, obs: &[f64]) -> Vec<f64> {
        self.pi_mu.forward(obs)
    }

    /// Stochastic action: mean plus the global spread times unit noise.
    pub fn sample_action(&self, obs: &[f64], rng: &mut ChaCha8Rng) -> Vec<f64> {
        let mut a = self.pi_mu.forward(obs);
        for (aj, ls) in a.iter_mut().zip(&self.log_std) {
            let std = ls.exp().clamp(1e-3, 10.0);
            *aj += std * gaussian(rng);
        }
        a
    }

    /// Hand the fitted mean head to a rollout-ready policy.
    pub fn into_policy(self, clamp: Option<ActionBounds>) -> LearnedPolicy {
        LearnedPolicy::new(self.pi_mu, clamp)
    }
}

/// Standard normal draw via Box-Muller.
fn gaussian(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

/// Run the full training loop: shuffled full-size minibatches until the
/// update ceiling, metrics printed every `log_every` updates.
pub fn train_iql(ds: &TransitionDataset, cfg: &IqlConfig) -> Iql {
    let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);
    let mut iql = Iql::new(ds.obs_dim(), cfg, &mut rng);
    let batch = cfg.batch_size.clamp(1, ds.len());
    let mut indices: Vec<usize> = (0..ds.len()).collect();
    let mut it = 0usize;
    'training: loop {
        indices.shuffle(&mut rng);
        for chunk in indices.chunks(batch) {
            if chunk.len() < batch {
                continue;
            }
            let losses = iql.update_batch(ds, chunk);
            it += 1;
            if cfg.log_every > 0 && it % cfg.log_every == 0 {
                println!(
                    "[{it}/{}] v={:.3} q={:.3} pi={:.3}",
                    cfg.steps, losses.v, losses.q, losses.pi
                );
            }
            if it >= cfg.steps {
                break 'training;
            }
        }
    }
    iql
}

/// Load logs and train in one call.
pub fn train_from_logs(paths: &[PathBuf], cfg: &IqlConfig) -> Result<Iql> {
    let ds = TransitionDataset::from_paths(paths)?;
    Ok(train_iql(&ds, cfg))
}
