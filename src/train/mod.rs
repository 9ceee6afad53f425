// src/train/mod.rs
//
// Offline training: transition loading, small dense networks, and the
// implicit Q-learning loop that turns rollout logs into a learned policy.

pub mod dataset;
pub mod iql;
pub mod nn;

pub use dataset::{Transition, TransitionDataset};
pub use iql::{train_from_logs, train_iql, Iql, IqlConfig, Losses};
