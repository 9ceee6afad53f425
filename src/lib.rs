//! Anneal control core library.
//!
//! Closed-loop control for surface-reconstruction annealing: a digital-twin
//! furnace environment, a safety shield, a family of controllers, offline
//! reward scoring, append-only step logging, and an implicit Q-learning
//! trainer that turns those logs into a learned controller.
//!
//! # Architecture
//!
//! The loop is policy -> shield -> environment -> scorer -> logger:
//!
//! - **Types** (`types`): Observation / Action / StepInfo value types and the
//!   fixed feature-flattening order shared by logging and training.
//!
//! - **Environment** (`env`): The [`env::AnnealEnv`] capability contract and
//!   the [`env::TwinEnv`] digital twin. A hardware-driving environment plugs
//!   in behind the same trait.
//!
//! - **Shield** (`shield`): Deterministic two-stage action clamp. Clamp
//!   events are recorded, never raised.
//!
//! - **Policies** (`policy`): Random, staircase, cookbook recipe state
//!   machine, and a learned mean-action policy, all behind
//!   [`policy::Policy`].
//!
//! - **Reward** (`reward`): Pure step scoring plus the windowed terminal
//!   bonus, applied by the orchestrator so simulated and replayed
//!   trajectories score identically.
//!
//! - **Perception** (`perceive`): The feature-extraction boundary. An
//!   external collaborator supplies the diffraction-derived signal for a
//!   source image; the core never performs image analysis.
//!
//! - **Rollout** (`rollout`): Episode orchestration and summaries.
//!
//! - **Logging** (`logging`): Append-only JSONL step records, the sole
//!   contract between rollout and training.
//!
//! - **Training** (`train`): Transition loading and the IQL loop (twin Q
//!   networks, expectile-fit V, advantage-weighted Gaussian policy).

pub mod config;
pub mod env;
pub mod logging;
pub mod perceive;
pub mod policy;
pub mod reward;
pub mod rollout;
pub mod shield;
pub mod train;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use config::{
    ActionBounds, CookbookParams, PolicyKind, RecipeMode, RewardConfig, ShieldConfig,
    StaircaseConfig, TerminalBonusConfig, TwinConfig,
};

pub use types::{Action, Observation, StepInfo, ACTION_DIM, OBS_VERSION};

pub use env::{AnnealEnv, StepResult, TwinEnv};

pub use perceive::{FeatureExtractor, Features};

pub use shield::ActionShield;

pub use reward::{gated_goal_prob, order_score, step_reward, terminal_bonus};

pub use policy::{
    build_policy, CookbookPolicy, LearnedPolicy, Phase, PhaseState, Policy, RandomPolicy,
    StaircasePolicy,
};

pub use logging::{JsonlSink, NoopSink, StepRecord, StepSink};

pub use rollout::{EpisodeRunner, EpisodeSummary};

pub use train::{train_from_logs, train_iql, Iql, IqlConfig, Transition, TransitionDataset};
