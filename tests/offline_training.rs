// tests/offline_training.rs
//
// Full pipeline: roll episodes into JSONL logs, load them as transitions,
// train the offline learner, and drive the twin with the learned policy.

use std::path::PathBuf;

use anneal_rl::{
    build_policy, ActionBounds, AnnealEnv, EpisodeRunner, IqlConfig, JsonlSink, Policy,
    PolicyKind, RandomPolicy, TransitionDataset, TwinEnv,
};

fn fixed_clock() -> f64 {
    1_700_000_000.0
}

fn small_cfg() -> IqlConfig {
    IqlConfig {
        hidden: 8,
        steps: 60,
        batch_size: 8,
        log_every: 0,
        ..IqlConfig::default()
    }
}

fn collect_logs(dir: &std::path::Path) -> Vec<PathBuf> {
    let env = TwinEnv::with_seed(42);
    let policy = Box::new(RandomPolicy::new(ActionBounds::default(), 0));
    let sink = JsonlSink::new(dir).expect("log dir");
    let mut runner = EpisodeRunner::new(env, policy, sink).with_clock(fixed_clock);
    let summaries = runner.run_episodes("ordered", 3, 10);
    let sink = runner.finish();
    summaries.iter().map(|s| sink.path_for(&s.run_id)).collect()
}

#[test]
fn logs_round_trip_into_a_training_set() {
    let dir = tempfile::tempdir().unwrap();
    let paths = collect_logs(dir.path());
    let ds = TransitionDataset::from_paths(&paths).expect("dataset");
    assert!(ds.len() >= 10);
    // Width must match the live flattening, or training and inference
    // would disagree.
    let probe = TwinEnv::with_seed(1).reset("ordered");
    assert_eq!(ds.obs_dim(), probe.feature_vec().len());
}

#[test]
fn learned_policy_trains_from_logs_and_controls_the_twin() {
    let dir = tempfile::tempdir().unwrap();
    let paths = collect_logs(dir.path());

    let mut policy =
        build_policy(&PolicyKind::Learned, &paths, &small_cfg()).expect("trained policy");

    // The learned controller must keep proposals inside the envelope and
    // drive the twin without producing degenerate state.
    let mut env = TwinEnv::with_seed(7);
    let bounds = ActionBounds::default();
    let mut obs = env.reset("ordered");
    for _ in 0..6 {
        let action = policy.predict(&obs);
        assert!(action.t_set >= bounds.t_min && action.t_set <= bounds.t_max);
        assert!(action.r_cmd >= bounds.r_min && action.r_cmd <= bounds.r_max);
        assert!(action.dwell_min >= bounds.dwell_min && action.dwell_min <= bounds.dwell_max);

        let result = env.step(&action);
        let sum: f64 = result.observation.recon_probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(result.observation.sharpness.is_finite());
        obs = result.observation;
        if result.done {
            break;
        }
    }
}

#[test]
fn learned_policy_without_logs_is_rejected() {
    let err = build_policy(&PolicyKind::Learned, &[], &small_cfg()).unwrap_err();
    assert!(err.to_string().contains("logs"));
}
