// src/perceive.rs
//
// Feature-extraction boundary.
//
// An external collaborator turns a source diffraction image into the
// numeric signal the control loop runs on; the core never performs image
// analysis. A hardware-driving environment calls the extractor per step and
// records the image path in `StepInfo::source_path`; the twin synthesizes
// the same fields itself and needs no extractor.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::types::{normalize_probs, Observation};

/// Diffraction-derived signal for one source image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Probability distribution over reconstruction classes.
    pub recon_probs: Vec<f64>,
    /// Pattern clarity proxy in [0, 1].
    pub sharpness: f64,
    /// Periodicity spacing relative to a reference.
    pub spacing_ratio: f64,
    /// Optional fixed-length embedding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
}

impl Features {
    /// Install this signal into an observation, renormalizing the class
    /// probabilities. Telemetry and summary fields are untouched; those
    /// belong to the environment.
    pub fn apply_to(&self, obs: &mut Observation) {
        obs.recon_probs = self.recon_probs.clone();
        normalize_probs(&mut obs.recon_probs);
        obs.sharpness = self.sharpness;
        obs.spacing_ratio = self.spacing_ratio;
        obs.embedding = self.embedding.clone();
    }
}

/// Capability contract for feature extraction.
///
/// Implementations wrap whatever perception model is in use; like the other
/// contracts here, concrete extractors are chosen by configuration.
pub trait FeatureExtractor {
    fn features(&self, source_path: &Path) -> Result<Features>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::path::PathBuf;

    /// Canned extractor standing in for a perception model.
    struct FixedExtractor {
        features: Features,
    }

    impl FeatureExtractor for FixedExtractor {
        fn features(&self, source_path: &Path) -> Result<Features> {
            if source_path.extension().is_none() {
                bail!("not an image: {}", source_path.display());
            }
            Ok(self.features.clone())
        }
    }

    fn obs_fixture() -> Observation {
        Observation {
            recon_probs: vec![0.25; 4],
            sharpness: 0.05,
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
    fn extracted_features_replace_the_signal_fields_only() {
        let extractor = FixedExtractor {
            features: Features {
                recon_probs: vec![0.1, 0.1, 0.7, 0.1],
                sharpness: 0.42,
                spacing_ratio: 0.9,
                embedding: Some(vec![0.5; 8]),
            },
        };
        let features = extractor
            .features(&PathBuf::from("frames/0001.png"))
            .unwrap();

        let mut obs = obs_fixture();
        features.apply_to(&mut obs);
        assert_eq!(obs.recon_probs, vec![0.1, 0.1, 0.7, 0.1]);
        assert_eq!(obs.sharpness, 0.42);
        assert_eq!(obs.embedding, Some(vec![0.5; 8]));
        // Telemetry stays with the environment.
        assert_eq!(obs.t_curr, 440.0);
        assert_eq!(obs.direction_changes, 1);
    }

    #[test]
    fn applied_probabilities_are_renormalized() {
        let features = Features {
            recon_probs: vec![2.0, 1.0, 1.0],
            sharpness: 0.3,
            spacing_ratio: 1.0,
            embedding: None,
        };
        let mut obs = obs_fixture();
        features.apply_to(&mut obs);
        let sum: f64 = obs.recon_probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((obs.recon_probs[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn extractor_failures_propagate() {
        let extractor = FixedExtractor {
            features: Features {
                recon_probs: vec![1.0],
                sharpness: 0.0,
                spacing_ratio: 1.0,
                embedding: None,
            },
        };
        assert!(extractor.features(&PathBuf::from("no-extension")).is_err());
    }
}
