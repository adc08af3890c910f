//! Nearest-neighbour classification against the fingerprint library.

use crate::store::FingerprintStore;
use crate::types::{ClassificationResult, Identity, SpectralFrame};

pub const DEFAULT_THRESHOLD: f64 = 50.0;

/// Finds the closest reference to `frame`.
///
/// Exact ties go to the first reference in store order (label order). A
/// nearest distance strictly above `threshold` yields [`Identity::Unknown`].
pub fn classify(frame: &SpectralFrame, store: &FingerprintStore, threshold: f64) -> ClassificationResult {
    let mut best: Option<(&str, &SpectralFrame, f64)> = None;
    for (label, reference) in store.lookup_all() {
        let distance = frame.distance(reference);
        match best {
            Some((_, _, d)) if distance >= d => {}
            _ => best = Some((label, reference, distance)),
        }
    }

    match best {
        Some((label, reference, distance)) if distance <= threshold => ClassificationResult {
            identity: Identity::Known(label.to_string()),
            distance,
            reference: Some(*reference),
        },
        Some((_, _, distance)) => ClassificationResult::unknown(distance),
        None => ClassificationResult::unknown(f64::INFINITY),
    }
}

/// Threshold-carrying wrapper used by the acquisition loop.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    pub threshold: f64,
}

impl Classifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn classify(&self, frame: &SpectralFrame, store: &FingerprintStore) -> ClassificationResult {
        classify(frame, store, self.threshold)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
