// src/classifier/model.rs
//! Gesture labels, the model seam and the window-gated classifier

use crate::hal::types::{ChannelVector, Sample};
use crate::processing::features::mean_per_channel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Compound training label: finger/group id plus movement name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GestureLabel {
    /// Finger or movement group
    pub group: u32,
    /// Movement name
    pub movement: String,
}

impl GestureLabel {
    /// Label for `movement` within `group`
    pub fn new(group: u32, movement: impl Into<String>) -> Self {
        Self {
            group,
            movement: movement.into(),
        }
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.group, self.movement)
    }
}

/// Trained gesture model
///
/// Implementations must be total over finite inputs and free of side
/// effects; the classifier may call them from any thread.
pub trait GestureModel: Send + Sync {
    /// Predict a label from per-channel means
    fn predict(&self, features: &ChannelVector) -> GestureLabel;
}

/// Feeds complete windows to a [`GestureModel`]
#[derive(Clone)]
pub struct GestureClassifier {
    model: Arc<dyn GestureModel>,
    window_capacity: usize,
}

impl GestureClassifier {
    /// Classify windows of exactly `window_capacity` samples with `model`
    pub fn new(model: Arc<dyn GestureModel>, window_capacity: usize) -> Self {
        Self {
            model,
            window_capacity,
        }
    }

    /// Window length the classifier requires
    pub fn window_capacity(&self) -> usize {
        self.window_capacity
    }

    /// Classify a precomputed feature vector
    pub fn classify(&self, features: &ChannelVector) -> GestureLabel {
        self.model.predict(features)
    }

    /// Classify the per-channel mean of a full window.
    ///
    /// A window of any other length yields `None` and the model is never
    /// consulted.
    pub fn classify_window(&self, window: &[Sample]) -> Option<GestureLabel> {
        if window.len() != self.window_capacity {
            trace!(len = window.len(), capacity = self.window_capacity, "Window incomplete");
            return None;
        }
        Some(self.classify(&mean_per_channel(window)))
    }
}

impl fmt::Debug for GestureClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureClassifier")
            .field("window_capacity", &self.window_capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        calls: AtomicUsize,
    }

    impl GestureModel for CountingModel {
        fn predict(&self, features: &ChannelVector) -> GestureLabel {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if features[0] > 0.0 {
                GestureLabel::new(1, "Flexion")
            } else {
                GestureLabel::new(1, "Extension")
            }
        }
    }

    fn window(len: usize, ch1: i16) -> Vec<Sample> {
        (0..len)
            .map(|t| {
                let mut channels = [0i16; 8];
                channels[0] = ch1;
                Sample::new(t as u64, channels)
            })
            .collect()
    }

    #[test]
    fn test_label_display() {
        assert_eq!(GestureLabel::new(3, "Flexion").to_string(), "3_Flexion");
    }

    #[test]
    fn test_partial_window_skips_model() {
        let model = Arc::new(CountingModel { calls: AtomicUsize::new(0) });
        let classifier = GestureClassifier::new(model.clone(), 4);

        assert_eq!(classifier.classify_window(&window(3, 10)), None);
        assert_eq!(classifier.classify_window(&[]), None);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);

        assert_eq!(
            classifier.classify_window(&window(4, 10)),
            Some(GestureLabel::new(1, "Flexion"))
        );
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classifies_mean_vector() {
        let model = Arc::new(CountingModel { calls: AtomicUsize::new(0) });
        let classifier = GestureClassifier::new(model, 2);
        let mut samples = window(2, -5);
        samples[1].channels[0] = 3;

        assert_eq!(
            classifier.classify_window(&samples),
            Some(GestureLabel::new(1, "Extension"))
        );
    }
}
