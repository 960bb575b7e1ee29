//! In-process recording sink.

use super::{FeatureSink, PositionalSink, SinkError};
use crate::core::features::TaggedFeatures;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct Recorded {
    samples: Vec<Vec<f64>>,
    features: Vec<Vec<TaggedFeatures>>,
}

/// Records everything pushed to it. Clones share the same recording, so one
/// clone can be handed to the broadcaster and another kept for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    recorded: Arc<Mutex<Recorded>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional samples received so far.
    pub fn samples(&self) -> Vec<Vec<f64>> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .samples
            .clone()
    }

    /// Feature frames received so far.
    pub fn feature_frames(&self) -> Vec<Vec<TaggedFeatures>> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .features
            .clone()
    }
}

impl PositionalSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn push_sample(&mut self, sample: &[f64]) -> Result<(), SinkError> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .samples
            .push(sample.to_vec());
        Ok(())
    }
}

impl FeatureSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn push_features(&mut self, features: &[TaggedFeatures]) -> Result<(), SinkError> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .features
            .push(features.to_vec());
        Ok(())
    }
}
