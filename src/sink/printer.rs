//! Console feature printer for interactive sessions.

use super::{FeatureSink, SinkError};
use crate::core::features::TaggedFeatures;
use tracing::info;

/// Logs every tagged vector at `info` level.
#[derive(Debug, Default)]
pub struct ConsolePrinter;

impl ConsolePrinter {
    pub fn new() -> Self {
        Self
    }

    /// One line per channel: tag followed by the rounded feature values.
    pub fn format(tagged: &TaggedFeatures) -> String {
        let values: Vec<String> = tagged
            .values
            .as_slice()
            .iter()
            .map(|v| format!("{v:.3}"))
            .collect();
        format!("{} [{}]", tagged.tag, values.join(", "))
    }
}

impl FeatureSink for ConsolePrinter {
    fn name(&self) -> &str {
        "printer"
    }

    fn push_features(&mut self, features: &[TaggedFeatures]) -> Result<(), SinkError> {
        for tagged in features {
            info!("{}", Self::format(tagged));
        }
        Ok(())
    }
}
