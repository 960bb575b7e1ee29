//! Output sinks for broadcast frames.
//!
//! Two kinds of consumer exist: positional sinks take the flat `2·N` position
//! sample, feature sinks take the tagged per-channel feature vectors. Sinks
//! are driven only by the dispatcher thread, never under the pool lock.

pub mod memory;
pub mod osc;
pub mod outlet;
pub mod printer;

use crate::config::Config;
use crate::core::features::TaggedFeatures;
use tracing::{info, warn};

pub use memory::MemorySink;
pub use osc::{encode_message, OscClient};
pub use outlet::{StreamInfo, StreamOutlet};
pub use printer::ConsolePrinter;

/// Repeat the failure warning every this many consecutive failures.
const WARN_EVERY: u64 = 500;

/// Errors raised while pushing to a sink.
#[derive(Debug)]
pub enum SinkError {
    /// Socket or stream I/O failed
    Io(std::io::Error),
    /// The payload could not be encoded
    Encode(String),
    /// Sample width does not match the declared stream
    ChannelCount { expected: usize, got: usize },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "Sink I/O error: {e}"),
            SinkError::Encode(msg) => write!(f, "Sink encode error: {msg}"),
            SinkError::ChannelCount { expected, got } => {
                write!(f, "Sample has {got} values, stream declares {expected}")
            }
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SinkError {
    fn from(e: std::io::Error) -> Self {
        SinkError::Io(e)
    }
}

/// Consumer of the flat positional sample.
pub trait PositionalSink: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn push_sample(&mut self, sample: &[f64]) -> Result<(), SinkError>;
}

/// Consumer of tagged per-channel feature vectors.
pub trait FeatureSink: Send + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    fn push_features(&mut self, features: &[TaggedFeatures]) -> Result<(), SinkError>;
}

/// A sink plus its run of consecutive failures.
struct Tracked<S> {
    sink: S,
    name: String,
    failures: u64,
}

impl<S> Tracked<S> {
    fn new(sink: S, name: &str) -> Self {
        Self {
            sink,
            name: name.to_string(),
            failures: 0,
        }
    }

    /// Log with suppression: first failure, every `WARN_EVERY`-th, then recovery.
    fn observe(&mut self, result: Result<(), SinkError>) -> bool {
        let name = self.name.as_str();
        match result {
            Ok(()) => {
                if self.failures > 0 {
                    info!(sink = name, failures = self.failures, "sink recovered");
                    self.failures = 0;
                }
                true
            }
            Err(e) => {
                self.failures += 1;
                if self.failures == 1 || self.failures % WARN_EVERY == 0 {
                    warn!(sink = name, failures = self.failures, "sink push failed: {}", e);
                }
                false
            }
        }
    }
}

/// Every sink a broadcaster feeds.
#[derive(Default)]
pub struct SinkSet {
    positional: Vec<Tracked<Box<dyn PositionalSink>>>,
    features: Vec<Tracked<Box<dyn FeatureSink>>>,
}

impl SinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the sinks named in the configuration.
    ///
    /// A sink that cannot be opened is a startup error, not a runtime one.
    pub fn from_config(config: &Config) -> Result<Self, SinkError> {
        let mut sinks = Self::new();

        if let Some(addr) = &config.sinks.outlet_addr {
            let outlet = StreamOutlet::open(addr, StreamInfo::from_config(config))?;
            info!(addr = %addr, source_id = %outlet.info().source_id, "stream outlet open");
            sinks.add_positional(outlet);
        }

        if let Some(addr) = &config.sinks.osc_addr {
            sinks.add_features(OscClient::connect(addr)?);
            info!(addr = %addr, "OSC client ready");
        }

        if config.sinks.print_features {
            sinks.add_features(ConsolePrinter::new());
        }

        Ok(sinks)
    }

    pub fn add_positional(&mut self, sink: impl PositionalSink) {
        let name = sink.name().to_string();
        let sink: Box<dyn PositionalSink> = Box::new(sink);
        self.positional.push(Tracked::new(sink, &name));
    }

    pub fn add_features(&mut self, sink: impl FeatureSink) {
        let name = sink.name().to_string();
        let sink: Box<dyn FeatureSink> = Box::new(sink);
        self.features.push(Tracked::new(sink, &name));
    }

    pub fn with_positional(mut self, sink: impl PositionalSink) -> Self {
        self.add_positional(sink);
        self
    }

    pub fn with_features(mut self, sink: impl FeatureSink) -> Self {
        self.add_features(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push one frame to every sink. Returns how many sinks failed.
    ///
    /// A failing sink loses this frame only; the others still receive it.
    pub fn dispatch(&mut self, positions: &[f64], features: &[TaggedFeatures]) -> usize {
        let mut failed = 0;

        for tracked in &mut self.positional {
            let result = tracked.sink.push_sample(positions);
            if !tracked.observe(result) {
                failed += 1;
            }
        }

        for tracked in &mut self.features {
            let result = tracked.sink.push_features(features);
            if !tracked.observe(result) {
                failed += 1;
            }
        }

        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::FeatureVector;

    struct Flaky {
        fail: bool,
    }

    impl PositionalSink for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        fn push_sample(&mut self, _sample: &[f64]) -> Result<(), SinkError> {
            if self.fail {
                Err(SinkError::Encode("refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_failure_is_isolated_per_sink() {
        let memory = MemorySink::new();
        let mut sinks = SinkSet::new()
            .with_positional(Flaky { fail: true })
            .with_positional(memory.clone())
            .with_features(memory.clone());

        let features = vec![TaggedFeatures {
            tag: TaggedFeatures::channel_tag(0),
            values: FeatureVector::INACTIVE,
        }];
        assert_eq!(sinks.dispatch(&[0.0, 0.0], &features), 1);
        assert_eq!(sinks.len(), 3);
        assert_eq!(memory.samples(), vec![vec![0.0, 0.0]]);
        assert_eq!(memory.feature_frames().len(), 1);
    }

    #[test]
    fn test_failure_counter_resets_on_recovery() {
        let mut tracked = Tracked::new(Flaky { fail: true }, "flaky");
        assert!(!tracked.observe(Err(SinkError::Encode("x".to_string()))));
        assert!(!tracked.observe(Err(SinkError::Encode("x".to_string()))));
        assert_eq!(tracked.failures, 2);
        assert!(tracked.observe(Ok(())));
        assert_eq!(tracked.failures, 0);
    }

    #[test]
    fn test_error_display() {
        let err = SinkError::ChannelCount {
            expected: 4,
            got: 2,
        };
        assert_eq!(err.to_string(), "Sample has 2 values, stream declares 4");
    }

    #[test]
    fn test_empty_config_builds_no_sinks() {
        let mut config = Config::default();
        config.sinks.osc_addr = None;
        config.sinks.outlet_addr = None;
        config.sinks.print_features = false;
        let sinks = SinkSet::from_config(&config).unwrap();
        assert!(sinks.is_empty());
    }
}
