//! Collector that never emits events.
//!
//! Used when the agent runs without an input script: the host UI layer is
//! expected to push events through [`crate::core::TouchRouter`] directly, and
//! the broadcaster keeps streaming idle frames.

use crate::collector::types::TouchEvent;
use crate::collector::CollectorError;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A noop collector that never emits events.
pub struct NoopCollector {
    _sender: Sender<TouchEvent>,
    receiver: Receiver<TouchEvent>,
    running: Arc<AtomicBool>,
}

impl NoopCollector {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        Self {
            _sender: sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mark the collector as running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for touch events.
    pub fn receiver(&self) -> &Receiver<TouchEvent> {
        &self.receiver
    }
}

impl Default for NoopCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_start_is_rejected() {
        let mut collector = NoopCollector::new();
        assert!(collector.start().is_ok());
        assert!(matches!(
            collector.start(),
            Err(CollectorError::AlreadyRunning)
        ));
        collector.stop();
        assert!(!collector.is_running());
        assert!(collector.receiver().try_recv().is_err());
    }
}
