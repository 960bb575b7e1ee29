//! Streaming-bus outlet for the positional sample.
//!
//! The outlet declares its stream once with a [`StreamInfo`] and then sends
//! one JSON datagram per tick. Consumers that join late pick up the
//! declaration from the periodic re-announce.

use super::osc::{connect_udp, resolve};
use super::{PositionalSink, SinkError};
use crate::config::Config;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{SocketAddr, UdpSocket};

/// Stream name every consumer looks for.
pub const STREAM_NAME: &str = "Touch events";

/// Re-announce the stream info every this many samples.
const ANNOUNCE_EVERY: u64 = 1000;

/// Declaration of the positional stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    /// `Origin: <origin>, Grid: <grid>`
    pub stream_type: String,
    /// Values per sample, `2·N`
    pub channel_count: usize,
    /// Samples per second
    pub nominal_rate: f64,
    pub channel_format: String,
    pub source_id: String,
}

impl StreamInfo {
    pub fn from_config(config: &Config) -> Self {
        let hostname = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            name: STREAM_NAME.to_string(),
            stream_type: config.stream_type(),
            channel_count: 2 * config.channels,
            nominal_rate: 1.0 / config.tick_period.as_secs_f64(),
            channel_format: "float32".to_string(),
            source_id: format!("{}-{}", hostname, &uuid::Uuid::new_v4().to_string()[..8]),
        }
    }
}

/// Datagrams on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutletMessage {
    StreamInfo(StreamInfo),
    Sample {
        seq: u64,
        timestamp: DateTime<Utc>,
        sample: Vec<f64>,
    },
}

pub struct StreamOutlet {
    socket: UdpSocket,
    target: SocketAddr,
    info: StreamInfo,
    seq: u64,
}

impl StreamOutlet {
    /// Open the outlet and announce the stream.
    pub fn open(addr: &str, info: StreamInfo) -> Result<Self, SinkError> {
        let target = resolve(addr)?;
        let outlet = Self {
            socket: connect_udp(target)?,
            target,
            info,
            seq: 0,
        };
        outlet.announce()?;
        Ok(outlet)
    }

    pub fn info(&self) -> &StreamInfo {
        &self.info
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Samples sent so far.
    pub fn samples_sent(&self) -> u64 {
        self.seq
    }

    fn announce(&self) -> Result<(), SinkError> {
        self.send(&OutletMessage::StreamInfo(self.info.clone()))
    }

    fn send(&self, message: &OutletMessage) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(message).map_err(|e| SinkError::Encode(e.to_string()))?;
        self.socket.send(&payload)?;
        Ok(())
    }
}

impl PositionalSink for StreamOutlet {
    fn name(&self) -> &str {
        "outlet"
    }

    fn push_sample(&mut self, sample: &[f64]) -> Result<(), SinkError> {
        if sample.len() != self.info.channel_count {
            return Err(SinkError::ChannelCount {
                expected: self.info.channel_count,
                got: sample.len(),
            });
        }

        if self.seq > 0 && self.seq % ANNOUNCE_EVERY == 0 {
            self.announce()?;
        }

        self.send(&OutletMessage::Sample {
            seq: self.seq,
            timestamp: Utc::now(),
            sample: sample.to_vec(),
        })?;
        self.seq += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_info_from_config() {
        let config = Config {
            channels: 3,
            ..Config::default()
        };
        let info = StreamInfo::from_config(&config);

        assert_eq!(info.name, "Touch events");
        assert_eq!(info.channel_count, 6);
        assert!((info.nominal_rate - 100.0).abs() < 1e-9);
        assert_eq!(info.stream_type, config.stream_type());
        // hostname, a dash and eight uuid characters
        let suffix = info.source_id.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
    }

    #[test]
    fn test_wrong_width_is_rejected() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = receiver.local_addr().unwrap().to_string();

        let info = StreamInfo::from_config(&Config::default());
        let mut outlet = StreamOutlet::open(&addr, info).unwrap();

        let mut buf = [0u8; 2048];
        let len = receiver.recv(&mut buf).unwrap();
        let announce: OutletMessage = serde_json::from_slice(&buf[..len]).unwrap();
        assert!(matches!(announce, OutletMessage::StreamInfo(_)));

        let err = outlet.push_sample(&[0.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            SinkError::ChannelCount {
                expected: 2,
                got: 3
            }
        ));
        assert_eq!(outlet.samples_sent(), 0);

        outlet.push_sample(&[0.25, 0.5]).unwrap();
        let len = receiver.recv(&mut buf).unwrap();
        match serde_json::from_slice::<OutletMessage>(&buf[..len]).unwrap() {
            OutletMessage::Sample { seq, sample, .. } => {
                assert_eq!(seq, 0);
                assert_eq!(sample, vec![0.25, 0.5]);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_stream_is_reannounced_periodically() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let addr = receiver.local_addr().unwrap().to_string();

        let info = StreamInfo::from_config(&Config::default());
        let mut outlet = StreamOutlet::open(&addr, info.clone()).unwrap();

        let mut buf = [0u8; 2048];
        let mut announced_before = Vec::new();
        let mut pending_announce = 0;
        for i in 0..=ANNOUNCE_EVERY {
            outlet.push_sample(&[0.1, 0.2]).unwrap();
            // Drain after every push so the loopback buffer never overflows.
            loop {
                let len = receiver.recv(&mut buf).unwrap();
                match serde_json::from_slice::<OutletMessage>(&buf[..len]).unwrap() {
                    OutletMessage::StreamInfo(announced) => {
                        assert_eq!(announced, info);
                        pending_announce += 1;
                    }
                    OutletMessage::Sample { seq, .. } => {
                        assert_eq!(seq, i);
                        if pending_announce > 0 {
                            announced_before.push(seq);
                            pending_announce = 0;
                        }
                        break;
                    }
                }
            }
        }

        // The opening announce precedes sample 0, the re-announce sample 1000.
        assert_eq!(announced_before, vec![0, ANNOUNCE_EVERY]);
        assert_eq!(outlet.samples_sent(), ANNOUNCE_EVERY + 1);
    }
}
