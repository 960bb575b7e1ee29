//! OSC 1.0 client for the synthesis engine.
//!
//! Each channel's features go out as one message, `/channelN ,ffffffff`,
//! over a non-blocking UDP socket.
//!
//! ```text
//! [address\0 pad4][,fff...\0 pad4][f32 BE][f32 BE]...
//! ```

use super::{FeatureSink, SinkError};
use crate::core::features::TaggedFeatures;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// Append `s` null-terminated and padded to a 4-byte boundary.
fn push_padded_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    let padding = 4 - (s.len() % 4);
    buf.extend(std::iter::repeat(0u8).take(padding));
}

/// Encode one OSC message carrying float32 arguments.
pub fn encode_message(address: &str, args: &[f32]) -> Result<Vec<u8>, SinkError> {
    if !address.starts_with('/') {
        return Err(SinkError::Encode(format!(
            "OSC address must start with '/': {address}"
        )));
    }
    if address.contains('\0') {
        return Err(SinkError::Encode("OSC address contains a null byte".to_string()));
    }

    let type_tags: String = std::iter::once(',')
        .chain(std::iter::repeat('f').take(args.len()))
        .collect();

    let mut buf = Vec::with_capacity(address.len() + type_tags.len() + 8 + args.len() * 4);
    push_padded_str(&mut buf, address);
    push_padded_str(&mut buf, &type_tags);
    for value in args {
        buf.extend_from_slice(&value.to_be_bytes());
    }
    Ok(buf)
}

/// Resolve `addr` to a single socket address.
pub(crate) fn resolve(addr: &str) -> Result<SocketAddr, SinkError> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        SinkError::Io(std::io::Error::new(
            std::io::ErrorKind::AddrNotAvailable,
            format!("no address for {addr}"),
        ))
    })
}

/// Bind an ephemeral non-blocking socket connected to `target`.
pub(crate) fn connect_udp(target: SocketAddr) -> Result<UdpSocket, SinkError> {
    let bind = if target.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    };
    let socket = UdpSocket::bind(bind)?;
    socket.connect(target)?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}

pub struct OscClient {
    socket: UdpSocket,
    target: SocketAddr,
    messages_sent: u64,
}

impl OscClient {
    pub fn connect(addr: &str) -> Result<Self, SinkError> {
        let target = resolve(addr)?;
        Ok(Self {
            socket: connect_udp(target)?,
            target,
            messages_sent: 0,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }
}

impl FeatureSink for OscClient {
    fn name(&self) -> &str {
        "osc"
    }

    fn push_features(&mut self, features: &[TaggedFeatures]) -> Result<(), SinkError> {
        for tagged in features {
            let args: Vec<f32> = tagged.values.as_slice().iter().map(|v| *v as f32).collect();
            let packet = encode_message(&format!("/{}", tagged.tag), &args)?;
            self.socket.send(&packet)?;
            self.messages_sent += 1;
        }
        Ok(())
    }
}
