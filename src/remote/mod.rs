//! Relocating listeners across process boundaries
//!
//! Serializing a listener never serializes its destination. The raw sink is
//! wrapped in a [`CloseGuard`] and exported through a [`Transport`], and only
//! the resulting [`TransmittableToken`] is persisted. The receiving side
//! resolves the token into a forwarding destination and builds a new listener
//! around it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;

use crate::destination::{CloseGuard, Destination, RawSink};
use crate::error::{ListenerError, Result};
use crate::listener::{ListenerState, StreamListener};

pub mod channel;
pub mod loopback;

pub use channel::{ChannelTransport, Frame, ServeStats};
pub use loopback::LoopbackTransport;

/// Current layout of [`SerializedListener`]
pub const SERIALIZED_VERSION: u32 = 1;

/// Opaque reference to an exported destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransmittableToken {
    /// Name of the channel that exported the destination
    pub channel: String,
    pub export_id: u64,
}

impl fmt::Display for TransmittableToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.channel, self.export_id)
    }
}

/// Capability that makes destinations reachable from another process
pub trait Transport: Send + Sync {
    /// Export a guarded destination and return a token for it
    fn make_remotable(&self, sink: CloseGuard<RawSink>) -> Result<TransmittableToken>;

    /// Turn a received token into a local destination that forwards every
    /// write back to the exported one
    fn resolve(&self, token: &TransmittableToken) -> Result<Box<dyn Destination>>;
}

/// Everything persisted when a listener crosses a boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedListener {
    pub version: u32,
    pub token: TransmittableToken,
}

impl SerializedListener {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ListenerError::transport(format!("encode listener: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ListenerError::transport(format!("decode listener: {}", e)))
    }
}

/// Payload carried by `io::Error`s raised by forwarding destinations
///
/// [`ListenerError`] recognises it and reports a transport failure instead of
/// a local I/O error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportFailure(String);

impl TransportFailure {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::BrokenPipe, self)
    }
}

impl StreamListener {
    /// Export this listener's destination and return its serialized form
    ///
    /// The charset and text-handle state are not part of the result.
    pub fn serialize(&self, transport: &dyn Transport) -> Result<SerializedListener> {
        let guard = CloseGuard::new(self.raw_sink().clone());
        let token = transport.make_remotable(guard)?;
        log::debug!("exported listener destination as {}", token);
        Ok(SerializedListener {
            version: SERIALIZED_VERSION,
            token,
        })
    }

    /// Build a listener whose writes are forwarded to the exported destination
    ///
    /// The result always uses the default charset.
    pub fn reconstruct(serialized: &SerializedListener, transport: &dyn Transport) -> Result<Self> {
        if serialized.version != SERIALIZED_VERSION {
            return Err(ListenerError::transport(format!(
                "unsupported serialized listener version {}",
                serialized.version
            )));
        }
        let forwarding = transport.resolve(&serialized.token)?;
        log::debug!("reconstructed listener from {}", serialized.token);
        let listener = StreamListener::remoted(RawSink::from_boxed(forwarding));
        debug_assert_eq!(listener.state(), ListenerState::Remoted);
        Ok(listener)
    }
}
