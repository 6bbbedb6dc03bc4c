//! Transport framed over a pair of byte streams
//!
//! The origin exports destinations and runs [`ChannelTransport::serve`] on the
//! stream coming back from the remote process. The remote side connects with
//! its outbound stream (typically its stdout) and resolves tokens into
//! forwarders that encode each write as one newline-delimited JSON [`Frame`].

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::{TransmittableToken, Transport, TransportFailure};
use crate::destination::{CloseGuard, Destination, RawSink};
use crate::error::{ListenerError, Result};

/// One forwarded operation on an exported destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Frame {
    Write { export: u64, data: Vec<u8> },
    Flush { export: u64 },
    Close { export: u64 },
}

impl Frame {
    pub fn export(&self) -> u64 {
        match self {
            Frame::Write { export, .. } | Frame::Flush { export } | Frame::Close { export } => *export,
        }
    }

    /// One wire line, without the trailing newline
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }
}

/// Counters reported when [`ChannelTransport::serve`] reaches end of stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub frames: u64,
    pub bytes: u64,
}

type Outbound = Arc<Mutex<Box<dyn Write + Send>>>;

/// Transport between two processes connected by byte streams
#[derive(Clone)]
pub struct ChannelTransport {
    name: String,
    exports: Arc<Mutex<HashMap<u64, CloseGuard<RawSink>>>>,
    next_id: Arc<AtomicU64>,
    resolved: Arc<Mutex<HashSet<u64>>>,
    outbound: Option<Outbound>,
}

impl ChannelTransport {
    /// Origin side: exports destinations, receives frames through `serve`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exports: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            resolved: Arc::new(Mutex::new(HashSet::new())),
            outbound: None,
        }
    }

    /// Remote side: resolved tokens forward their writes into `outbound`
    pub fn connect<W: Write + Send + 'static>(name: impl Into<String>, outbound: W) -> Self {
        let mut transport = Self::new(name);
        transport.outbound = Some(Arc::new(Mutex::new(Box::new(outbound))));
        transport
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn export_count(&self) -> usize {
        self.exports.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Drop an export; frames addressed to it are rejected afterwards
    pub fn release(&self, export_id: u64) -> bool {
        self.exports
            .lock()
            .map(|mut e| e.remove(&export_id).is_some())
            .unwrap_or(false)
    }

    fn export(&self, export_id: u64) -> Result<CloseGuard<RawSink>> {
        let exports = self
            .exports
            .lock()
            .map_err(|_| ListenerError::transport("export table poisoned"))?;
        exports.get(&export_id).cloned().ok_or_else(|| {
            log::warn!("frame for unknown export {} on channel '{}'", export_id, self.name);
            ListenerError::transport(format!("frame for unknown export {}", export_id))
        })
    }

    /// Apply frames from `reader` to the exported destinations until end of stream
    pub fn serve<R: BufRead>(&self, reader: R) -> Result<ServeStats> {
        let mut stats = ServeStats::default();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ListenerError::transport(format!("read frame: {}", e)))?;
            if line.trim().is_empty() {
                continue;
            }
            let frame = Frame::decode(&line).map_err(|e| {
                ListenerError::transport(format!("malformed frame on line {}: {}", lineno + 1, e))
            })?;
            let mut sink = self.export(frame.export())?;
            match frame {
                Frame::Write { data, .. } => {
                    sink.write_all(&data)?;
                    stats.bytes += data.len() as u64;
                }
                Frame::Flush { .. } => sink.flush()?,
                Frame::Close { .. } => sink.close()?,
            }
            stats.frames += 1;
        }
        log::debug!(
            "channel '{}' drained: {} frames, {} bytes",
            self.name,
            stats.frames,
            stats.bytes
        );
        Ok(stats)
    }
}

impl Transport for ChannelTransport {
    fn make_remotable(&self, sink: CloseGuard<RawSink>) -> Result<TransmittableToken> {
        let export_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.exports
            .lock()
            .map_err(|_| ListenerError::transport("export table poisoned"))?
            .insert(export_id, sink);
        Ok(TransmittableToken {
            channel: self.name.clone(),
            export_id,
        })
    }

    fn resolve(&self, token: &TransmittableToken) -> Result<Box<dyn Destination>> {
        if token.channel != self.name {
            return Err(ListenerError::transport(format!(
                "token {} belongs to another channel than '{}'",
                token, self.name
            )));
        }
        let outbound = self
            .outbound
            .clone()
            .ok_or_else(|| ListenerError::transport(format!("channel '{}' has no outbound stream", self.name)))?;
        let first = self
            .resolved
            .lock()
            .map_err(|_| ListenerError::transport("resolve table poisoned"))?
            .insert(token.export_id);
        if !first {
            return Err(ListenerError::transport(format!("token {} was already resolved", token)));
        }
        Ok(Box::new(ChannelForwarder {
            export: token.export_id,
            outbound,
        }))
    }
}

struct ChannelForwarder {
    export: u64,
    outbound: Outbound,
}

impl ChannelForwarder {
    fn send(&self, frame: Frame) -> io::Result<()> {
        let line = frame.encode().map_err(io::Error::other)?;
        let mut out = self
            .outbound
            .lock()
            .map_err(|_| TransportFailure::new("outbound stream poisoned").into_io())?;
        out.write_all(line.as_bytes())
            .and_then(|_| out.write_all(b"\n"))
            .and_then(|_| out.flush())
            .map_err(|e| TransportFailure::new(format!("channel write failed: {}", e)).into_io())
    }
}

impl Write for ChannelForwarder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(Frame::Write {
            export: self.export,
            data: buf.to_vec(),
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send(Frame::Flush { export: self.export })
    }
}

impl Destination for ChannelForwarder {
    fn close(&mut self) -> io::Result<()> {
        self.send(Frame::Close { export: self.export })
    }
}
