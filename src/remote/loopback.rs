//! In-process transport
//!
//! Exports live in a shared registry; resolving a token yields a forwarder
//! that looks its export up on every write. Shutting the channel down makes
//! every later resolve and forwarded write fail.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{TransmittableToken, Transport, TransportFailure};
use crate::destination::{CloseGuard, Destination, RawSink};
use crate::error::{ListenerError, Result};

struct Export {
    sink: CloseGuard<RawSink>,
    resolved: bool,
}

struct Registry {
    open: bool,
    next_id: u64,
    exports: HashMap<u64, Export>,
}

fn lock(registry: &Mutex<Registry>) -> std::result::Result<MutexGuard<'_, Registry>, TransportFailure> {
    registry
        .lock()
        .map_err(|_| TransportFailure::new("loopback registry poisoned"))
}

/// Transport whose two ends live in the same process
#[derive(Clone)]
pub struct LoopbackTransport {
    name: String,
    registry: Arc<Mutex<Registry>>,
}

impl LoopbackTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: Arc::new(Mutex::new(Registry {
                open: true,
                next_id: 1,
                exports: HashMap::new(),
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        lock(&self.registry).map(|r| r.open).unwrap_or(false)
    }

    pub fn export_count(&self) -> usize {
        lock(&self.registry).map(|r| r.exports.len()).unwrap_or(0)
    }

    /// Drop one export; forwarders resolved from it fail afterwards
    pub fn release(&self, export_id: u64) -> bool {
        lock(&self.registry)
            .map(|mut r| r.exports.remove(&export_id).is_some())
            .unwrap_or(false)
    }

    /// Tear the channel down, releasing every export
    pub fn shutdown(&self) {
        if let Ok(mut registry) = lock(&self.registry) {
            log::warn!(
                "loopback channel '{}' shut down with {} export(s)",
                self.name,
                registry.exports.len()
            );
            registry.open = false;
            registry.exports.clear();
        }
    }
}

impl Transport for LoopbackTransport {
    fn make_remotable(&self, sink: CloseGuard<RawSink>) -> Result<TransmittableToken> {
        let mut registry = lock(&self.registry).map_err(|e| ListenerError::transport(e.to_string()))?;
        if !registry.open {
            return Err(ListenerError::transport(format!("channel '{}' is closed", self.name)));
        }
        let export_id = registry.next_id;
        registry.next_id += 1;
        registry.exports.insert(export_id, Export { sink, resolved: false });
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
        let mut registry = lock(&self.registry).map_err(|e| ListenerError::transport(e.to_string()))?;
        if !registry.open {
            return Err(ListenerError::transport(format!("channel '{}' is closed", self.name)));
        }
        let export = registry
            .exports
            .get_mut(&token.export_id)
            .ok_or_else(|| ListenerError::transport(format!("unknown export {}", token)))?;
        if export.resolved {
            return Err(ListenerError::transport(format!("token {} was already resolved", token)));
        }
        export.resolved = true;
        Ok(Box::new(LoopbackForwarder {
            export_id: token.export_id,
            registry: Arc::clone(&self.registry),
        }))
    }
}

/// Forwarding end handed out by [`LoopbackTransport::resolve`]
struct LoopbackForwarder {
    export_id: u64,
    registry: Arc<Mutex<Registry>>,
}

impl LoopbackForwarder {
    // The registry lock is released before touching the sink, so a chain of
    // re-exported forwarders on one channel cannot deadlock.
    fn export(&self) -> io::Result<CloseGuard<RawSink>> {
        let registry = lock(&self.registry).map_err(TransportFailure::into_io)?;
        if !registry.open {
            return Err(TransportFailure::new("loopback channel is closed").into_io());
        }
        registry
            .exports
            .get(&self.export_id)
            .map(|export| export.sink.clone())
            .ok_or_else(|| TransportFailure::new(format!("export {} was released", self.export_id)).into_io())
    }
}

impl Write for LoopbackForwarder {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.export()?.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.export()?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.export()?.flush()
    }
}

impl Destination for LoopbackForwarder {
    fn close(&mut self) -> io::Result<()> {
        self.export()?.close()
    }
}
