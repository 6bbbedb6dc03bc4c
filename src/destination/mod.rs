//! Byte sinks that build logs are written to
//!
//! A [`Destination`] is anything that accepts raw bytes and can be closed.
//! Listeners never own one; they hold a [`RawSink`], a shared handle whose
//! lifetime belongs to whoever created the destination.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod close_guard;
pub mod memory;
pub mod writer;

pub use close_guard::CloseGuard;
pub use memory::MemoryDestination;
pub use writer::WriterDestination;

/// A byte-accepting sink whose close can be observed (and suppressed)
pub trait Destination: Write + Send {
    /// Release the underlying resource
    fn close(&mut self) -> io::Result<()>;
}

impl<D: Destination + ?Sized> Destination for Box<D> {
    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Shared handle to one destination
///
/// Clones point at the same destination. Every `write` and `flush` runs under
/// the destination's lock, so a single call is never split by another caller.
#[derive(Clone)]
pub struct RawSink {
    inner: Arc<Mutex<Box<dyn Destination>>>,
}

impl RawSink {
    pub fn new<D: Destination + 'static>(destination: D) -> Self {
        Self::from_boxed(Box::new(destination))
    }

    pub fn from_boxed(destination: Box<dyn Destination>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(destination)),
        }
    }

    /// True when both handles reach the same destination
    pub fn same_destination(&self, other: &RawSink) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Lock the destination for a sequence of operations that must not be
    /// interleaved with other callers
    pub fn lock(&self) -> io::Result<MutexGuard<'_, Box<dyn Destination>>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("destination lock poisoned by a panicked writer"))
    }

    /// Write all of `bytes` and flush, as one locked operation
    pub fn write_flushed(&self, bytes: &[u8]) -> io::Result<()> {
        let mut dest = self.lock()?;
        dest.write_all(bytes)?;
        dest.flush()
    }

    /// Close the destination. Reserved for the destination's owner.
    pub fn close(&self) -> io::Result<()> {
        self.lock()?.close()
    }
}

impl fmt::Debug for RawSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawSink")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}

impl Write for RawSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.lock()?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

impl Write for &RawSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock()?.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.lock()?.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.lock()?.flush()
    }
}

impl Destination for RawSink {
    fn close(&mut self) -> io::Result<()> {
        RawSink::close(self)
    }
}
