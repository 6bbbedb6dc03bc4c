//! Close suppression for exported destinations

use std::io::{self, Write};

use super::Destination;

/// Passes writes and flushes through to `inner` but swallows `close()`
///
/// Used when a destination is handed to a remote side, so the remote cannot
/// terminate the origin's stream.
#[derive(Debug, Clone)]
pub struct CloseGuard<D> {
    inner: D,
}

impl<D: Destination> CloseGuard<D> {
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &D {
        &self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

impl<D: Destination> Write for CloseGuard<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<D: Destination> Destination for CloseGuard<D> {
    fn close(&mut self) -> io::Result<()> {
        log::trace!("close suppressed by guard");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::{MemoryDestination, RawSink};

    #[test]
    fn test_close_never_reaches_inner() {
        let mem = MemoryDestination::new();
        let mut guard = CloseGuard::new(mem.clone());
        for _ in 0..5 {
            guard.close().unwrap();
        }
        assert_eq!(mem.close_count(), 0);
        assert!(!mem.is_closed());
    }

    #[test]
    fn test_writes_pass_through_after_close() {
        let mem = MemoryDestination::new();
        let mut guard = CloseGuard::new(mem.clone());
        guard.write_all(b"before ").unwrap();
        guard.close().unwrap();
        guard.write_all(b"after").unwrap();
        guard.flush().unwrap();
        assert_eq!(mem.as_string(), "before after");
        assert_eq!(mem.flush_count(), 1);
    }

    #[test]
    fn test_guarded_raw_sink() {
        let mem = MemoryDestination::new();
        let sink = RawSink::new(mem.clone());
        let mut guard = CloseGuard::new(sink.clone());
        guard.write_all(b"x").unwrap();
        guard.close().unwrap();
        assert!(guard.get_ref().same_destination(&sink));
        assert_eq!(mem.close_count(), 0);
        assert_eq!(mem.as_string(), "x");
    }
}
