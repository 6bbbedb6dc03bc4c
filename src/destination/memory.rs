//! In-memory destination

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use super::Destination;

#[derive(Debug, Default)]
struct MemoryState {
    bytes: Vec<u8>,
    flushes: usize,
    closes: usize,
}

/// Destination that collects bytes in memory
///
/// Clones share one buffer, so a test can hand one clone to a listener and
/// inspect another. Writes after `close()` fail with `BrokenPipe`.
#[derive(Debug, Clone, Default)]
pub struct MemoryDestination {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // A panicked writer leaves plain bytes behind; the buffer is still readable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contents(&self) -> Vec<u8> {
        self.state().bytes.clone()
    }

    pub fn as_string(&self) -> String {
        String::from_utf8_lossy(&self.state().bytes).to_string()
    }

    /// Contents split into lines, separators removed
    pub fn lines(&self) -> Vec<String> {
        self.as_string().lines().map(|l| l.to_string()).collect()
    }

    pub fn flush_count(&self) -> usize {
        self.state().flushes
    }

    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }
}

impl Write for MemoryDestination {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state();
        if state.closes > 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "memory destination is closed"));
        }
        state.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state().flushes += 1;
        Ok(())
    }
}

impl Destination for MemoryDestination {
    fn close(&mut self) -> io::Result<()> {
        self.state().closes += 1;
        Ok(())
    }
}
