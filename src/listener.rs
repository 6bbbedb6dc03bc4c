//! Build event listener over a shared destination

use std::fmt;

use crate::destination::{Destination, RawSink};
use crate::error::Result;
use crate::format::{FormatArg, format_template};
use crate::line_writer::{Charset, LineWriter};

/// Whether a listener writes directly or through a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Built over a process-local destination
    Local,
    /// Reconstructed from a token; writes are forwarded to the origin
    Remoted,
}

/// Records build events as lines on a destination
///
/// Holds a raw byte handle and a text handle over the same destination. The
/// text handle is always derived from the raw handle, so the two cannot drift
/// apart. Dropping the listener never closes the destination.
#[derive(Debug, Clone)]
pub struct StreamListener {
    raw: RawSink,
    text: LineWriter,
    state: ListenerState,
}

impl StreamListener {
    /// Listener over `sink` using the platform default charset
    pub fn new(sink: RawSink) -> Self {
        Self::with_charset(sink, None)
    }

    pub fn with_charset(sink: RawSink, charset: Option<Charset>) -> Self {
        Self::build(sink, charset, ListenerState::Local)
    }

    /// Wrap `destination` in a fresh shared handle
    pub fn from_destination<D: Destination + 'static>(destination: D) -> Self {
        Self::new(RawSink::new(destination))
    }

    pub(crate) fn remoted(sink: RawSink) -> Self {
        Self::build(sink, None, ListenerState::Remoted)
    }

    fn build(sink: RawSink, charset: Option<Charset>, state: ListenerState) -> Self {
        let text = LineWriter::new(sink.clone(), charset);
        Self { raw: sink, text, state }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn charset(&self) -> Charset {
        self.text.charset()
    }

    pub fn started(&self) -> Result<()> {
        self.text.println("started")?;
        Ok(())
    }

    /// Write `ERROR: <msg>` and hand back the text handle for follow-up output
    pub fn error(&self, msg: &str) -> Result<&LineWriter> {
        self.text.println(&format!("ERROR: {}", msg))?;
        Ok(&self.text)
    }

    pub fn error_with(&self, template: &str, args: &[FormatArg]) -> Result<&LineWriter> {
        let msg = format_template(template, args)?;
        self.error(&msg)
    }

    /// Write `FATAL: <msg>` and hand back the text handle
    pub fn fatal_error(&self, msg: &str) -> Result<&LineWriter> {
        self.text.println(&format!("FATAL: {}", msg))?;
        Ok(&self.text)
    }

    pub fn fatal_error_with(&self, template: &str, args: &[FormatArg]) -> Result<&LineWriter> {
        let msg = format_template(template, args)?;
        self.fatal_error(&msg)
    }

    pub fn finished<R: fmt::Display>(&self, result: R) -> Result<()> {
        self.text.println(&format!("finished: {}", result))?;
        Ok(())
    }

    /// Byte handle for unstructured output such as subprocess streams
    pub fn raw_sink(&self) -> &RawSink {
        &self.raw
    }

    pub fn text_writer(&self) -> &LineWriter {
        &self.text
    }
}
