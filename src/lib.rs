//! Build status logging over relocatable byte sinks
//!
//! A [`StreamListener`] records build events (`started`, `ERROR:`, `FATAL:`,
//! `finished:`) as lines on a shared [`RawSink`], and can be serialized into a
//! [`SerializedListener`] that another process reconstructs over a
//! [`Transport`]. Writes on the reconstructed listener land in the origin
//! destination.

pub mod destination;
pub mod error;
pub mod format;
pub mod line_writer;
pub mod listener;
pub mod remote;

pub use destination::{CloseGuard, Destination, MemoryDestination, RawSink, WriterDestination};
pub use error::{ListenerError, Result};
pub use format::{FormatArg, FormatError, format_template};
pub use line_writer::{Charset, LINE_SEPARATOR, LineWriter};
pub use listener::{ListenerState, StreamListener};
pub use remote::{
    ChannelTransport, LoopbackTransport, SerializedListener, ServeStats, TransmittableToken, Transport,
};
