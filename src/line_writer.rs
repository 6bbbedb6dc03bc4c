//! Encoded line writer with flush-after-every-write discipline
//!
//! Text and raw bytes reach the same [`RawSink`]. Because every text write is
//! encoded up front and written plus flushed under one lock, a line is fully
//! emitted before the caller's next raw write can start, and two callers'
//! lines never interleave.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;

use crate::destination::RawSink;

#[cfg(windows)]
pub const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_SEPARATOR: &str = "\n";

/// Character encoding applied to text before it reaches the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Charset {
    #[default]
    #[serde(rename = "UTF-8", alias = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "UTF-16BE", alias = "utf-16be")]
    Utf16Be,
    #[serde(rename = "UTF-16LE", alias = "utf-16le")]
    Utf16Le,
    #[serde(rename = "ISO-8859-1", alias = "iso-8859-1", alias = "latin1")]
    Latin1,
    #[serde(rename = "US-ASCII", alias = "us-ascii", alias = "ascii")]
    Ascii,
}

impl Charset {
    /// Encoding used when none is selected
    pub fn platform_default() -> Self {
        Charset::Utf8
    }

    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Utf16Be => "UTF-16BE",
            Charset::Utf16Le => "UTF-16LE",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Ascii => "US-ASCII",
        }
    }

    /// Encode `text`; unmappable characters become `?`
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Charset::Utf8 => text.as_bytes().to_vec(),
            Charset::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Charset::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Charset::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Charset::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported charset: {0}")]
pub struct UnsupportedCharset(pub String);

impl FromStr for Charset {
    type Err = UnsupportedCharset;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "utf8" => Ok(Charset::Utf8),
            "utf16be" => Ok(Charset::Utf16Be),
            "utf16le" => Ok(Charset::Utf16Le),
            "iso88591" | "latin1" => Ok(Charset::Latin1),
            "usascii" | "ascii" => Ok(Charset::Ascii),
            _ => Err(UnsupportedCharset(s.to_string())),
        }
    }
}

/// Text handle layered on a raw sink
///
/// Each call encodes, writes, and flushes before returning.
#[derive(Debug, Clone)]
pub struct LineWriter {
    sink: RawSink,
    charset: Charset,
}

impl LineWriter {
    pub fn new(sink: RawSink, charset: Option<Charset>) -> Self {
        Self {
            sink,
            charset: charset.unwrap_or_else(Charset::platform_default),
        }
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn sink(&self) -> &RawSink {
        &self.sink
    }

    /// Write `text` followed by the line separator
    pub fn println(&self, text: &str) -> io::Result<()> {
        let mut bytes = self.charset.encode(text);
        bytes.extend(self.charset.encode(LINE_SEPARATOR));
        self.sink.write_flushed(&bytes)
    }

    /// Write `text` without a separator
    pub fn print(&self, text: &str) -> io::Result<()> {
        self.sink.write_flushed(&self.charset.encode(text))
    }

    /// Formatted counterpart of [`println`](Self::println), ending with
    /// [`LINE_SEPARATOR`]
    pub fn println_fmt(&self, args: fmt::Arguments<'_>) -> io::Result<()> {
        let mut text = args.to_string();
        text.push_str(LINE_SEPARATOR);
        self.print(&text)
    }

    /// Lets `write!` / `writeln!` target the handle directly
    ///
    /// `writeln!` always appends `\n`; use [`println_fmt`](Self::println_fmt)
    /// for the platform separator.
    pub fn write_fmt(&self, args: fmt::Arguments<'_>) -> io::Result<()> {
        match args.as_str() {
            Some(s) => self.print(s),
            None => self.print(&args.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::MemoryDestination;
    use std::io::Write;

    fn writer(charset: Option<Charset>) -> (MemoryDestination, LineWriter) {
        let mem = MemoryDestination::new();
        let w = LineWriter::new(RawSink::new(mem.clone()), charset);
        (mem, w)
    }

    #[test]
    fn test_println_appends_separator_and_flushes() {
        let (mem, w) = writer(None);
        w.println("hello").unwrap();
        assert_eq!(mem.as_string(), format!("hello{}", LINE_SEPARATOR));
        assert_eq!(mem.flush_count(), 1);
    }

    #[test]
    fn test_every_write_flushes() {
        let (mem, w) = writer(None);
        w.print("a").unwrap();
        w.print("b").unwrap();
        writeln!(w, "c{}", 1).unwrap();
        assert_eq!(mem.flush_count(), 3);
        assert_eq!(mem.as_string(), "abc1\n");
    }

    #[test]
    fn test_println_fmt_uses_platform_separator() {
        let (mem, w) = writer(None);
        w.println_fmt(format_args!("step {} of {}", 1, 2)).unwrap();
        assert_eq!(mem.as_string(), format!("step 1 of 2{}", LINE_SEPARATOR));
        assert_eq!(mem.flush_count(), 1);
    }

    #[test]
    fn test_default_charset() {
        let (_, w) = writer(None);
        assert_eq!(w.charset(), Charset::Utf8);
    }

    #[test]
    fn test_interleaved_raw_and_text_keep_order() {
        let (mem, w) = writer(None);
        let mut raw = w.sink().clone();
        w.println("one").unwrap();
        raw.write_all(b"raw-two\n").unwrap();
        w.println("three").unwrap();
        raw.write_all(b"raw-four\n").unwrap();
        assert_eq!(mem.lines(), vec!["one", "raw-two", "three", "raw-four"]);
    }

    #[test]
    fn test_latin1_encoding() {
        let (mem, w) = writer(Some(Charset::Latin1));
        w.print("café €").unwrap();
        assert_eq!(mem.contents(), vec![b'c', b'a', b'f', 0xE9, b' ', b'?']);
    }

    #[test]
    fn test_ascii_encoding_replaces() {
        assert_eq!(Charset::Ascii.encode("naïve"), b"na?ve".to_vec());
    }

    #[test]
    fn test_utf16_encodings() {
        assert_eq!(Charset::Utf16Be.encode("A"), vec![0x00, 0x41]);
        assert_eq!(Charset::Utf16Le.encode("A"), vec![0x41, 0x00]);
    }

    #[test]
    fn test_charset_from_str_aliases() {
        assert_eq!("utf8".parse::<Charset>().unwrap(), Charset::Utf8);
        assert_eq!("ISO-8859-1".parse::<Charset>().unwrap(), Charset::Latin1);
        assert_eq!("latin1".parse::<Charset>().unwrap(), Charset::Latin1);
        assert_eq!("US_ASCII".parse::<Charset>().unwrap(), Charset::Ascii);
        assert!("ebcdic".parse::<Charset>().is_err());
    }

    #[test]
    fn test_charset_serde_names() {
        let yaml = serde_yaml::to_string(&Charset::Utf16Le).unwrap();
        assert_eq!(yaml.trim(), "UTF-16LE");
        let parsed: Charset = serde_yaml::from_str("ISO-8859-1").unwrap();
        assert_eq!(parsed, Charset::Latin1);
    }
}
