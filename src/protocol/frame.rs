//! STOMP frame model and codec.
//!
//! Frames are text-only here: the tracker endpoint carries JSON bodies,
//! and both SockJS and raw WebSocket deliver them as text messages.
//!
//! # Wire Format
//!
//! ```text
//! COMMAND
//! header1:value1
//! header2:value2
//!
//! body^@
//! ```
//!
//! Header names and values are escaped (`\\`, `\n`, `\r`, `\c`) in every
//! frame except `CONNECT` and `CONNECTED`. Bare EOLs between frames are
//! heart-beats and are skipped by the decoder.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;

// ============================================================================
// Constants
// ============================================================================

/// Header carrying the body length in bytes.
pub const CONTENT_LENGTH: &str = "content-length";

/// Default decoder limit for one frame: 4 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

// ============================================================================
// Command
// ============================================================================

/// STOMP 1.2 frame commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Client frames
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // Server frames
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Connected => "CONNECTED",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let command = match name {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "ACK" => Self::Ack,
            "NACK" => Self::Nack,
            "BEGIN" => Self::Begin,
            "COMMIT" => Self::Commit,
            "ABORT" => Self::Abort,
            "DISCONNECT" => Self::Disconnect,
            "CONNECTED" => Self::Connected,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            _ => return None,
        };
        Some(command)
    }

    /// Returns `true` if header escaping applies to this command.
    #[inline]
    #[must_use]
    pub const fn escapes_headers(&self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Frame
// ============================================================================

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in wire order. Repeated names are kept; the first wins on lookup.
    pub headers: Vec<(String, String)>,
    /// Frame body (empty for most client frames).
    pub body: String,
}

// ============================================================================
// Frame - Constructors
// ============================================================================

impl Frame {
    /// Creates a frame with no headers and an empty body.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Creates a `CONNECT` frame.
    ///
    /// `heart_beat` is `(outgoing_ms, incoming_ms)`.
    #[must_use]
    pub fn connect(accept_version: &str, host: &str, heart_beat: (u32, u32)) -> Self {
        Self::new(Command::Connect)
            .with_header("accept-version", accept_version)
            .with_header("host", host)
            .with_header("heart-beat", format!("{},{}", heart_beat.0, heart_beat.1))
    }

    /// Creates a `SUBSCRIBE` frame with automatic acknowledgement.
    #[must_use]
    pub fn subscribe(id: SubscriptionId, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id.to_string())
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    /// Creates an `UNSUBSCRIBE` frame.
    #[must_use]
    pub fn unsubscribe(id: SubscriptionId) -> Self {
        Self::new(Command::Unsubscribe).with_header("id", id.to_string())
    }

    /// Creates a `DISCONNECT` frame requesting a receipt.
    #[must_use]
    pub fn disconnect(receipt: &str) -> Self {
        Self::new(Command::Disconnect).with_header("receipt", receipt)
    }

    /// Creates a `SEND` frame carrying a JSON body.
    #[must_use]
    pub fn send(destination: &str, json_body: impl Into<String>) -> Self {
        Self::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", "application/json")
            .with_body(json_body)
    }

    /// Appends a header.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the body.
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

// ============================================================================
// Frame - Accessors
// ============================================================================

impl Frame {
    /// Returns the first value of a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the `subscription` header of a `MESSAGE` frame as an id.
    #[must_use]
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.header("subscription").and_then(SubscriptionId::parse)
    }
}

// ============================================================================
// Frame - Codec
// ============================================================================

impl Frame {
    /// Encodes the frame, including the trailing NUL.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');

        let escape = self.command.escapes_headers();
        for (name, value) in &self.headers {
            push_header_part(&mut out, name, escape);
            out.push(':');
            push_header_part(&mut out, value, escape);
            out.push('\n');
        }

        if !self.body.is_empty() && self.header(CONTENT_LENGTH).is_none() {
            out.push_str(CONTENT_LENGTH);
            out.push(':');
            out.push_str(&self.body.len().to_string());
            out.push('\n');
        }

        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parses exactly one frame from `text`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the text is malformed or incomplete.
    pub fn parse(text: &str) -> Result<Self> {
        let mut decoder = FrameDecoder::new();
        decoder.push(text);
        decoder
            .next_frame()?
            .ok_or_else(|| Error::protocol("incomplete frame"))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        if let Some(destination) = self.header("destination") {
            write!(f, " {destination}")?;
        }
        if let Some(id) = self.header("id").or_else(|| self.header("subscription")) {
            write!(f, " [{id}]")?;
        }
        Ok(())
    }
}

// ============================================================================
// FrameDecoder
// ============================================================================

/// Incremental STOMP decoder.
///
/// Text may arrive split across transport messages or with several frames
/// per message; [`FrameDecoder::next_frame`] yields frames as they complete.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: String,
    /// Largest frame accepted, in bytes, headers included.
    max_frame_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates an empty decoder accepting frames up to
    /// [`DEFAULT_MAX_FRAME_SIZE`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Creates an empty decoder accepting frames up to `max_frame_size` bytes.
    #[inline]
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: String::new(),
            max_frame_size: max_frame_size.max(1),
        }
    }

    /// Returns the frame size limit in bytes.
    #[inline]
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Appends received text.
    #[inline]
    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    /// Returns the number of buffered bytes not yet decoded.
    #[inline]
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes the next complete frame.
    ///
    /// Returns `Ok(None)` when more input is needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] for malformed input or a frame larger
    /// than the size limit. The buffer is discarded so decoding can resume
    /// on the next message.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let heart_beats = self.buffer.len() - self.buffer.trim_start_matches(['\r', '\n']).len();
        if heart_beats > 0 {
            self.buffer.drain(..heart_beats);
        }
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let limit = self.max_frame_size;
        let decoded = match decode_frame(&self.buffer, limit) {
            Ok(Some((_, consumed))) if consumed > limit => Err(oversized(consumed, limit)),
            Ok(None) if self.buffer.len() > limit => Err(oversized(self.buffer.len(), limit)),
            other => other,
        };

        match decoded {
            Ok(Some((frame, consumed))) => {
                self.buffer.drain(..consumed);
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.buffer.clear();
                Err(e)
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn oversized(size: usize, limit: usize) -> Error {
    Error::protocol(format!("frame of {size} bytes exceeds limit of {limit} bytes"))
}

/// Decodes one frame from the start of `buf`, returning bytes consumed.
fn decode_frame(buf: &str, limit: usize) -> Result<Option<(Frame, usize)>> {
    let mut pos = 0;
    let mut lines = Vec::new();
    loop {
        let Some(rel) = buf[pos..].find('\n') else {
            return Ok(None);
        };
        let line = &buf[pos..pos + rel];
        let line = line.strip_suffix('\r').unwrap_or(line);
        pos += rel + 1;
        if line.is_empty() {
            break;
        }
        lines.push(line);
    }

    let (command_line, header_lines) = lines
        .split_first()
        .ok_or_else(|| Error::protocol("frame without command"))?;
    let command = Command::parse(command_line)
        .ok_or_else(|| Error::protocol(format!("unknown command: {command_line}")))?;

    let escaped = command.escapes_headers();
    let mut headers = Vec::with_capacity(header_lines.len());
    for line in header_lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::protocol(format!("malformed header line: {line}")))?;
        if escaped {
            headers.push((unescape(name)?, unescape(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(name, _)| name == CONTENT_LENGTH)
        .map(|(_, value)| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::protocol(format!("invalid content-length: {value}")))
        })
        .transpose()?;

    let (body, consumed) = match content_length {
        Some(length) => {
            if length > limit {
                return Err(oversized(length, limit));
            }
            let end = pos
                .checked_add(length)
                .ok_or_else(|| Error::protocol("content-length overflow"))?;
            if buf.len() <= end {
                return Ok(None);
            }
            let body = buf
                .get(pos..end)
                .ok_or_else(|| Error::protocol("content-length splits a character"))?;
            if buf.as_bytes()[end] != 0 {
                return Err(Error::protocol("frame body not NUL-terminated"));
            }
            (body, end + 1)
        }
        None => {
            let Some(rel) = buf[pos..].find('\0') else {
                return Ok(None);
            };
            (&buf[pos..pos + rel], pos + rel + 1)
        }
    };

    let frame = Frame {
        command,
        headers,
        body: body.to_string(),
    };
    Ok(Some((frame, consumed)))
}

fn push_header_part(out: &mut String, raw: &str, escape: bool) {
    if !escape {
        out.push_str(raw);
        return;
    }
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
}

fn unescape(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some(other) => {
                return Err(Error::protocol(format!(
                    "undefined escape sequence: \\{other}"
                )));
            }
            None => return Err(Error::protocol("dangling escape at end of header")),
        }
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn test_encode_subscribe() {
        let id = SubscriptionId::parse("sub-7").unwrap();
        let frame = Frame::subscribe(id, "/topic/events");
        assert_eq!(
            frame.encode(),
            "SUBSCRIBE\nid:sub-7\ndestination:/topic/events\nack:auto\n\n\0"
        );
    }

    #[test]
    fn test_encode_adds_content_length() {
        let frame = Frame::send("/app/ping", "[1,2]");
        let text = frame.encode();
        assert!(text.contains("content-length:5\n"));
        assert!(text.ends_with("\n\n[1,2]\0"));
    }

    #[test]
    fn test_connect_headers_not_escaped() {
        let frame = Frame::connect("1.2", "localhost:8080", (0, 0));
        let text = frame.encode();
        assert!(text.contains("host:localhost:8080\n"));
        assert!(text.contains("heart-beat:0,0\n"));
    }

    #[test]
    fn test_parse_message() {
        let text = "MESSAGE\nsubscription:sub-3\ndestination:/topic/events\nmessage-id:abc\n\n[{\"a\":1}]\0";
        let frame = Frame::parse(text).unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.header("destination"), Some("/topic/events"));
        assert_eq!(frame.subscription(), SubscriptionId::parse("sub-3"));
        assert_eq!(frame.body, "[{\"a\":1}]");
    }

    #[test]
    fn test_parse_crlf_lines() {
        let text = "CONNECTED\r\nversion:1.2\r\n\r\n\0";
        let frame = Frame::parse(text).unwrap();
        assert_eq!(frame.command, Command::Connected);
        assert_eq!(frame.header("version"), Some("1.2"));
    }

    #[test]
    fn test_repeated_header_first_wins() {
        let text = "MESSAGE\nfoo:first\nfoo:second\n\n\0";
        let frame = Frame::parse(text).unwrap();
        assert_eq!(frame.header("foo"), Some("first"));
        assert_eq!(frame.headers.len(), 2);
    }

    #[test]
    fn test_escaped_header_decoded() {
        let text = "MESSAGE\ndestination:/topic/a\\cb\\\\c\\nd\n\n\0";
        let frame = Frame::parse(text).unwrap();
        assert_eq!(frame.header("destination"), Some("/topic/a:b\\c\nd"));
    }

    #[test]
    fn test_undefined_escape_rejected() {
        let text = "MESSAGE\ndestination:/topic/\\t\n\n\0";
        assert!(matches!(Frame::parse(text), Err(Error::Protocol { .. })));
    }

    #[test]
    fn test_unknown_command_rejected() {
        let err = Frame::parse("HELLO\n\n\0").unwrap_err();
        assert!(err.to_string().contains("unknown command"));
    }

    #[test]
    fn test_content_length_allows_nul_in_body() {
        let text = "MESSAGE\ncontent-length:3\n\na\0b\0";
        let frame = Frame::parse(text).unwrap();
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn test_decoder_skips_heartbeats_and_splits_frames() {
        let mut decoder = FrameDecoder::new();
        decoder.push("\n\r\nRECEIPT\nreceipt-id:1\n\n\0\nMESS");
        let first = decoder.next_frame().unwrap().unwrap();
        assert_eq!(first.command, Command::Receipt);
        assert!(decoder.next_frame().unwrap().is_none());

        decoder.push("AGE\nsubscription:sub-1\n\nhello\0");
        let second = decoder.next_frame().unwrap().unwrap();
        assert_eq!(second.command, Command::Message);
        assert_eq!(second.body, "hello");
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_decoder_waits_for_content_length() {
        let mut decoder = FrameDecoder::new();
        decoder.push("MESSAGE\ncontent-length:10\n\n01234");
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.push("56789\0");
        assert_eq!(decoder.next_frame().unwrap().unwrap().body, "0123456789");
    }

    #[test]
    fn test_decoder_recovers_after_error() {
        let mut decoder = FrameDecoder::new();
        decoder.push("BOGUS\n\n\0");
        assert!(decoder.next_frame().is_err());
        decoder.push("RECEIPT\n\n\0");
        assert_eq!(
            decoder.next_frame().unwrap().unwrap().command,
            Command::Receipt
        );
    }

    #[test]
    fn test_huge_content_length_rejected() {
        let text = "MESSAGE\nsubscription:sub-1\ncontent-length:18446744073709551615\n\nx\0";

        let mut unbounded = FrameDecoder::with_max_frame_size(usize::MAX);
        unbounded.push(text);
        let err = unbounded.next_frame().unwrap_err();
        assert!(err.to_string().contains("content-length overflow"));
        assert_eq!(unbounded.buffered(), 0);

        let mut decoder = FrameDecoder::new();
        decoder.push(text);
        assert!(matches!(decoder.next_frame(), Err(Error::Protocol { .. })));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_unterminated_frame_hits_size_limit() {
        let mut decoder = FrameDecoder::with_max_frame_size(64);
        decoder.push("MESSAGE\nsubscription:sub-1\n\n");
        assert!(decoder.next_frame().unwrap().is_none());

        decoder.push(&"x".repeat(64));
        let err = decoder.next_frame().unwrap_err();
        assert!(err.to_string().contains("exceeds limit of 64 bytes"));
        assert_eq!(decoder.buffered(), 0);

        decoder.push("RECEIPT\nreceipt-id:9\n\n\0");
        assert_eq!(
            decoder.next_frame().unwrap().unwrap().header("receipt-id"),
            Some("9")
        );
    }

    #[test]
    fn test_content_length_over_limit_rejected_early() {
        let mut decoder = FrameDecoder::with_max_frame_size(1024);
        decoder.push("MESSAGE\ncontent-length:4096\n\n0123");
        assert!(matches!(decoder.next_frame(), Err(Error::Protocol { .. })));
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_complete_frame_over_limit_rejected() {
        let mut decoder = FrameDecoder::with_max_frame_size(32);
        decoder.push(&format!("MESSAGE\nsubscription:sub-1\n\n{}\0", "y".repeat(40)));
        assert!(decoder.next_frame().is_err());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_display() {
        let id = SubscriptionId::parse("sub-2").unwrap();
        let frame = Frame::subscribe(id, "/topic/x");
        assert_eq!(frame.to_string(), "SUBSCRIBE /topic/x [sub-2]");
    }

    proptest! {
        #[test]
        fn prop_header_values_survive_escaping(value in "[a-z:\\\\\r\n/ -]{0,24}") {
            let frame = Frame::new(Command::Message)
                .with_header("destination", value.clone())
                .with_body("{}");
            let parsed = Frame::parse(&frame.encode()).unwrap();
            prop_assert_eq!(parsed.header("destination"), Some(value.as_str()));
            prop_assert_eq!(parsed.body, "{}");
        }
    }
}
