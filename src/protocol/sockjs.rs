//! SockJS WebSocket framing.
//!
//! Over the SockJS `websocket` transport, every server message starts with
//! a one-letter type:
//!
//! | Prefix | Meaning |
//! |--------|---------|
//! | `o` | Session open |
//! | `h` | Heartbeat |
//! | `a[...]` | JSON array of messages |
//! | `m"..."` | Single JSON-encoded message |
//! | `c[code,"reason"]` | Session closed |
//!
//! Client messages are JSON arrays of strings.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{from_str, to_string};

use crate::error::{Error, Result};

// ============================================================================
// SockJsFrame
// ============================================================================

/// A decoded SockJS server message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockJsFrame {
    /// Session opened.
    Open,
    /// Keep-alive.
    Heartbeat,
    /// One or more application messages.
    Messages(Vec<String>),
    /// Session closed by the server.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

impl SockJsFrame {
    /// Parses a SockJS text message.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] for an empty message or unknown prefix
    /// - [`Error::Json`] if the payload after the prefix is not valid JSON
    pub fn parse(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let prefix = chars
            .next()
            .ok_or_else(|| Error::protocol("empty SockJS message"))?;
        let payload = chars.as_str();

        match prefix {
            'o' => Ok(Self::Open),
            'h' => Ok(Self::Heartbeat),
            'a' => Ok(Self::Messages(from_str::<Vec<String>>(payload)?)),
            'm' => Ok(Self::Messages(vec![from_str::<String>(payload)?])),
            'c' => {
                let (code, reason) = from_str::<(u16, String)>(payload)?;
                Ok(Self::Close { code, reason })
            }
            other => Err(Error::protocol(format!(
                "unknown SockJS frame type: {other}"
            ))),
        }
    }
}

/// Encodes outbound messages as a SockJS JSON array.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn encode_messages(messages: &[String]) -> Result<String> {
    Ok(to_string(messages)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_control_frames() {
        assert_eq!(SockJsFrame::parse("o").unwrap(), SockJsFrame::Open);
        assert_eq!(SockJsFrame::parse("h").unwrap(), SockJsFrame::Heartbeat);
    }

    #[test]
    fn test_parse_array() {
        let frame = SockJsFrame::parse(r#"a["CONNECTED\nversion:1.2\n\n\u0000"]"#).unwrap();
        assert_eq!(
            frame,
            SockJsFrame::Messages(vec!["CONNECTED\nversion:1.2\n\n\0".to_string()])
        );
    }

    #[test]
    fn test_parse_single_message() {
        let frame = SockJsFrame::parse(r#"m"hello""#).unwrap();
        assert_eq!(frame, SockJsFrame::Messages(vec!["hello".to_string()]));
    }

    #[test]
    fn test_parse_close() {
        let frame = SockJsFrame::parse(r#"c[3000,"Go away!"]"#).unwrap();
        assert_eq!(
            frame,
            SockJsFrame::Close {
                code: 3000,
                reason: "Go away!".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(matches!(
            SockJsFrame::parse("x[]"),
            Err(Error::Protocol { .. })
        ));
        assert!(SockJsFrame::parse("").is_err());
        assert!(matches!(SockJsFrame::parse("a[1"), Err(Error::Json(_))));
    }

    #[test]
    fn test_encode_messages() {
        let encoded = encode_messages(&["SEND\n\n\0".to_string()]).unwrap();
        assert_eq!(encoded, r#"["SEND\n\n\u0000"]"#);
    }
}
