//! STOMP 1.2 text frame codec.
//!
//! One WebSocket text message carries one frame, or a bare end-of-line as a
//! heart-beat. Only the subset of STOMP the session loop understands is
//! modelled.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const STOMP_VERSION: &str = "1.2";

/// Frame command, client and server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
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
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED headers are never escaped.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Command {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Malformed header line: {0}")]
    InvalidHeader(String),

    #[error("Invalid escape sequence in header: {0}")]
    InvalidEscape(String),

    #[error("Invalid content-length: {0}")]
    InvalidContentLength(String),

    #[error("Frame is not NUL-terminated")]
    MissingTerminator,

    #[error("Missing required header: {0}")]
    MissingHeader(&'static str),
}

/// Decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Heartbeat,
    Frame(Frame),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header. Repeated headers after the first are ignored.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn require_header(&self, name: &'static str) -> Result<&str, FrameError> {
        self.header(name).ok_or(FrameError::MissingHeader(name))
    }

    pub fn destination(&self) -> Option<&str> {
        self.header("destination")
    }

    pub fn receipt(&self) -> Option<&str> {
        self.header("receipt")
    }

    /// Server ERROR frame with a short message header and detail body.
    pub fn error(message: &str, detail: impl Into<String>) -> Self {
        Frame::new(Command::Error)
            .with_header("message", message)
            .with_header("content-type", "text/plain")
            .with_body(detail)
    }

    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        let escape = self.command.escapes_headers();
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        if !self.body.is_empty() && self.header("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    pub fn parse(text: &str) -> Result<Inbound, FrameError> {
        let text = text.trim_start_matches(['\r', '\n']);
        if text.is_empty() {
            return Ok(Inbound::Heartbeat);
        }

        let (head, rest) = split_line(text);
        let command: Command = head.parse()?;
        let escape = command.escapes_headers();

        let mut headers = Vec::new();
        let mut rest = rest.ok_or(FrameError::MissingTerminator)?;
        loop {
            let (line, next) = split_line(rest);
            let next = next.ok_or(FrameError::MissingTerminator)?;
            if line.is_empty() {
                rest = next;
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| FrameError::InvalidHeader(line.to_string()))?;
            if escape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
            rest = next;
        }

        let frame_len = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.parse::<usize>()
                    .map_err(|_| FrameError::InvalidContentLength(v.clone()))
            })
            .transpose()?;

        let (body, trailer) = match frame_len {
            Some(len) => {
                if rest.len() <= len || !rest.is_char_boundary(len) || rest.as_bytes()[len] != 0 {
                    return Err(FrameError::MissingTerminator);
                }
                (&rest[..len], &rest[len + 1..])
            }
            None => rest.split_once('\0').ok_or(FrameError::MissingTerminator)?,
        };
        if !trailer.trim_matches(['\r', '\n']).is_empty() {
            return Err(FrameError::MissingTerminator);
        }

        let frame = Frame {
            command,
            headers,
            body: body.to_string(),
        };
        frame.check_required_headers()?;
        Ok(Inbound::Frame(frame))
    }

    /// Headers a client frame cannot do without.
    fn check_required_headers(&self) -> Result<(), FrameError> {
        let required: &[&'static str] = match self.command {
            Command::Subscribe => &["destination", "id"],
            Command::Unsubscribe => &["id"],
            Command::Send => &["destination"],
            _ => &[],
        };
        for &name in required {
            self.require_header(name)?;
        }
        Ok(())
    }
}

/// Split off one line, accepting LF or CRLF endings.
fn split_line(text: &str) -> (&str, Option<&str>) {
    match text.split_once('\n') {
        Some((line, rest)) => (line.strip_suffix('\r').unwrap_or(line), Some(rest)),
        None => (text, None),
    }
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(raw.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(text: &str) -> Frame {
        match Frame::parse(text).unwrap() {
            Inbound::Frame(frame) => frame,
            Inbound::Heartbeat => panic!("expected a frame"),
        }
    }

    #[test]
    fn parses_subscribe() {
        let f = frame("SUBSCRIBE\nid:sub-0\ndestination:/topic/projects/1/tasks/2/comments\n\n\0");
        assert_eq!(f.command, Command::Subscribe);
        assert_eq!(f.header("id"), Some("sub-0"));
        assert_eq!(f.destination(), Some("/topic/projects/1/tasks/2/comments"));
        assert!(f.body.is_empty());
    }

    #[test]
    fn bare_newlines_are_heartbeats() {
        assert_eq!(Frame::parse("\n").unwrap(), Inbound::Heartbeat);
        assert_eq!(Frame::parse("\r\n").unwrap(), Inbound::Heartbeat);
    }

    #[test]
    fn crlf_and_leading_eol_are_accepted() {
        let f = frame("\nCONNECT\r\naccept-version:1.2\r\nAuthorization:Bearer a.b:c\r\n\r\n\0\n");
        assert_eq!(f.command, Command::Connect);
        // CONNECT headers are not unescaped; the first colon splits.
        assert_eq!(f.header("Authorization"), Some("Bearer a.b:c"));
    }

    #[test]
    fn first_repeated_header_wins() {
        let f = frame("SEND\ndestination:/a\ndestination:/b\n\nhi\0");
        assert_eq!(f.destination(), Some("/a"));
        assert_eq!(f.body, "hi");
    }

    #[test]
    fn content_length_allows_embedded_nul() {
        let f = frame("SEND\ndestination:/a\ncontent-length:3\n\na\0b\0");
        assert_eq!(f.body, "a\0b");
    }

    #[test]
    fn escaped_headers_round_trip_through_encode() {
        let out = Frame::new(Command::Message)
            .with_header("destination", "/topic/a:b")
            .with_body("{}")
            .encode();
        assert!(out.contains("destination:/topic/a\\cb\n"));
        assert!(out.contains("content-length:2\n"));
        assert!(out.ends_with("\n\n{}\0"));
        let back = frame(&out);
        assert_eq!(back.destination(), Some("/topic/a:b"));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(
            Frame::parse("HELLO\n\n\0"),
            Err(FrameError::UnknownCommand(_))
        ));
        assert_eq!(
            Frame::parse("SUBSCRIBE\nid:1\n\n"),
            Err(FrameError::MissingTerminator)
        );
        assert!(matches!(
            Frame::parse("SUBSCRIBE\nnocolon\n\n\0"),
            Err(FrameError::InvalidHeader(_))
        ));
        assert!(matches!(
            Frame::parse("SUBSCRIBE\nid:a\\tb\n\n\0"),
            Err(FrameError::InvalidEscape(_))
        ));
        assert!(matches!(
            Frame::parse("SEND\ncontent-length:x\n\n\0"),
            Err(FrameError::InvalidContentLength(_))
        ));
    }

    #[test]
    fn required_headers_are_enforced() {
        assert_eq!(
            Frame::parse("SUBSCRIBE\nid:sub-0\n\n\0"),
            Err(FrameError::MissingHeader("destination"))
        );
        assert_eq!(
            Frame::parse("SUBSCRIBE\ndestination:/topic/projects/1/tasks/2/comments\n\n\0"),
            Err(FrameError::MissingHeader("id"))
        );
        assert_eq!(
            Frame::parse("UNSUBSCRIBE\n\n\0"),
            Err(FrameError::MissingHeader("id"))
        );
        assert_eq!(
            Frame::parse("SEND\n\nhi\0"),
            Err(FrameError::MissingHeader("destination"))
        );
        assert!(Frame::parse("DISCONNECT\n\n\0").is_ok());
    }
}
