//! IRC line parsing and formatting.
//!
//! Implements the RFC 1459 message grammar:
//!
//! ```text
//! [@tags] [:prefix] COMMAND [param ...] [:trailing]
//! ```
//!
//! IRCv3 tags are accepted and discarded.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

// ============================================================================
// Message
// ============================================================================

/// A parsed IRC message.
///
/// Serializes to `{ "prefix", "command", "args" }`, which is also the shape
/// of the raw message object appended to emitted events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Source of the message (`nick!user@host` or a server name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Command name or three-digit numeric.
    pub command: String,

    /// Parameters, trailing parameter last.
    #[serde(rename = "args")]
    pub params: Vec<String>,
}

impl Message {
    /// Creates an outbound message without prefix.
    #[must_use]
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            prefix: None,
            command: command.into(),
            params,
        }
    }

    /// Parses one line received from the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the line has no command.
    pub fn parse(line: &str) -> Result<Self> {
        let mut rest = line.trim_end_matches(['\r', '\n']);

        if rest.starts_with('@') {
            rest = rest.split_once(' ').map_or("", |(_, r)| r);
        }
        rest = rest.trim_start_matches(' ');

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, r) = stripped.split_once(' ').unwrap_or((stripped, ""));
            prefix = Some(p.to_owned());
            rest = r.trim_start_matches(' ');
        }

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(Error::protocol(format!("missing command in line: {line:?}")));
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_owned());
                break;
            }
            let (param, r) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_owned());
            rest = r;
        }

        Ok(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Returns the nickname part of a user prefix.
    ///
    /// Server prefixes (no `!`/`@`, containing a `.`) yield `None`.
    #[must_use]
    pub fn nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        match prefix.find(['!', '@']) {
            Some(end) => Some(&prefix[..end]),
            None if prefix.contains('.') => None,
            None => Some(prefix),
        }
    }

    /// Returns a parameter by position.
    #[inline]
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Returns the numeric reply code, if the command is numeric.
    #[must_use]
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Returns `true` for error numerics (400-599).
    #[inline]
    #[must_use]
    pub fn is_error_reply(&self) -> bool {
        matches!(self.numeric(), Some(400..=599))
    }

    /// Returns the message as a JSON value for event arguments.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// Removes characters that would let a parameter break out of its line.
fn sanitize(param: &str) -> String {
    param.chars().filter(|c| !matches!(c, '\r' | '\n' | '\0')).collect()
}

impl fmt::Display for Message {
    /// Formats the message as a wire line, without the trailing CRLF.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }
        f.write_str(&self.command)?;

        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            let param = sanitize(param);
            let needs_colon =
                i == last && (param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if needs_colon {
                write!(f, " :{param}")?;
            } else {
                write!(f, " {param}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg() {
        let msg = Message::parse(":bob!b@host PRIVMSG #rust :hello there\r\n").unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("bob!b@host"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#rust", "hello there"]);
        assert_eq!(msg.nick(), Some("bob"));
    }

    #[test]
    fn test_parse_without_prefix() {
        let msg = Message::parse("PING :irc.example.org").unwrap();
        assert_eq!(msg.prefix, None);
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.param(0), Some("irc.example.org"));
    }

    #[test]
    fn test_parse_tags_discarded() {
        let msg = Message::parse("@time=2024-01-01T00:00:00Z :a!b@c JOIN #rust").unwrap();
        assert_eq!(msg.command, "JOIN");
        assert_eq!(msg.params, vec!["#rust"]);
    }

    #[test]
    fn test_parse_numeric() {
        let msg =
            Message::parse(":irc.example.org 433 * alice :Nickname is already in use").unwrap();
        assert_eq!(msg.numeric(), Some(433));
        assert!(msg.is_error_reply());
        assert_eq!(msg.nick(), None);
        assert_eq!(msg.params.len(), 3);
    }

    #[test]
    fn test_parse_empty_trailing() {
        let msg = Message::parse(":a!b@c TOPIC #rust :").unwrap();
        assert_eq!(msg.params, vec!["#rust", ""]);
    }

    #[test]
    fn test_parse_empty_line_rejected() {
        assert!(Message::parse("\r\n").is_err());
        assert!(Message::parse(":prefix.only").is_err());
    }

    #[test]
    fn test_format_trailing() {
        let msg = Message::new("PRIVMSG", vec!["#rust".into(), "hi all".into()]);
        assert_eq!(msg.to_string(), "PRIVMSG #rust :hi all");

        let msg = Message::new("NICK", vec!["alice".into()]);
        assert_eq!(msg.to_string(), "NICK alice");

        let msg = Message::new("QUIT", vec![String::new()]);
        assert_eq!(msg.to_string(), "QUIT :");
    }

    #[test]
    fn test_format_strips_line_breaks() {
        let msg = Message::new("PRIVMSG", vec!["#rust".into(), "a\r\nQUIT :x".into()]);
        assert_eq!(msg.to_string(), "PRIVMSG #rust :aQUIT :x");
    }

    #[test]
    fn test_to_value() {
        let msg = Message::parse(":srv.example 401 me bob :No such nick").unwrap();
        let value = msg.to_value();
        assert_eq!(value["command"], "401");
        assert_eq!(value["prefix"], "srv.example");
        assert_eq!(value["args"][1], "bob");
    }
}
