//! Field decoder for a single control mode line
//!
//! A line is a command token, a list of delimiter-separated fields and an
//! optional octal-escaped remainder:
//!
//! ```text
//! %output %3 hello\015\012
//! ^^^^^^^ ^^ ^^^^^^^^^^^^^
//! command id remainder
//! ```
//!
//! The caller knows the field layout of each command and consumes the fields
//! in order with [`Decoder::pop`], [`Decoder::pop_id`] and
//! [`Decoder::remainder`]. Consumption only ever moves forward.

use super::diagnostics::Diagnostic;
use super::octal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use tracing::warn;

/// Field delimiter used by tmux control mode
pub const DEFAULT_DELIMITER: u8 = b' ';

/// Decoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Byte separating fields
    pub delimiter: u8,

    /// Whether the line starts with a command token
    pub split_command: bool,

    /// Remove `ESC k <title> ESC` spans from decoded remainders
    pub strip_title_escapes: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            split_command: true,
            strip_title_escapes: true,
        }
    }
}

/// Kind of object an identifier sigil refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    /// `@` prefix
    Window,
    /// `%` prefix
    Pane,
}

impl IdKind {
    pub fn sigil(self) -> u8 {
        match self {
            IdKind::Window => b'@',
            IdKind::Pane => b'%',
        }
    }

    pub fn from_sigil(byte: u8) -> Option<Self> {
        match byte {
            b'@' => Some(IdKind::Window),
            b'%' => Some(IdKind::Pane),
            _ => None,
        }
    }
}

/// A multiplexer object identifier such as `@4` or `%12`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectId {
    pub kind: Option<IdKind>,
    pub value: i64,
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = self.kind {
            write!(f, "{}", char::from(kind.sigil()))?;
        }
        write!(f, "{}", self.value)
    }
}

/// Parse an identifier field: an optional `@`/`%` sigil and a decimal number.
///
/// Bytes after the digits are ignored. Returns `None` if there are no digits.
pub fn parse_object_id(field: &[u8]) -> Option<ObjectId> {
    scan_object_id(field).map(|(id, _)| id)
}

/// Like [`parse_object_id`], also returning how many bytes the id spans.
fn scan_object_id(field: &[u8]) -> Option<(ObjectId, usize)> {
    let (kind, digits) = match field.split_first() {
        Some((&first, rest)) => match IdKind::from_sigil(first) {
            Some(kind) => (Some(kind), rest),
            None => (None, field),
        },
        None => (None, field),
    };

    let sigil_len = field.len() - digits.len();
    scan_decimal(digits).map(|(value, len)| (ObjectId { kind, value }, sigil_len + len))
}

/// Parse a leading, optionally signed, decimal integer. Saturates on overflow.
pub(crate) fn parse_decimal(bytes: &[u8]) -> Option<i64> {
    scan_decimal(bytes).map(|(value, _)| value)
}

fn scan_decimal(bytes: &[u8]) -> Option<(i64, usize)> {
    let (negative, digits) = match bytes.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', rest)) => (false, rest),
        _ => (false, bytes),
    };

    let len = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if len == 0 {
        return None;
    }

    let magnitude = digits[..len].iter().fold(0i64, |acc, &d| {
        acc.saturating_mul(10).saturating_add(i64::from(d - b'0'))
    });
    let value = if negative { magnitude.saturating_neg() } else { magnitude };

    Some((value, bytes.len() - digits.len() + len))
}

/// Cursor over one owned control mode line
#[derive(Debug, Clone)]
pub struct Decoder {
    buffer: Vec<u8>,
    delimiter: u8,
    /// The command is `buffer[..command_end]`
    command_end: usize,
    /// Start of the next unconsumed field, `None` once the line is used up
    cursor: Option<usize>,
    strip_title_escapes: bool,
    diagnostics: Vec<Diagnostic>,
}

impl Decoder {
    /// Take ownership of `line` and split off the command token.
    ///
    /// Without a delimiter in the line, the whole line is the command and
    /// there are no fields. With `split_command` unset, the command is empty
    /// and fields start at the first byte.
    pub fn new(line: impl Into<Vec<u8>>, config: DecoderConfig) -> Self {
        let buffer = line.into();

        let (command_end, cursor) = if config.split_command {
            match buffer.iter().position(|&b| b == config.delimiter) {
                Some(pos) => (pos, Some(pos + 1)),
                None => (buffer.len(), None),
            }
        } else {
            (0, Some(0))
        };

        Self {
            buffer,
            delimiter: config.delimiter,
            command_end,
            cursor,
            strip_title_escapes: config.strip_title_escapes,
            diagnostics: Vec::new(),
        }
    }

    /// The command token, e.g. `%output`
    pub fn command(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.command_bytes())
    }

    pub fn command_bytes(&self) -> &[u8] {
        &self.buffer[..self.command_end]
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Whether every field has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }

    /// Skip the current field. Does nothing once exhausted.
    pub fn pop(&mut self) {
        if let Some(start) = self.cursor {
            let end = self.field_end(start);
            self.skip_to(end);
        }
    }

    /// Consume the current field and return its bytes.
    pub fn pop_field(&mut self) -> Option<&[u8]> {
        let start = self.cursor?;
        let end = self.field_end(start);
        self.skip_to(end);
        Some(&self.buffer[start..end])
    }

    /// Consume an identifier at the cursor, e.g. `@3` or `%12`.
    ///
    /// The cursor stops right after the digits, skipping one delimiter if it
    /// comes next. Without digits the cursor stays put, a malformed-id
    /// diagnostic is reported and 0 is returned, as for an exhausted line.
    pub fn pop_id(&mut self) -> i64 {
        self.pop_object_id().map_or(0, |id| id.value)
    }

    /// Like [`Decoder::pop_id`], keeping the sigil and telling a malformed or
    /// missing field apart from a real 0.
    pub fn pop_object_id(&mut self) -> Option<ObjectId> {
        let start = self.cursor?;
        let end = self.field_end(start);

        match scan_object_id(&self.buffer[start..end]) {
            Some((id, len)) => {
                self.skip_to(start + len);
                Some(id)
            }
            None => {
                self.report_malformed_id(start, end);
                None
            }
        }
    }

    /// Consume the whole current field as an identifier.
    ///
    /// Trailing bytes and malformed fields go with the field, so the next
    /// field stays aligned. Returns the raw field and the parsed id.
    pub fn pop_id_field(&mut self) -> Option<(&[u8], Option<ObjectId>)> {
        let start = self.cursor?;
        let end = self.field_end(start);
        self.skip_to(end);

        let id = parse_object_id(&self.buffer[start..end]);
        if id.is_none() {
            self.report_malformed_id(start, end);
        }
        Some((&self.buffer[start..end], id))
    }

    /// Consume the rest of the line and decode its octal escapes.
    ///
    /// Returns `None` if the line was already exhausted.
    pub fn remainder(&mut self) -> Option<Vec<u8>> {
        let start = self.cursor.take()?;
        Some(octal::decode_at(
            &self.buffer[start..],
            start,
            self.strip_title_escapes,
            &mut self.diagnostics,
        ))
    }

    /// Diagnostics reported so far
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn field_end(&self, start: usize) -> usize {
        self.buffer[start..]
            .iter()
            .position(|&b| b == self.delimiter)
            .map_or(self.buffer.len(), |pos| start + pos)
    }

    fn report_malformed_id(&mut self, start: usize, end: usize) {
        let field = &self.buffer[start..end];
        warn!(
            offset = start,
            "could not parse identifier from \"{}\"",
            field.escape_ascii()
        );
        self.diagnostics.push(Diagnostic::malformed_id(start, field));
    }

    /// Move the cursor to `pos`, past the delimiter if one is there.
    fn skip_to(&mut self, pos: usize) {
        self.cursor = match self.buffer.get(pos) {
            Some(&b) if b == self.delimiter => Some(pos + 1),
            Some(_) => Some(pos),
            None => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_mode::diagnostics::DiagnosticKind;
    use pretty_assertions::assert_eq;

    fn colon() -> DecoderConfig {
        DecoderConfig {
            delimiter: b':',
            ..DecoderConfig::default()
        }
    }

    #[test]
    fn test_command_split() {
        let decoder = Decoder::new("%window-add @3", DecoderConfig::default());
        assert_eq!(decoder.command(), "%window-add");
        assert!(!decoder.is_exhausted());
    }

    #[test]
    fn test_command_without_fields() {
        let decoder = Decoder::new("%sessions-changed", DecoderConfig::default());
        assert_eq!(decoder.command(), "%sessions-changed");
        assert!(decoder.is_exhausted());
    }

    #[test]
    fn test_no_command() {
        let config = DecoderConfig {
            split_command: false,
            ..colon()
        };
        let mut decoder = Decoder::new("@1:%2", config);
        assert_eq!(decoder.command(), "");
        assert_eq!(decoder.pop_id(), 1);
        assert_eq!(decoder.pop_id(), 2);
        assert!(decoder.is_exhausted());
    }

    #[test]
    fn test_command_stable_across_pops() {
        let mut decoder = Decoder::new("cmd:a:b:c", colon());
        for _ in 0..5 {
            decoder.pop();
            assert_eq!(decoder.command(), "cmd");
        }
    }

    #[test]
    fn test_pop_exhausts_after_each_field() {
        // Three delimiters in the line, three pops
        let mut decoder = Decoder::new("cmd:a:bb:ccc", colon());
        decoder.pop();
        decoder.pop();
        assert!(!decoder.is_exhausted());
        decoder.pop();
        assert!(decoder.is_exhausted());

        // Further pops are harmless
        decoder.pop();
        assert!(decoder.is_exhausted());
        assert_eq!(decoder.remainder(), None);
    }

    #[test]
    fn test_pop_field() {
        let mut decoder = Decoder::new("cmd:a::c", colon());
        assert_eq!(decoder.pop_field(), Some(&b"a"[..]));
        assert_eq!(decoder.pop_field(), Some(&b""[..]));
        assert_eq!(decoder.pop_field(), Some(&b"c"[..]));
        assert_eq!(decoder.pop_field(), None);
    }

    #[test]
    fn test_trailing_delimiter_leaves_empty_field() {
        let mut decoder = Decoder::new("cmd:a:", colon());
        decoder.pop();
        assert!(!decoder.is_exhausted());
        assert_eq!(decoder.remainder(), Some(Vec::new()));
        assert!(decoder.is_exhausted());
    }

    #[test]
    fn test_pop_id_with_sigils() {
        let mut decoder = Decoder::new("cmd:@42:%7:9", colon());
        assert_eq!(decoder.pop_id(), 42);
        assert_eq!(decoder.pop_id(), 7);
        assert_eq!(decoder.pop_id(), 9);
        assert!(decoder.is_exhausted());
        assert!(decoder.diagnostics().is_empty());
    }

    #[test]
    fn test_pop_object_id_keeps_kind() {
        let mut decoder = Decoder::new("%window-pane-changed @1 %5", DecoderConfig::default());
        let window = decoder.pop_object_id();
        let pane = decoder.pop_object_id();

        assert_eq!(
            window,
            Some(ObjectId {
                kind: Some(IdKind::Window),
                value: 1
            })
        );
        assert_eq!(pane.map(|id| id.to_string()), Some("%5".to_string()));
    }

    #[test]
    fn test_pop_id_malformed() {
        let mut decoder = Decoder::new("cmd:abc:@3", colon());
        assert_eq!(decoder.pop_id(), 0);

        let diagnostics = decoder.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::MalformedId);
        assert_eq!(diagnostics[0].offset, 4);

        // Nothing was consumed
        assert_eq!(decoder.remainder(), Some(b"abc:@3".to_vec()));
    }

    #[test]
    fn test_pop_id_sigil_only() {
        let mut decoder = Decoder::new("cmd @", DecoderConfig::default());
        assert_eq!(decoder.pop_object_id(), None);
        assert_eq!(decoder.take_diagnostics().len(), 1);
        assert!(decoder.diagnostics().is_empty());
        assert!(!decoder.is_exhausted());
    }

    #[test]
    fn test_pop_id_stops_after_digits() {
        let mut decoder = Decoder::new("cmd:12ab:rest", colon());
        assert_eq!(decoder.pop_id(), 12);
        assert_eq!(decoder.remainder(), Some(b"ab:rest".to_vec()));
    }

    #[test]
    fn test_pop_id_at_end_of_line_exhausts() {
        let mut decoder = Decoder::new("cmd:%7", colon());
        assert_eq!(decoder.pop_id(), 7);
        assert!(decoder.is_exhausted());

        let mut decoder = Decoder::new("cmd:%7:", colon());
        assert_eq!(decoder.pop_id(), 7);
        assert_eq!(decoder.remainder(), Some(Vec::new()));
    }

    #[test]
    fn test_pop_id_field_consumes_whole_field() {
        let mut decoder = Decoder::new("cmd:12ab:abc:@3", colon());

        let (field, id) = decoder.pop_id_field().expect("field present");
        assert_eq!(field, b"12ab");
        assert_eq!(id.map(|id| id.value), Some(12));

        let (field, id) = decoder.pop_id_field().expect("field present");
        assert_eq!(field, b"abc");
        assert_eq!(id, None);

        assert_eq!(decoder.pop_id(), 3);
        assert!(decoder.pop_id_field().is_none());
        assert_eq!(decoder.take_diagnostics().len(), 1);
    }

    #[test]
    fn test_pop_id_when_exhausted() {
        let mut decoder = Decoder::new("cmd", colon());
        assert_eq!(decoder.pop_id(), 0);
        assert_eq!(decoder.pop_object_id(), None);
        assert!(decoder.diagnostics().is_empty());
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(b"123"), Some(123));
        assert_eq!(parse_decimal(b"-5"), Some(-5));
        assert_eq!(parse_decimal(b"+5"), Some(5));
        assert_eq!(parse_decimal(b"-"), None);
        assert_eq!(parse_decimal(b""), None);
        assert_eq!(parse_decimal(b"99999999999999999999"), Some(i64::MAX));
    }

    #[test]
    fn test_remainder_decodes() {
        let mut decoder = Decoder::new(r"%output %1 \033[0mHello", DecoderConfig::default());
        assert_eq!(decoder.pop_id(), 1);
        assert_eq!(decoder.remainder(), Some(b"\x1b[0mHello".to_vec()));
        assert!(decoder.is_exhausted());
        assert_eq!(decoder.remainder(), None);
    }

    #[test]
    fn test_remainder_keeps_delimiters() {
        let mut decoder = Decoder::new("%output %1 a b  c", DecoderConfig::default());
        decoder.pop();
        assert_eq!(decoder.remainder(), Some(b"a b  c".to_vec()));
    }

    #[test]
    fn test_remainder_title_stripping_follows_config() {
        let line = r"%output %1 A\033kTITLE\033B";

        let mut stripped = Decoder::new(line, DecoderConfig::default());
        stripped.pop();
        assert_eq!(stripped.remainder(), Some(b"AB".to_vec()));

        let config = DecoderConfig {
            strip_title_escapes: false,
            ..DecoderConfig::default()
        };
        let mut kept = Decoder::new(line, config);
        kept.pop();
        assert_eq!(kept.remainder(), Some(b"A\x1bkTITLE\x1bB".to_vec()));
    }

    #[test]
    fn test_remainder_diagnostic_offsets_are_line_relative() {
        let mut decoder = Decoder::new(r"%output %1 A\xZ", DecoderConfig::default());
        decoder.pop();
        assert_eq!(decoder.remainder(), Some(b"AZ".to_vec()));

        let diagnostics = decoder.take_diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::UnrecognizedEscape);
        assert_eq!(diagnostics[0].offset, 12);
    }

    #[test]
    fn test_non_utf8_command_is_lossy() {
        let decoder = Decoder::new(b"%o\xffput x".to_vec(), DecoderConfig::default());
        assert_eq!(decoder.command_bytes(), b"%o\xffput");
        assert_eq!(decoder.command(), "%o\u{fffd}put");
    }

    #[test]
    fn test_config_deserialize_defaults() {
        let config: DecoderConfig = serde_json::from_str(r#"{"strip_title_escapes": false}"#)
            .expect("valid config");
        assert_eq!(config.delimiter, b' ');
        assert!(config.split_command);
        assert!(!config.strip_title_escapes);
    }
}
