//! Recoverable protocol issues found while decoding a control mode line
//!
//! Nothing in the decoder is fatal. Malformed identifiers and unknown escape
//! sequences are recorded as [`Diagnostic`]s, handed to a [`DiagnosticSink`],
//! and decoding carries on with a best-effort result.

use serde::Serialize;
use std::fmt;

/// Kind of recoverable issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    /// An identifier field held no digits
    MalformedId,
    /// A backslash was followed by a byte that is not an octal digit
    UnrecognizedEscape,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::MalformedId => f.write_str("malformed-id"),
            DiagnosticKind::UnrecognizedEscape => f.write_str("unrecognized-escape"),
        }
    }
}

/// A single recoverable issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Byte offset of the offending field or escape
    pub offset: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn malformed_id(offset: usize, field: &[u8]) -> Self {
        Self {
            kind: DiagnosticKind::MalformedId,
            offset,
            message: format!(
                "could not parse identifier from \"{}\"",
                String::from_utf8_lossy(field)
            ),
        }
    }

    pub fn unrecognized_escape(offset: usize, introducer: u8) -> Self {
        Self {
            kind: DiagnosticKind::UnrecognizedEscape,
            offset,
            message: format!(
                "unrecognized escape sequence: \\{}",
                introducer.escape_ascii()
            ),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}: {}", self.kind, self.offset, self.message)
    }
}

/// Receiver for diagnostics (adapter pattern).
///
/// `Vec<Diagnostic>` collects them; [`IgnoreDiagnostics`] drops them. Every
/// diagnostic is also logged through `tracing` at the point it is detected,
/// so a sink only needs to care about structured handling.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreDiagnostics;

impl DiagnosticSink for IgnoreDiagnostics {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}
