//! Tmux Control Mode decoding
//!
//! Turns the line protocol of `tmux -C` into typed events.
//!
//! ## Key components:
//! - `decoder` - Split one line into command, fields and remainder
//! - `octal` - Decode tmux's octal escape sequences
//! - `diagnostics` - Recoverable protocol issues
//! - `grammar` - Field layout of each notification
//! - `parser` - Parse control mode notifications
//! - `connection` - Frame lines from a stream or a `tmux -C` subprocess

mod connection;
mod decoder;
mod diagnostics;
pub mod grammar;
mod octal;
mod parser;

pub use connection::{
    spawn_reader_task, ConnectionError, ControlModeConnection, ParsedLine, CHANNEL_CAPACITY,
};
pub use decoder::{
    parse_object_id, Decoder, DecoderConfig, IdKind, ObjectId, DEFAULT_DELIMITER,
};
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, IgnoreDiagnostics};
pub use octal::decode_remainder;
pub use parser::{ControlModeEvent, ParseError, Parser};
