//! JSON lines output

use muxwire_core::control_mode::ParsedLine;
use serde_json::json;
use std::io::Write;

/// Write one parsed line as a JSON object followed by a newline.
///
/// Events are written as-is, diagnostics are wrapped in a
/// `{"type": "diagnostic"}` object. Parse errors are only logged.
pub fn write_parsed<W: Write>(out: &mut W, parsed: &ParsedLine) -> std::io::Result<()> {
    match parsed {
        ParsedLine::Event(event) => serde_json::to_writer(&mut *out, event)?,
        ParsedLine::Diagnostic(diagnostic) => serde_json::to_writer(
            &mut *out,
            &json!({ "type": "diagnostic", "diagnostic": diagnostic }),
        )?,
        ParsedLine::Error(_) => return Ok(()),
    }
    writeln!(out)
}
