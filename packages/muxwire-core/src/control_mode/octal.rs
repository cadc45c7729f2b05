//! Octal escape decoder for tmux control mode payloads
//!
//! Tmux escapes bytes below 32 and backslash as `\xxx`, where `xxx` is an
//! octal number. Decoding turns control escapes back into raw bytes so a
//! terminal emulator can act on them, while printable escapes are left in
//! their textual form. For example `\033` -> ESC (0x1b), `\134` -> backslash,
//! but `\101` stays as the four bytes `\101`.

use super::diagnostics::{Diagnostic, DiagnosticSink};
use tracing::warn;

const ESC: u8 = 0x1b;

/// Decode the escaped remainder of a control mode line.
///
/// When `strip_title_escapes` is set, any `ESC k <title> ESC` span (the
/// tmux "set window title" sequence) is removed from the output.
///
/// # Examples
/// ```
/// use muxwire_core::control_mode::{decode_remainder, IgnoreDiagnostics};
///
/// assert_eq!(
///     decode_remainder(br"\033[0m", false, &mut IgnoreDiagnostics),
///     vec![0x1b, b'[', b'0', b'm']
/// );
/// assert_eq!(decode_remainder(br"\134", false, &mut IgnoreDiagnostics), vec![b'\\']);
/// assert_eq!(decode_remainder(br"\101", false, &mut IgnoreDiagnostics), br"\101".to_vec());
/// ```
pub fn decode_remainder<S>(input: &[u8], strip_title_escapes: bool, sink: &mut S) -> Vec<u8>
where
    S: DiagnosticSink + ?Sized,
{
    decode_at(input, 0, strip_title_escapes, sink)
}

/// Same as [`decode_remainder`], reporting offsets relative to `base`.
pub(crate) fn decode_at<S>(
    input: &[u8],
    base: usize,
    strip_title_escapes: bool,
    sink: &mut S,
) -> Vec<u8>
where
    S: DiagnosticSink + ?Sized,
{
    // Every escape produces at most as many bytes as it consumes.
    let mut out = Output::new(input.len(), strip_title_escapes);
    let mut i = 0;

    while i < input.len() {
        if input[i] != b'\\' {
            out.push(input[i]);
            i += 1;
            continue;
        }

        let escape_start = i;
        i += 1;

        match input.get(i) {
            None => out.push(b'\\'),
            Some(&digit) if is_octal_digit(digit) => {
                let digits_start = i;
                let mut value: u8 = 0;
                while i < input.len() && i - digits_start < 3 && is_octal_digit(input[i]) {
                    value = value.wrapping_mul(8).wrapping_add(input[i] - b'0');
                    i += 1;
                }

                if value >= b' ' && value != b'\\' {
                    out.push_text(&input[escape_start..i]);
                } else {
                    out.push(value);
                }
            }
            Some(&introducer) => {
                warn!(
                    offset = base + escape_start,
                    "unrecognized escape sequence: \\{}",
                    introducer.escape_ascii()
                );
                sink.report(Diagnostic::unrecognized_escape(
                    base + escape_start,
                    introducer,
                ));
                i += 1;
            }
        }
    }

    out.finish()
}

#[inline]
fn is_octal_digit(b: u8) -> bool {
    (b'0'..=b'7').contains(&b)
}

/// Output buffer that tracks `ESC k ... ESC` title spans.
struct Output {
    bytes: Vec<u8>,
    strip_title_escapes: bool,
    /// Offset of the ESC that is the last byte written, if any
    last_esc: Option<usize>,
    /// Offset of the ESC opening a pending title span
    title_start: Option<usize>,
}

impl Output {
    fn new(capacity: usize, strip_title_escapes: bool) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            strip_title_escapes,
            last_esc: None,
            title_start: None,
        }
    }

    fn push(&mut self, byte: u8) {
        if !self.strip_title_escapes {
            self.bytes.push(byte);
            return;
        }

        match byte {
            ESC => {
                if let Some(start) = self.title_start.take() {
                    // The closing ESC can open the next span if a `k` follows
                    self.bytes.truncate(start);
                    self.last_esc = Some(start);
                    return;
                }
                self.last_esc = Some(self.bytes.len());
            }
            b'k' => {
                if let Some(start) = self.last_esc.take() {
                    self.title_start = Some(start);
                }
            }
            _ => self.last_esc = None,
        }
        self.bytes.push(byte);
    }

    fn push_text(&mut self, text: &[u8]) {
        self.last_esc = None;
        self.bytes.extend_from_slice(text);
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}
