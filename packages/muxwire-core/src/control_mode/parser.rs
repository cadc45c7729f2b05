//! Parser for tmux control mode notifications
//!
//! Control mode outputs various notifications prefixed with `%`:
//! - `%output %pane-id value` - Pane output
//! - `%layout-change @window layout visible-layout flags` - Layout changed
//! - `%begin/%end/%error` - Command response blocks
//! - etc.
//!
//! Each line is split by a [`Decoder`] and its fields are consumed in the
//! order given by the [`grammar`](super::grammar) table.

use super::decoder::{parse_decimal, Decoder, DecoderConfig, IdKind};
use super::diagnostics::Diagnostic;
use super::grammar::{self, CommandGrammar, FieldKind};
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

/// Events parsed from control mode output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlModeEvent {
    /// Raw pane output (octal-decoded)
    Output {
        pane_id: i64,
        #[serde(serialize_with = "lossy")]
        content: Vec<u8>,
    },

    /// Extended output with timing info (when flow control is enabled)
    ExtendedOutput {
        pane_id: i64,
        age_ms: u64,
        #[serde(serialize_with = "lossy")]
        content: Vec<u8>,
    },

    /// Layout change notification
    LayoutChange {
        window_id: i64,
        layout: String,
        visible_layout: String,
        flags: String,
    },

    WindowAdd {
        window_id: i64,
    },

    WindowClose {
        window_id: i64,
    },

    WindowRenamed {
        window_id: i64,
        name: String,
    },

    /// Active pane changed in window
    WindowPaneChanged {
        window_id: i64,
        pane_id: i64,
    },

    /// Window added to a session other than the attached one
    UnlinkedWindowAdd {
        window_id: i64,
    },

    UnlinkedWindowClose {
        window_id: i64,
    },

    UnlinkedWindowRenamed {
        window_id: i64,
        name: String,
    },

    /// Pane mode changed (e.g., entered/exited copy mode)
    PaneModeChanged {
        pane_id: i64,
    },

    /// Attached session changed
    SessionChanged {
        session_id: i64,
        session_name: String,
    },

    SessionRenamed {
        session_id: i64,
        name: String,
    },

    /// Session window changed (active window in session)
    SessionWindowChanged {
        session_id: i64,
        window_id: i64,
    },

    /// Sessions list changed (session created/destroyed)
    SessionsChanged,

    /// Another client's session changed
    ClientSessionChanged {
        client: String,
        session_id: i64,
        session_name: String,
    },

    ClientDetached {
        client: String,
    },

    /// Flow control: pane paused
    Pause {
        pane_id: i64,
    },

    /// Flow control: pane continued
    Continue {
        pane_id: i64,
    },

    /// Value of a `refresh-client -B` subscription changed
    SubscriptionChanged {
        name: String,
        value: String,
    },

    PasteBufferChanged {
        name: String,
    },

    PasteBufferDeleted {
        name: String,
    },

    /// `display-message` output sent to the control client
    Message {
        message: String,
    },

    /// Error in the tmux configuration file
    ConfigError {
        message: String,
    },

    /// Command response block completed
    CommandResponse {
        timestamp: u64,
        command_num: u32,
        output: String,
        success: bool,
    },

    /// Control mode client exiting
    Exit {
        reason: Option<String>,
    },
}

fn lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

/// A line that could not be turned into an event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown notification {0}")]
    UnknownCommand(String),

    #[error("{command}: missing field {index} ({kind:?})")]
    MissingField {
        command: &'static str,
        index: usize,
        kind: FieldKind,
    },

    #[error("{command}: malformed field {index} ({kind:?}): {value:?}")]
    MalformedField {
        command: &'static str,
        index: usize,
        kind: FieldKind,
        value: String,
    },
}

/// Value consumed for one field of a [`CommandGrammar`]
#[derive(Debug)]
enum FieldValue {
    Number(i64),
    Text(String),
    Bytes(Vec<u8>),
    Absent,
}

/// Field values in plan order
struct Fields(std::vec::IntoIter<FieldValue>);

impl Fields {
    fn number(&mut self) -> i64 {
        match self.0.next() {
            Some(FieldValue::Number(n)) => n,
            _ => 0,
        }
    }

    fn text(&mut self) -> String {
        self.optional_text().unwrap_or_default()
    }

    /// Missing and empty values are both `None`
    fn optional_text(&mut self) -> Option<String> {
        let text = match self.0.next() {
            Some(FieldValue::Text(text)) => text,
            Some(FieldValue::Bytes(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    fn bytes(&mut self) -> Vec<u8> {
        match self.0.next() {
            Some(FieldValue::Bytes(bytes)) => bytes,
            Some(FieldValue::Text(text)) => text.into_bytes(),
            _ => Vec::new(),
        }
    }
}

/// Open `%begin` block
#[derive(Debug)]
struct PendingResponse {
    timestamp: u64,
    command_num: u32,
    output: String,
}

/// Parser for control mode notifications
#[derive(Debug)]
pub struct Parser {
    config: DecoderConfig,
    response: Option<PendingResponse>,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config: DecoderConfig {
                split_command: true,
                ..config
            },
            response: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Whether a `%begin` block is open
    pub fn in_response(&self) -> bool {
        self.response.is_some()
    }

    /// Diagnostics reported by the decoder since the last call
    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// Parse a single line from control mode output, without its newline.
    ///
    /// Returns `Ok(Some(event))` if a complete event was parsed and `Ok(None)`
    /// for lines that only feed a response block or are not notifications.
    pub fn parse_line(&mut self, line: &[u8]) -> Result<Option<ControlModeEvent>, ParseError> {
        let mut decoder = Decoder::new(line, self.config);
        let result = self.parse_decoded(&mut decoder, line);
        self.diagnostics.extend(decoder.take_diagnostics());
        result
    }

    fn parse_decoded(
        &mut self,
        decoder: &mut Decoder,
        line: &[u8],
    ) -> Result<Option<ControlModeEvent>, ParseError> {
        let command = decoder.command().into_owned();

        match command.as_str() {
            "%begin" => return self.handle_begin(decoder),
            "%end" | "%error" => {
                if let Some(event) = self.handle_end(decoder, command == "%end")? {
                    return Ok(Some(event));
                }
            }
            _ => {}
        }

        // If we're in a response block, accumulate the line
        if let Some(response) = &mut self.response {
            if !response.output.is_empty() {
                response.output.push('\n');
            }
            response.output.push_str(&String::from_utf8_lossy(line));
            return Ok(None);
        }

        // Parse notifications (all start with %)
        if !command.starts_with('%') {
            return Ok(None);
        }

        let grammar =
            grammar::lookup(&command).ok_or_else(|| ParseError::UnknownCommand(command.clone()))?;
        let mut fields = read_fields(decoder, grammar)?;

        let event = match grammar.name {
            "%output" => ControlModeEvent::Output {
                pane_id: fields.number(),
                content: fields.bytes(),
            },
            "%extended-output" => ControlModeEvent::ExtendedOutput {
                pane_id: fields.number(),
                age_ms: u64::try_from(fields.number()).unwrap_or(0),
                content: fields.bytes(),
            },
            "%layout-change" => ControlModeEvent::LayoutChange {
                window_id: fields.number(),
                layout: fields.text(),
                visible_layout: fields.text(),
                flags: fields.text(),
            },
            "%window-add" => ControlModeEvent::WindowAdd {
                window_id: fields.number(),
            },
            "%window-close" => ControlModeEvent::WindowClose {
                window_id: fields.number(),
            },
            "%window-renamed" => ControlModeEvent::WindowRenamed {
                window_id: fields.number(),
                name: fields.text(),
            },
            "%window-pane-changed" => ControlModeEvent::WindowPaneChanged {
                window_id: fields.number(),
                pane_id: fields.number(),
            },
            "%unlinked-window-add" => ControlModeEvent::UnlinkedWindowAdd {
                window_id: fields.number(),
            },
            "%unlinked-window-close" => ControlModeEvent::UnlinkedWindowClose {
                window_id: fields.number(),
            },
            "%unlinked-window-renamed" => ControlModeEvent::UnlinkedWindowRenamed {
                window_id: fields.number(),
                name: fields.text(),
            },
            "%pane-mode-changed" => ControlModeEvent::PaneModeChanged {
                pane_id: fields.number(),
            },
            "%session-changed" => ControlModeEvent::SessionChanged {
                session_id: fields.number(),
                session_name: fields.text(),
            },
            "%session-renamed" => ControlModeEvent::SessionRenamed {
                session_id: fields.number(),
                name: fields.text(),
            },
            "%session-window-changed" => ControlModeEvent::SessionWindowChanged {
                session_id: fields.number(),
                window_id: fields.number(),
            },
            "%sessions-changed" => ControlModeEvent::SessionsChanged,
            "%client-session-changed" => ControlModeEvent::ClientSessionChanged {
                client: fields.text(),
                session_id: fields.number(),
                session_name: fields.text(),
            },
            "%client-detached" => ControlModeEvent::ClientDetached {
                client: fields.text(),
            },
            "%pause" => ControlModeEvent::Pause {
                pane_id: fields.number(),
            },
            "%continue" => ControlModeEvent::Continue {
                pane_id: fields.number(),
            },
            "%subscription-changed" => ControlModeEvent::SubscriptionChanged {
                name: fields.text(),
                value: fields.text(),
            },
            "%paste-buffer-changed" => ControlModeEvent::PasteBufferChanged {
                name: fields.text(),
            },
            "%paste-buffer-deleted" => ControlModeEvent::PasteBufferDeleted {
                name: fields.text(),
            },
            "%message" => ControlModeEvent::Message {
                message: fields.text(),
            },
            "%config-error" => ControlModeEvent::ConfigError {
                message: fields.text(),
            },
            "%exit" => ControlModeEvent::Exit {
                reason: fields.optional_text(),
            },
            // %end and %error are turned into responses above
            _ => ControlModeEvent::CommandResponse {
                timestamp: u64::try_from(fields.number()).unwrap_or(0),
                command_num: u32::try_from(fields.number()).unwrap_or(0),
                output: String::new(),
                success: grammar.name == "%end",
            },
        };

        Ok(Some(event))
    }

    fn handle_begin(
        &mut self,
        decoder: &mut Decoder,
    ) -> Result<Option<ControlModeEvent>, ParseError> {
        // Format: %begin timestamp command-number flags
        let grammar = grammar::lookup("%begin")
            .ok_or_else(|| ParseError::UnknownCommand("%begin".to_string()))?;
        let mut fields = read_fields(decoder, grammar)?;

        self.response = Some(PendingResponse {
            timestamp: u64::try_from(fields.number()).unwrap_or(0),
            command_num: u32::try_from(fields.number()).unwrap_or(0),
            output: String::new(),
        });
        Ok(None)
    }

    /// Close the open block if this `%end`/`%error` belongs to it.
    ///
    /// Returns `Ok(None)` when the line should be treated as block content.
    fn handle_end(
        &mut self,
        decoder: &mut Decoder,
        success: bool,
    ) -> Result<Option<ControlModeEvent>, ParseError> {
        let name = if success { "%end" } else { "%error" };
        let grammar =
            grammar::lookup(name).ok_or_else(|| ParseError::UnknownCommand(name.to_string()))?;
        let mut fields = match read_fields(decoder, grammar) {
            Ok(fields) => fields,
            // A garbled guard line inside a block is just content
            Err(_) if self.response.is_some() => return Ok(None),
            Err(err) => return Err(err),
        };
        let timestamp = u64::try_from(fields.number()).unwrap_or(0);
        let command_num = u32::try_from(fields.number()).unwrap_or(0);

        let (timestamp, output) = match self.response.take() {
            Some(response) if response.command_num == command_num => {
                (response.timestamp, response.output)
            }
            Some(response) => {
                debug!(
                    expected = response.command_num,
                    got = command_num,
                    "response guard does not match open block"
                );
                self.response = Some(response);
                return Ok(None);
            }
            None => (timestamp, String::new()),
        };

        Ok(Some(ControlModeEvent::CommandResponse {
            timestamp,
            command_num,
            output,
            success,
        }))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

/// Consume the fields of `grammar` from `decoder`, in order.
fn read_fields(decoder: &mut Decoder, grammar: &CommandGrammar) -> Result<Fields, ParseError> {
    let mut values = Vec::with_capacity(grammar.fields.len());

    for (index, &kind) in grammar.fields.iter().enumerate() {
        if decoder.is_exhausted() {
            if kind.is_optional() {
                values.push(FieldValue::Absent);
                continue;
            }
            return Err(ParseError::MissingField {
                command: grammar.name,
                index,
                kind,
            });
        }

        let malformed = |value: &[u8]| ParseError::MalformedField {
            command: grammar.name,
            index,
            kind,
            value: String::from_utf8_lossy(value).into_owned(),
        };

        let value = match kind {
            FieldKind::WindowId | FieldKind::PaneId => {
                let expected = if kind == FieldKind::WindowId {
                    IdKind::Window
                } else {
                    IdKind::Pane
                };
                match decoder.pop_id_field().unwrap_or_default() {
                    (_, Some(id)) if id.kind.map_or(true, |k| k == expected) => {
                        FieldValue::Number(id.value)
                    }
                    (field, _) => return Err(malformed(field)),
                }
            }
            FieldKind::SessionId => {
                let field = decoder.pop_field().unwrap_or_default();
                let digits = field.strip_prefix(b"$").unwrap_or(field);
                FieldValue::Number(parse_decimal(digits).ok_or_else(|| malformed(field))?)
            }
            FieldKind::Number => {
                let field = decoder.pop_field().unwrap_or_default();
                FieldValue::Number(parse_decimal(field).ok_or_else(|| malformed(field))?)
            }
            FieldKind::Word | FieldKind::OptionalWord => {
                let field = decoder.pop_field().unwrap_or_default();
                FieldValue::Text(String::from_utf8_lossy(field).into_owned())
            }
            FieldKind::Separator => {
                while let Some(field) = decoder.pop_field() {
                    if field == b":" {
                        break;
                    }
                }
                continue;
            }
            FieldKind::Remainder | FieldKind::OptionalRemainder => {
                FieldValue::Bytes(decoder.remainder().unwrap_or_default())
            }
        };
        values.push(value);
    }

    if !decoder.is_exhausted() {
        debug!(command = grammar.name, "ignoring extra fields");
    }

    Ok(Fields(values.into_iter()))
}
