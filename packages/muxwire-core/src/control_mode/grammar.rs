//! Field layout of every control mode notification
//!
//! The decoder has no idea how many fields a command carries. This table is
//! the single place that knows: for each command it lists the fields in the
//! order they must be consumed. See the tmux wiki page on control mode for
//! the wire formats.

/// How a single field is consumed from a [`Decoder`](super::Decoder)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `@n`
    WindowId,
    /// `%n`
    PaneId,
    /// `$n`
    SessionId,
    /// Plain decimal number
    Number,
    /// One delimiter-separated token, taken as text
    Word,
    /// A token that older tmux versions leave out
    OptionalWord,
    /// Skip tokens up to and including a lone `:`
    Separator,
    /// Everything left on the line, octal-decoded
    Remainder,
    /// Same as `Remainder`, but may be missing
    OptionalRemainder,
}

impl FieldKind {
    /// Whether a line may end before this field
    pub fn is_optional(self) -> bool {
        matches!(self, FieldKind::OptionalWord | FieldKind::OptionalRemainder)
    }
}

/// Field plan for one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandGrammar {
    pub name: &'static str,
    pub fields: &'static [FieldKind],
}

use FieldKind::*;

/// Every notification the parser understands
pub const COMMANDS: &[CommandGrammar] = &[
    // %begin timestamp command-number flags
    CommandGrammar {
        name: "%begin",
        fields: &[Number, Number, Number],
    },
    CommandGrammar {
        name: "%end",
        fields: &[Number, Number, Number],
    },
    CommandGrammar {
        name: "%error",
        fields: &[Number, Number, Number],
    },
    // %output %pane value
    CommandGrammar {
        name: "%output",
        fields: &[PaneId, OptionalRemainder],
    },
    // %extended-output %pane age ... : value
    CommandGrammar {
        name: "%extended-output",
        fields: &[PaneId, Number, Separator, OptionalRemainder],
    },
    // %layout-change @window layout visible-layout flags
    CommandGrammar {
        name: "%layout-change",
        fields: &[WindowId, Word, Word, OptionalWord],
    },
    CommandGrammar {
        name: "%window-add",
        fields: &[WindowId],
    },
    CommandGrammar {
        name: "%window-close",
        fields: &[WindowId],
    },
    CommandGrammar {
        name: "%window-renamed",
        fields: &[WindowId, Remainder],
    },
    CommandGrammar {
        name: "%window-pane-changed",
        fields: &[WindowId, PaneId],
    },
    CommandGrammar {
        name: "%unlinked-window-add",
        fields: &[WindowId],
    },
    CommandGrammar {
        name: "%unlinked-window-close",
        fields: &[WindowId],
    },
    CommandGrammar {
        name: "%unlinked-window-renamed",
        fields: &[WindowId, Remainder],
    },
    CommandGrammar {
        name: "%pane-mode-changed",
        fields: &[PaneId],
    },
    // %session-changed $session name
    CommandGrammar {
        name: "%session-changed",
        fields: &[SessionId, Remainder],
    },
    CommandGrammar {
        name: "%session-renamed",
        fields: &[SessionId, Remainder],
    },
    CommandGrammar {
        name: "%session-window-changed",
        fields: &[SessionId, WindowId],
    },
    CommandGrammar {
        name: "%sessions-changed",
        fields: &[],
    },
    // %client-session-changed client $session name
    CommandGrammar {
        name: "%client-session-changed",
        fields: &[Word, SessionId, Remainder],
    },
    CommandGrammar {
        name: "%client-detached",
        fields: &[Word],
    },
    CommandGrammar {
        name: "%pause",
        fields: &[PaneId],
    },
    CommandGrammar {
        name: "%continue",
        fields: &[PaneId],
    },
    // %subscription-changed name $session @window index %pane ... : value
    CommandGrammar {
        name: "%subscription-changed",
        fields: &[Word, Separator, OptionalRemainder],
    },
    CommandGrammar {
        name: "%paste-buffer-changed",
        fields: &[Word],
    },
    CommandGrammar {
        name: "%paste-buffer-deleted",
        fields: &[Word],
    },
    CommandGrammar {
        name: "%message",
        fields: &[OptionalRemainder],
    },
    CommandGrammar {
        name: "%config-error",
        fields: &[OptionalRemainder],
    },
    // %exit [reason]
    CommandGrammar {
        name: "%exit",
        fields: &[OptionalRemainder],
    },
];

/// Find the field plan for a command token
pub fn lookup(name: &str) -> Option<&'static CommandGrammar> {
    COMMANDS.iter().find(|grammar| grammar.name == name)
}
