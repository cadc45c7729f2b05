pub mod control_mode;

pub use control_mode::{
    decode_remainder, ControlModeEvent, Decoder, DecoderConfig, Diagnostic, ParseError, Parser,
};
