use anyhow::{bail, Context};
use clap::Args;
use muxwire_core::DecoderConfig;

/// Decoder flags shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct DecoderArgs {
    /// Field delimiter (a single ASCII character)
    #[arg(long, default_value_t = ' ')]
    pub delimiter: char,

    /// Keep `ESC k <title> ESC` sequences in decoded pane output
    #[arg(long)]
    pub keep_titles: bool,
}

impl DecoderArgs {
    pub fn to_config(&self) -> anyhow::Result<DecoderConfig> {
        if !self.delimiter.is_ascii() {
            bail!("delimiter must be ASCII, got {:?}", self.delimiter);
        }
        let delimiter = u8::try_from(self.delimiter)
            .with_context(|| format!("invalid delimiter {:?}", self.delimiter))?;

        Ok(DecoderConfig {
            delimiter,
            strip_title_escapes: !self.keep_titles,
            ..DecoderConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_decoder() {
        let args = DecoderArgs {
            delimiter: ' ',
            keep_titles: false,
        };
        assert_eq!(args.to_config().expect("valid"), DecoderConfig::default());
    }

    #[test]
    fn test_keep_titles() {
        let args = DecoderArgs {
            delimiter: ':',
            keep_titles: true,
        };
        let config = args.to_config().expect("valid");
        assert_eq!(config.delimiter, b':');
        assert!(!config.strip_title_escapes);
    }

    #[test]
    fn test_non_ascii_delimiter() {
        let args = DecoderArgs {
            delimiter: 'é',
            keep_titles: false,
        };
        assert!(args.to_config().is_err());
    }
}
