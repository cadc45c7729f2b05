use crate::options::DecoderArgs;
use crate::output::write_parsed;
use clap::Args;
use muxwire_core::control_mode::{spawn_reader_task, Decoder, DecoderConfig, CHANNEL_CAPACITY};
use muxwire_core::Parser;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Args, Debug)]
pub struct DecodeArgs {
    #[command(flatten)]
    pub decoder: DecoderArgs,

    /// Treat every line as a bare escaped payload and write the decoded bytes
    #[arg(long)]
    pub raw: bool,
}

pub async fn run(args: DecodeArgs) -> anyhow::Result<()> {
    let config = args.decoder.to_config()?;

    if args.raw {
        return run_raw(config).await;
    }

    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let reader = spawn_reader_task(tokio::io::stdin(), Parser::new(config), tx);

    let stdout = std::io::stdout();
    while let Some(parsed) = rx.recv().await {
        let mut out = stdout.lock();
        write_parsed(&mut out, &parsed)?;
        out.flush()?;
    }

    reader.await?;
    Ok(())
}

/// Decode each stdin line as a remainder, without a command or fields.
async fn run_raw(config: DecoderConfig) -> anyhow::Result<()> {
    let config = DecoderConfig {
        split_command: false,
        ..config
    };
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut buf = Vec::with_capacity(4096);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        while buf.last() == Some(&b'\n') || buf.last() == Some(&b'\r') {
            buf.pop();
        }

        let mut decoder = Decoder::new(buf.as_slice(), config);
        let decoded = decoder.remainder().unwrap_or_default();
        debug!(
            diagnostics = decoder.diagnostics().len(),
            bytes = decoded.len(),
            "decoded raw line"
        );

        stdout.write_all(&decoded).await?;
        stdout.write_all(b"\n").await?;
    }

    stdout.flush().await?;
    Ok(())
}
