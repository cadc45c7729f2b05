use crate::options::DecoderArgs;
use crate::output::write_parsed;
use clap::Args;
use muxwire_core::control_mode::{ControlModeConnection, ParsedLine};
use muxwire_core::Parser;
use std::io::Write;
use tracing::info;

#[derive(Args, Debug)]
pub struct AttachArgs {
    /// Session to attach to
    pub session: String,

    /// Create the session instead of attaching to an existing one
    #[arg(long)]
    pub create: bool,

    #[command(flatten)]
    pub decoder: DecoderArgs,
}

enum Next {
    Line(Option<ParsedLine>),
    Interrupted,
}

pub async fn run(args: AttachArgs) -> anyhow::Result<()> {
    let parser = Parser::new(args.decoder.to_config()?);

    let mut connection = if args.create {
        ControlModeConnection::new_session(&args.session, parser).await?
    } else {
        ControlModeConnection::attach(&args.session, parser).await?
    };
    info!(session = %args.session, "attached");

    let stdout = std::io::stdout();
    loop {
        let next = tokio::select! {
            line = connection.recv() => Next::Line(line),
            _ = tokio::signal::ctrl_c() => Next::Interrupted,
        };

        match next {
            Next::Line(Some(parsed)) => {
                let mut out = stdout.lock();
                write_parsed(&mut out, &parsed)?;
                out.flush()?;
            }
            Next::Line(None) => {
                info!("control mode connection closed");
                break;
            }
            Next::Interrupted => {
                connection.graceful_close().await;
                break;
            }
        }
    }

    Ok(())
}
