use anyhow::{Context, Result};
use tracing::info;

use crate::{
    cli::ClientArgs,
    console::{self, StdoutSink, write_stderr, write_stdout},
    session::{Session, TerminationSignal},
    transport,
};

/// Connects to the target and runs one interactive session over stdin/stdout.
///
/// Returns the session's termination signal; the caller decides the exit code.
pub async fn run(args: ClientArgs) -> Result<TerminationSignal> {
    let channel = transport::connect(&args.target)
        .await
        .with_context(|| format!("failed to connect to {}", args.target))?;
    write_stdout(&format!("*** connected to {}", args.target)).await?;

    let input = console::stdin().context("failed to start stdin reader")?;
    let report = Session::new(channel)
        .run_until_ctrl_c(input, StdoutSink)
        .await;

    if let Some(error) = &report.close_error {
        info!(%error, "channel did not close cleanly");
    }
    announce(&report.signal).await?;

    Ok(report.signal)
}

async fn announce(signal: &TerminationSignal) -> std::io::Result<()> {
    match signal {
        TerminationSignal::UserRequested => write_stdout("*** leaving session").await,
        TerminationSignal::PeerClosed => write_stdout("*** peer closed the connection").await,
        TerminationSignal::Interrupt => write_stdout("*** interrupted").await,
        TerminationSignal::TransportError(detail) => {
            write_stderr(&format!("!!! transport error: {detail}")).await
        }
    }
}
