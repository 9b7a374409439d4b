use anyhow::{Result, bail};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use duplex_session::{
    cli::{Cli, Command},
    client,
    echo::EchoServer,
    session::TerminationSignal,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Client(args) => {
            if let TerminationSignal::TransportError(detail) = client::run(args).await? {
                bail!("session ended with transport error: {detail}");
            }
        }
        Command::Echo(args) => {
            let listener = TcpListener::bind(args.listen).await?;
            let server = EchoServer::new(listener, args.protocol);
            let addr = server.local_addr()?;
            info!("echo peer listening on {}", addr);
            if let Err(err) = server.run_until_ctrl_c().await {
                warn!("echo peer exited with error: {err:?}");
                return Err(err);
            }
        }
    }

    Ok(())
}
