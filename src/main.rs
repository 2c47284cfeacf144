mod console;
mod presenter;

use clap::Parser;
use client::ClientSession;
use log::{error, info};
use server::HostSession;
use shared::{SessionConfig, SessionError, DEFAULT_TICK_RATE};
use std::future::Future;
use std::pin::Pin;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc;

/// Tiny Planet: Siege, a two-player co-op arena defense.
///
/// Without --host or --join the game runs single-player.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host a session, listening on this port
    #[arg(long, value_name = "PORT", conflicts_with = "join")]
    host: Option<u16>,

    /// Join a session at HOST:PORT
    #[arg(long, value_name = "HOST:PORT")]
    join: Option<String>,

    /// Seed for the simulation's random stream
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Simulation ticks per second
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// How long a join may take before giving up
    #[arg(long, default_value = "5000")]
    handshake_timeout_ms: u64,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_rate: self.tick_rate.max(1),
            input_rate: self.tick_rate.max(1),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            seed: self.seed,
            ..Default::default()
        }
    }
}

type SessionFuture = Pin<Box<dyn Future<Output = Result<(), SessionError>> + Send>>;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(exit_code(e.as_ref()))
        }
    }
}

/// 1 when the session never started, 2 when it was lost midway.
fn exit_code(error: &(dyn std::error::Error + 'static)) -> u8 {
    match error.downcast_ref::<SessionError>() {
        Some(e) if !e.is_setup_failure() => 2,
        _ => 1,
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.session_config();
    let (local_tx, local_rx) = mpsc::unbounded_channel();
    let (presenter_tx, presenter_rx) = mpsc::unbounded_channel();

    let session: SessionFuture = match (args.host, args.join.as_deref()) {
        (Some(port), _) => {
            let host = HostSession::bind(&format!("0.0.0.0:{}", port), config).await?;
            Box::pin(host.run(local_rx, presenter_tx))
        }
        (None, Some(addr)) => {
            let client = ClientSession::connect(addr, config).await?;
            Box::pin(client.run(local_rx, presenter_tx))
        }
        (None, None) => {
            let host = HostSession::single_player(config);
            Box::pin(host.run(local_rx, presenter_tx))
        }
    };

    info!("{}", console::USAGE);
    console::spawn(local_tx);
    let presenter = presenter::spawn(presenter_rx);

    let result = tokio::select! {
        result = session => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
    };

    // The session has dropped its sender by now, so the presenter drains and ends.
    let _ = presenter.await;
    result.map_err(Into::into)
}
