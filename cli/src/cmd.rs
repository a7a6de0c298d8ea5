mod connect;
mod exec;

use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use enum_dispatch::enum_dispatch;
use tether::Host;
use tether::Session;
use tether::SshClientFactory;

use crate::args::GlobalArgs;

/// Open SSH sessions that ride out flaky hosts
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    #[clap(flatten)]
    global_args: GlobalArgs,
}

/// Subcommands must implement [`Run`] to be executed at runtime.
#[enum_dispatch]
pub trait Run {
    async fn run(&self) -> Result<ExitCode>;
}

#[enum_dispatch(Run)]
#[derive(Debug, Subcommand)]
enum Command {
    Exec(exec::ExecArgs),
    Connect(connect::ConnectArgs),
}

pub async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    cli.global_args.init_tracing()?;

    cli.command.run().await
}

/// Opens a session, bounded by `timeout` when given.
async fn open_session(
    factory: &SshClientFactory,
    host: &Host,
    timeout: Option<humantime::Duration>,
) -> Result<Session> {
    let connecting = factory.new_connection(host);
    let session = match timeout {
        Some(timeout) => tokio::time::timeout(timeout.into(), connecting)
            .await
            .with_context(|| format!("timed out after {timeout} connecting to {host}"))??,
        None => connecting.await?,
    };
    Ok(session)
}
