use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use futures::StreamExt;
use tether::Host;
use tether::SshClientFactory;
use tracing::instrument;
use tracing::warn;

use crate::args::AuthArgs;
use crate::args::ConnectionArgs;
use crate::cmd::open_session;
use crate::cmd::Run;

/// Check that sessions can be opened to hosts
#[derive(Debug, Args)]
pub struct ConnectArgs {
    #[clap(flatten)]
    connection_args: ConnectionArgs,

    #[clap(flatten)]
    auth_args: AuthArgs,

    /// Number of hosts to connect to at once.
    #[clap(short = 'c', long, default_value_t = 16)]
    pub concurrency: usize,

    /// Hosts to connect to, as `[user@]address`.
    #[arg(required = true)]
    pub targets: Vec<String>,
}

impl Run for ConnectArgs {
    async fn run(&self) -> Result<ExitCode> {
        let factory = self.connection_args.client_factory()?;
        let authentication = self.auth_args.authentication()?;
        let timeout = self.connection_args.timeout;

        let hosts = self
            .targets
            .iter()
            .map(|target| self.connection_args.host(target, authentication.clone()));

        let results: Vec<(Host, Result<()>)> = futures::stream::iter(hosts)
            .map(|host| {
                let factory = &factory;
                async move {
                    let result = check(factory, &host, timeout).await;
                    (host, result)
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        let mut failed = 0;
        for (host, result) in &results {
            match result {
                Ok(()) => println!("{host}: ok"),
                Err(error) => {
                    failed += 1;
                    println!("{host}: {error:#}");
                }
            }
        }

        if failed > 0 {
            warn!(failed, total = results.len(), "some hosts failed");
            return Ok(ExitCode::FAILURE);
        }
        Ok(ExitCode::SUCCESS)
    }
}

#[instrument(skip_all, fields(%host))]
async fn check(
    factory: &SshClientFactory,
    host: &Host,
    timeout: Option<humantime::Duration>,
) -> Result<()> {
    let session = open_session(factory, host, timeout).await?;
    session.close().await?;
    Ok(())
}
