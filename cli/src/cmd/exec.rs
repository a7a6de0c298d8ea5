use std::io::Write;
use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use clap::Args;
use tracing::warn;

use crate::args::AuthArgs;
use crate::args::ConnectionArgs;
use crate::cmd::open_session;
use crate::cmd::Run;

/// Run a command on a host
#[derive(Debug, Args)]
pub struct ExecArgs {
    #[clap(flatten)]
    connection_args: ConnectionArgs,

    #[clap(flatten)]
    auth_args: AuthArgs,

    /// Host to run on, as `[user@]address`.
    pub target: String,

    /// Command to run.
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

impl Run for ExecArgs {
    async fn run(&self) -> Result<ExitCode> {
        let factory = self.connection_args.client_factory()?;
        let authentication = self.auth_args.authentication()?;
        let host = self.connection_args.host(&self.target, authentication);

        let mut session = open_session(&factory, &host, self.connection_args.timeout).await?;

        let command = self.command.join(" ");
        let output = session
            .exec(&command)
            .await
            .with_context(|| format!("unable to run command on {host}"));

        if let Err(error) = session.close().await {
            warn!(?error, %host, "failed closing ssh session");
        }

        let output = output?;
        std::io::stdout().write_all(&output.stdout)?;
        std::io::stderr().write_all(&output.stderr)?;

        Ok(ExitCode::from(exit_code(output.exit_status)))
    }
}

/// Maps a remote exit status onto a local one. Statuses that do not fit in a
/// byte become a generic failure.
fn exit_code(status: u32) -> u8 {
    u8::try_from(status).unwrap_or(1)
}
