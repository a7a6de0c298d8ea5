use std::fmt;

use anyhow::Result;
use bstr::ByteSlice;

use crate::transport::Transport;

/// Authenticated connection handed out by
/// [`SshClientFactory`](crate::client::SshClientFactory).
///
/// Owns its transport. Closing is up to the caller: dropping a session does
/// not send a disconnect.
pub struct Session {
    transport: Box<dyn Transport>,
    user: String,
}

impl Session {
    pub(crate) fn new(transport: Box<dyn Transport>, user: String) -> Self {
        Self { transport, user }
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    /// Runs `command` to completion and collects its output.
    pub async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        self.transport.exec(command).await
    }

    /// Disconnects from the remote host.
    pub async fn close(mut self) -> Result<()> {
        self.transport.disconnect().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("authenticated", &self.transport.is_authenticated())
            .finish_non_exhaustive()
    }
}

/// Output of a command run through [`Session::exec`].
#[derive(Clone, Default)]
pub struct ExecOutput {
    pub exit_status: u32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl fmt::Debug for ExecOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecOutput")
            .field("exit_status", &self.exit_status)
            .field("stdout", &self.stdout.as_bstr())
            .field("stderr", &self.stderr.as_bstr())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_output_debug_is_lossy_text() {
        let output = ExecOutput {
            exit_status: 0,
            stdout: b"Linux\n".to_vec(),
            stderr: Vec::new(),
        };

        let debug = format!("{output:?}");

        assert!(debug.contains(r#"stdout: "Linux\n""#));
    }
}
