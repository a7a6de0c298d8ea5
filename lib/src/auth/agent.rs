use std::path::PathBuf;

use anyhow::ensure;
use anyhow::Result;
use async_trait::async_trait;

use super::Authenticate;
use crate::transport::Transport;

/// Delegates signing to an SSH agent, trying each identity it holds.
#[derive(Debug, Clone)]
pub struct AgentAuth {
    socket: PathBuf,
}

impl AgentAuth {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
        }
    }
}

#[async_trait]
impl Authenticate for AgentAuth {
    async fn authenticate(&self, user: &str, transport: &mut dyn Transport) -> Result<()> {
        let accepted = transport.auth_agent(user, &self.socket).await?;
        ensure!(accepted, "unable to authenticate with ssh agent");
        Ok(())
    }
}
