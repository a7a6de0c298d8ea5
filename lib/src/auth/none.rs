use anyhow::ensure;
use anyhow::Result;
use async_trait::async_trait;

use super::Authenticate;
use crate::transport::Transport;

/// Anonymous login through the SSH `none` method.
///
/// Only servers configured to let `user` in without credentials accept it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneAuth;

#[async_trait]
impl Authenticate for NoneAuth {
    async fn authenticate(&self, user: &str, transport: &mut dyn Transport) -> Result<()> {
        let accepted = transport.auth_none(user).await?;
        ensure!(accepted, "ssh authentication failed");
        Ok(())
    }
}
