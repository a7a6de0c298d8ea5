use std::fmt;

use anyhow::ensure;
use anyhow::Result;
use async_trait::async_trait;

use super::Authenticate;
use crate::transport::Transport;

/// Password login. The password never shows up in `Debug` output.
#[derive(Clone)]
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

impl fmt::Debug for PasswordAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordAuth")
            .field("password", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Authenticate for PasswordAuth {
    async fn authenticate(&self, user: &str, transport: &mut dyn Transport) -> Result<()> {
        let accepted = transport.auth_password(user, &self.password).await?;
        ensure!(accepted, "ssh authentication failed");
        Ok(())
    }
}
