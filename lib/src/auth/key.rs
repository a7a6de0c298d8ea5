use std::fmt;
use std::path::PathBuf;

use anyhow::ensure;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use russh::keys::PrivateKey;

use super::Authenticate;
use crate::transport::Transport;

/// Public key login with a private key in OpenSSH format.
///
/// Key material is loaded on every authentication, so a reused strategy picks
/// up a rotated key file.
#[derive(Clone)]
pub struct KeyAuth {
    source: KeySource,
    passphrase: Option<String>,
}

#[derive(Clone)]
enum KeySource {
    File(PathBuf),
    Inline(String),
}

impl KeyAuth {
    /// Reads the private key from `path`.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: KeySource::File(path.into()),
            passphrase: None,
        }
    }

    /// Uses private key text, e.g. the contents of `id_ed25519`.
    pub fn from_openssh(private_key: impl Into<String>) -> Self {
        Self {
            source: KeySource::Inline(private_key.into()),
            passphrase: None,
        }
    }

    /// Passphrase protecting the private key.
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    fn load(&self) -> Result<PrivateKey> {
        let passphrase = self.passphrase.as_deref();
        match &self.source {
            KeySource::File(path) => russh::keys::load_secret_key(path, passphrase)
                .with_context(|| format!("unable to load private key {}", path.display())),
            KeySource::Inline(text) => russh::keys::decode_secret_key(text, passphrase)
                .context("unable to decode private key"),
        }
    }
}

impl fmt::Debug for KeyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("KeyAuth");
        match &self.source {
            KeySource::File(path) => s.field("path", path),
            KeySource::Inline(_) => s.field("key", &"<inline>"),
        };
        s.field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl Authenticate for KeyAuth {
    async fn authenticate(&self, user: &str, transport: &mut dyn Transport) -> Result<()> {
        let key = self.load()?;
        let accepted = transport.auth_publickey(user, key).await?;
        ensure!(accepted, "ssh authentication failed");
        Ok(())
    }
}
