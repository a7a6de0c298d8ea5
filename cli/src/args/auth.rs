use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Args;
use tether::auth::AgentAuth;
use tether::auth::Authenticate;
use tether::auth::KeyAuth;
use tether::auth::NoneAuth;
use tether::auth::PasswordAuth;

const HEADING: Option<&str> = Some("Authentication Options");

/// Arguments selecting how to authenticate.
///
/// The first of key, password, agent that is set wins. With none of them set,
/// the SSH `none` method is used.
#[derive(Debug, Args, Clone)]
pub struct AuthArgs {
    /// Path to SSH private key file.
    #[arg(long, help_heading = HEADING)]
    pub ssh_key: Option<Utf8PathBuf>,

    /// Path to file holding the private key passphrase.
    #[arg(long, requires = "ssh_key", help_heading = HEADING)]
    pub passphrase_file: Option<Utf8PathBuf>,

    /// Path to password file.
    #[arg(long, help_heading = HEADING)]
    pub password_file: Option<Utf8PathBuf>,

    /// Path to SSH agent socket.
    #[arg(long, env = "SSH_AUTH_SOCK", help_heading = HEADING)]
    pub ssh_agent: Option<Utf8PathBuf>,

    /// Skip all credentials and use the SSH `none` method.
    #[arg(long, help_heading = HEADING)]
    pub no_auth: bool,
}

impl AuthArgs {
    pub fn authentication(&self) -> Result<Arc<dyn Authenticate>> {
        if self.no_auth {
            return Ok(Arc::new(NoneAuth));
        }

        if let Some(ref path) = self.ssh_key {
            let mut auth = KeyAuth::from_file(path.as_std_path());
            if let Some(ref passphrase_file) = self.passphrase_file {
                auth = auth.with_passphrase(read_secret(passphrase_file)?);
            }
            return Ok(Arc::new(auth));
        }

        if let Some(ref path) = self.password_file {
            return Ok(Arc::new(PasswordAuth::new(read_secret(path)?)));
        }

        if let Some(ref socket) = self.ssh_agent {
            return Ok(Arc::new(AgentAuth::new(socket.as_std_path())));
        }

        Ok(Arc::new(NoneAuth))
    }
}

/// Reads a secret from a file, dropping the trailing newline.
fn read_secret(path: &Utf8Path) -> Result<String> {
    let secret = std::fs::read_to_string(path)
        .with_context(|| format!("unable to read secret file {path}"))?;
    Ok(secret.trim_end_matches(['\r', '\n']).to_owned())
}
