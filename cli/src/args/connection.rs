use std::sync::Arc;

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Args;
use tether::auth::Authenticate;
use tether::transport::SshTransportFactory;
use tether::trust::KnownHosts;
use tether::trust::PinnedFingerprints;
use tether::Host;
use tether::RetryPolicy;
use tether::SshClientFactory;

const HEADING: Option<&str> = Some("Connection Options");
const TRUST_HEADING: Option<&str> = Some("Host Key Options");

/// Arguments for connecting to hosts.
#[derive(Debug, Args, Clone)]
pub struct ConnectionArgs {
    /// Port to connect to.
    #[clap(short = 'p', long, default_value_t = 22, help_heading = HEADING)]
    pub port: u16,

    /// Remote user to authenticate as, unless given as `user@host`.
    #[clap(short = 'u', long, default_value_t = whoami::username(), help_heading = HEADING)]
    pub user: String,

    /// Total connect attempts before giving up.
    #[clap(long, default_value_t = RetryPolicy::DEFAULT_MAX_ATTEMPTS, help_heading = HEADING)]
    pub max_attempts: u32,

    /// Wait after the first failed attempt. Doubles after each further failure.
    #[clap(long, default_value = "1s", help_heading = HEADING)]
    pub base_backoff: humantime::Duration,

    /// Interval between keep-alive messages.
    #[clap(long, default_value = "60s", help_heading = HEADING)]
    pub keep_alive: humantime::Duration,

    /// Time to allow a single connect attempt, handshake included.
    #[clap(long, default_value = "30s", help_heading = HEADING)]
    pub connect_timeout: humantime::Duration,

    /// Overall time to allow for opening a session, retries included.
    #[clap(long, help_heading = HEADING)]
    pub timeout: Option<humantime::Duration>,

    /// Only accept host keys with this SHA-256 fingerprint. Repeatable.
    #[clap(long = "pin", value_name = "FINGERPRINT", help_heading = TRUST_HEADING)]
    pub pins: Vec<String>,

    /// Only accept host keys listed in this known_hosts file.
    #[clap(long, conflicts_with = "pins", help_heading = TRUST_HEADING)]
    pub known_hosts: Option<Utf8PathBuf>,
}

impl ConnectionArgs {
    /// Without `--pin` or `--known-hosts`, every host key is accepted.
    pub fn client_factory(&self) -> Result<SshClientFactory> {
        let policy = RetryPolicy::new(self.max_attempts, self.base_backoff.into())?;
        let transport = SshTransportFactory::new(self.connect_timeout.into());

        let mut factory = SshClientFactory::new(Arc::new(transport))
            .with_retry_policy(policy)
            .with_keep_alive(self.keep_alive.into());

        if !self.pins.is_empty() {
            let verifier = PinnedFingerprints::new(self.pins.iter().cloned());
            factory = factory.with_host_key_verifier(Arc::new(verifier));
        } else if let Some(ref path) = self.known_hosts {
            let verifier = KnownHosts::new(path.as_std_path());
            factory = factory.with_host_key_verifier(Arc::new(verifier));
        }

        Ok(factory)
    }

    /// Builds a [`Host`] from `[user@]address`.
    pub fn host(&self, target: &str, authentication: Arc<dyn Authenticate>) -> Host {
        let (user, address) = match target.split_once('@') {
            Some((user, address)) => (user, address),
            None => (self.user.as_str(), target),
        };
        Host::builder()
            .address(address)
            .port(self.port)
            .user(user)
            .authentication(authentication)
            .build()
    }
}
