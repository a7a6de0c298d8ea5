use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
use russh::client::Handle;
use russh::keys::agent::client::AgentClient;
use russh::keys::Algorithm;
use russh::keys::HashAlg;
use russh::keys::PrivateKey;
use russh::keys::PrivateKeyWithHashAlg;
use russh::ChannelMsg;
use tokio::time::timeout;
use tracing::debug;
use tracing::warn;

use super::Transport;
use super::TransportFactory;
use crate::session::ExecOutput;
use crate::trust::AcceptAll;
use crate::trust::HostKeyVerifier;

// Factory --------------------------------------------------------------------

/// Factory for `russh` backed transports.
#[derive(Debug, Clone, Copy)]
pub struct SshTransportFactory {
    connect_timeout: Duration,
}

impl SshTransportFactory {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// `connect_timeout` bounds a single connect attempt, handshake included.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for SshTransportFactory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CONNECT_TIMEOUT)
    }
}

impl TransportFactory for SshTransportFactory {
    fn transport(&self) -> Box<dyn Transport> {
        Box::new(SshTransport::new(self.connect_timeout))
    }
}

// Transport ------------------------------------------------------------------

/// SSH transport on top of [`russh::client`].
pub struct SshTransport {
    connect_timeout: Duration,
    keep_alive: Option<Duration>,
    verifier: Arc<dyn HostKeyVerifier>,
    session: Option<Handle<SshClientHandler>>,
    authenticated: bool,
}

impl SshTransport {
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            keep_alive: None,
            verifier: Arc::new(AcceptAll),
            session: None,
            authenticated: false,
        }
    }

    fn session(&mut self) -> Result<&mut Handle<SshClientHandler>> {
        self.session.as_mut().context("no ssh session")
    }

    fn record(&mut self, accepted: bool) -> bool {
        self.authenticated |= accepted;
        accepted
    }
}

#[async_trait]
impl Transport for SshTransport {
    fn set_keep_alive_interval(&mut self, interval: Duration) {
        self.keep_alive = Some(interval);
    }

    fn set_host_key_verifier(&mut self, verifier: Arc<dyn HostKeyVerifier>) {
        self.verifier = verifier;
    }

    async fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        if self.session.is_some() {
            bail!("ssh transport is already connected");
        }

        let config = Arc::new(russh::client::Config {
            keepalive_interval: self.keep_alive,
            ..Default::default()
        });

        let handler = SshClientHandler {
            host: address.to_owned(),
            port,
            verifier: self.verifier.clone(),
        };

        let session = timeout(
            self.connect_timeout,
            russh::client::connect(config, (address, port), handler),
        )
        .await
        .context("ssh connect timed out")?
        .context("ssh connect failed")?;
        self.session = Some(session);

        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn auth_none(&mut self, user: &str) -> Result<bool> {
        let result = self.session()?.authenticate_none(user).await?;
        Ok(self.record(result.success()))
    }

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<bool> {
        let result = self
            .session()?
            .authenticate_password(user, password)
            .await?;
        Ok(self.record(result.success()))
    }

    async fn auth_publickey(&mut self, user: &str, key: PrivateKey) -> Result<bool> {
        let session = self.session()?;

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .context("unable to negotiate rsa hash")?
            .flatten();
        let key = PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg);

        let result = session.authenticate_publickey(user, key).await?;
        Ok(self.record(result.success()))
    }

    /// Offers each agent identity in turn until the server accepts one.
    async fn auth_agent(&mut self, user: &str, socket: &Path) -> Result<bool> {
        let mut agent = AgentClient::connect_uds(socket)
            .await
            .with_context(|| format!("unable to connect to ssh agent at {}", socket.display()))?;
        let identities = agent
            .request_identities()
            .await
            .context("unable to list ssh agent identities")?;
        debug!(%user, count = identities.len(), "trying ssh agent identities");

        let session = self.session()?;
        let mut accepted = false;
        for identity in identities {
            let fingerprint = identity.fingerprint(HashAlg::Sha256);
            let hash_alg = match identity.algorithm() {
                Algorithm::Rsa { hash } => hash,
                _ => None,
            };
            let result = session
                .authenticate_publickey_with(user, identity, hash_alg, &mut agent)
                .await;
            if let Err(ref error) = result {
                warn!(?error, key = %fingerprint, "ssh agent identity failed");
            }
            if result.is_ok_and(|r| r.success()) {
                accepted = true;
                break;
            }
            debug!(%user, key = %fingerprint, "ssh agent identity rejected");
        }

        Ok(self.record(accepted))
    }

    async fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        let session = self.session()?;

        let mut channel = session.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut output = ExecOutput::default();
        let mut exit_status = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => output.stdout.extend_from_slice(&data),
                ChannelMsg::ExtendedData { data, ext: 1 } => {
                    output.stderr.extend_from_slice(&data);
                }
                // Output may still follow the exit status, keep draining.
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                _ => {}
            }
        }

        output.exit_status =
            exit_status.with_context(|| format!("`{command}` did not report an exit status"))?;
        Ok(output)
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            bail!("no ssh session");
        };
        session
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await?;
        self.authenticated = false;
        Ok(())
    }
}

// russh details --------------------------------------------------------------

struct SshClientHandler {
    host: String,
    port: u16,
    verifier: Arc<dyn HostKeyVerifier>,
}

impl russh::client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(self
            .verifier
            .verify(&self.host, self.port, server_public_key))
    }

    async fn auth_banner(
        &mut self,
        banner: &str,
        _session: &mut russh::client::Session,
    ) -> Result<(), Self::Error> {
        debug!(host = %self.host, %banner, "received ssh banner");
        Ok(())
    }
}

// Tests ----------------------------------------------------------------------
