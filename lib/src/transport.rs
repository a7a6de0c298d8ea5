pub mod ssh;

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::session::ExecOutput;
use crate::trust::HostKeyVerifier;

pub use russh::keys::PrivateKey;

pub use self::ssh::SshTransport;
pub use self::ssh::SshTransportFactory;

/// Network and protocol channel to a single remote host.
///
/// A transport is configured, connected once, authenticated, and then handed
/// to a [`Session`](crate::session::Session) that owns it.
#[async_trait]
pub trait Transport: Send {
    /// Interval between keep-alive messages on an idle connection.
    fn set_keep_alive_interval(&mut self, interval: Duration);

    /// Policy consulted when the server presents its host key.
    fn set_host_key_verifier(&mut self, verifier: Arc<dyn HostKeyVerifier>);

    /// Opens the connection and completes the protocol handshake.
    ///
    /// A failed attempt leaves the transport unconnected, so calling this
    /// again is safe.
    async fn connect(&mut self, address: &str, port: u16) -> Result<()>;

    fn is_authenticated(&self) -> bool;

    /// The `auth_*` methods return whether the server accepted the
    /// credentials. Errors are reserved for broken transports.
    async fn auth_none(&mut self, user: &str) -> Result<bool>;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<bool>;

    async fn auth_publickey(&mut self, user: &str, key: PrivateKey) -> Result<bool>;

    /// Tries every identity held by the agent listening on `socket`.
    async fn auth_agent(&mut self, user: &str, socket: &Path) -> Result<bool>;

    async fn exec(&mut self, command: &str) -> Result<ExecOutput>;

    async fn disconnect(&mut self) -> Result<()>;
}

/// Builds a fresh, unconnected [`Transport`] for every connection.
pub trait TransportFactory: fmt::Debug + Send + Sync {
    fn transport(&self) -> Box<dyn Transport>;
}
