/// Failures surfaced by [`SshClientFactory::new_connection`].
///
/// Each variant names the phase that failed, so callers can tell an
/// unreachable host apart from rejected credentials.
///
/// [`SshClientFactory::new_connection`]: crate::client::SshClientFactory::new_connection
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The retry policy cannot be used to make any attempt at all.
    #[error("invalid retry policy: max attempts must be at least 1, got {max_attempts}")]
    InvalidRetryPolicy { max_attempts: u32 },

    /// Every connect attempt failed.
    #[error("unable to connect to {address}:{port} after {attempts} attempt(s)")]
    Connectivity {
        address: String,
        port: u16,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    /// The transport came up but the remote rejected the credentials.
    #[error("unable to authenticate as {user} on {address}:{port}")]
    Authentication {
        user: String,
        address: String,
        port: u16,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
