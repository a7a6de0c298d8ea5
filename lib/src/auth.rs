//! Authentication strategies.
//!
//! Every credential mechanism implements [`Authenticate`]. The set is open:
//! callers can bring their own strategy without touching the client factory.

mod agent;
mod key;
mod none;
mod password;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

pub use self::agent::AgentAuth;
pub use self::key::KeyAuth;
pub use self::none::NoneAuth;
pub use self::password::PasswordAuth;
use crate::transport::Transport;

/// Presents credentials for `user` over an already connected transport.
#[async_trait]
pub trait Authenticate: fmt::Debug + Send + Sync {
    /// # Errors
    ///
    /// If the remote rejects the credentials, or they cannot be loaded.
    async fn authenticate(&self, user: &str, transport: &mut dyn Transport) -> Result<()>;
}
