#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod client;
pub mod error;
pub mod host;
pub mod retry;
pub mod session;
pub mod transport;
pub mod trust;

pub use crate::client::SshClientFactory;
pub use crate::error::Error;
pub use crate::host::Host;
pub use crate::retry::RetryPolicy;
pub use crate::session::Session;
