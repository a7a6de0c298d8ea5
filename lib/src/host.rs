use std::fmt;
use std::sync::Arc;

use bon::Builder;

use crate::auth::Authenticate;

/// Remote endpoint to open sessions to, with the credentials to use there.
///
/// Immutable once built. Clones share the authentication strategy, so one
/// descriptor can drive any number of independent connections.
#[derive(Debug, Clone, Builder)]
pub struct Host {
    #[builder(into)]
    address: String,
    #[builder(default = 22)]
    port: u16,
    #[builder(into)]
    user: String,
    authentication: Arc<dyn Authenticate>,
}

impl Host {
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn authentication(&self) -> &dyn Authenticate {
        self.authentication.as_ref()
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.address, self.port)
    }
}
