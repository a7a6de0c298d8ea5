//! Host-key trust policies.
//!
//! A [`HostKeyVerifier`] decides whether the identity key a server presents
//! during the handshake is accepted. The transport consults it before any
//! credentials are sent.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use russh::keys::HashAlg;
use russh::keys::PublicKey;
use tracing::debug;
use tracing::warn;

pub trait HostKeyVerifier: fmt::Debug + Send + Sync {
    /// Returns `true` if `key` is trusted for `host:port`.
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool;
}

/// Accepts every presented host key without verification.
///
/// This is a trust decision: it assumes the network path to the host is
/// otherwise trusted. A man-in-the-middle is not detected. Use
/// [`PinnedFingerprints`] or [`KnownHosts`] where that matters.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl HostKeyVerifier for AcceptAll {
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool {
        debug!(
            %host,
            port,
            key = %key.fingerprint(HashAlg::Sha256),
            "accepting host key without verification"
        );
        true
    }
}

/// Accepts only keys whose SHA-256 fingerprint was pinned ahead of time.
///
/// Fingerprints use the OpenSSH form, e.g. `SHA256:N7lQNExG...`.
#[derive(Debug, Default, Clone)]
pub struct PinnedFingerprints {
    fingerprints: HashSet<String>,
}

impl PinnedFingerprints {
    pub fn new<I, S>(fingerprints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fingerprints: fingerprints.into_iter().map(Into::into).collect(),
        }
    }
}

impl HostKeyVerifier for PinnedFingerprints {
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool {
        let fingerprint = key.fingerprint(HashAlg::Sha256).to_string();
        let trusted = self.fingerprints.contains(&fingerprint);
        if !trusted {
            warn!(%host, port, key = %fingerprint, "host key is not pinned");
        }
        trusted
    }
}

/// Checks keys against an OpenSSH `known_hosts` file.
///
/// Hosts missing from the file and keys that changed are both rejected.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    path: PathBuf,
}

impl KnownHosts {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HostKeyVerifier for KnownHosts {
    fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool {
        match russh::keys::check_known_hosts_path(host, port, key, &self.path) {
            Ok(true) => true,
            Ok(false) => {
                warn!(%host, port, path = ?self.path, "host not found in known_hosts");
                false
            }
            Err(error) => {
                warn!(%host, port, path = ?self.path, ?error, "known_hosts check failed");
                false
            }
        }
    }
}
