use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use tracing::instrument;

use crate::error::Error;
use crate::error::Result;
use crate::host::Host;
use crate::retry::retry;
use crate::retry::IdempotentAction;
use crate::retry::RetryPolicy;
use crate::session::Session;
use crate::transport::SshTransportFactory;
use crate::transport::Transport;
use crate::transport::TransportFactory;
use crate::trust::AcceptAll;
use crate::trust::HostKeyVerifier;

// Factory --------------------------------------------------------------------

/// Factory for authenticated SSH sessions.
///
/// Holds configuration only. Every [`new_connection`] builds its own
/// transport, so concurrent calls never share state.
///
/// [`new_connection`]: SshClientFactory::new_connection
#[derive(Debug, Clone)]
pub struct SshClientFactory {
    transport: Arc<dyn TransportFactory>,
    retry_policy: RetryPolicy,
    keep_alive: Duration,
    host_key_verifier: Arc<dyn HostKeyVerifier>,
}

impl SshClientFactory {
    pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);

    /// Uses the default retry policy and keep-alive, and accepts any host key.
    #[must_use]
    pub fn new(transport: Arc<dyn TransportFactory>) -> Self {
        Self {
            transport,
            retry_policy: RetryPolicy::default(),
            keep_alive: Self::DEFAULT_KEEP_ALIVE,
            host_key_verifier: Arc::new(AcceptAll),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Replaces the default [`AcceptAll`] trust policy.
    #[must_use]
    pub fn with_host_key_verifier(mut self, verifier: Arc<dyn HostKeyVerifier>) -> Self {
        self.host_key_verifier = verifier;
        self
    }

    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Default for SshClientFactory {
    fn default() -> Self {
        Self::new(Arc::new(SshTransportFactory::default()))
    }
}

impl SshClientFactory {
    /// Connects to `host`, retrying with backoff while the host is
    /// unreachable, then authenticates once.
    ///
    /// # Errors
    ///
    /// - [`Error::Connectivity`] if every connect attempt failed. No
    ///   credentials are sent in that case.
    /// - [`Error::Authentication`] if the credentials were rejected. This is
    ///   never retried.
    #[instrument(skip_all, fields(%host))]
    pub async fn new_connection(&self, host: &Host) -> Result<Session> {
        let mut transport = self.transport.transport();
        transport.set_keep_alive_interval(self.keep_alive);
        transport.set_host_key_verifier(self.host_key_verifier.clone());

        let address = host.address();
        let port = host.port();

        let mut connect = Connect {
            transport: transport.as_mut(),
            address,
            port,
        };
        retry(&self.retry_policy, &mut connect)
            .await
            .map_err(|error| Error::Connectivity {
                address: address.to_owned(),
                port,
                attempts: error.attempts,
                source: error.source,
            })?;

        host.authentication()
            .authenticate(host.user(), transport.as_mut())
            .await
            .map_err(|source| Error::Authentication {
                user: host.user().to_owned(),
                address: address.to_owned(),
                port,
                source,
            })?;

        info!("ssh session established");
        Ok(Session::new(transport, host.user().to_owned()))
    }
}

// Connect --------------------------------------------------------------------

/// Single connect attempt. Failed attempts leave the transport unconnected,
/// which makes repeating it safe.
struct Connect<'a> {
    transport: &'a mut dyn Transport,
    address: &'a str,
    port: u16,
}

#[async_trait]
impl IdempotentAction for Connect<'_> {
    type Output = ();
    type Error = anyhow::Error;

    fn describe(&self) -> String {
        format!("connect to {}:{}", self.address, self.port)
    }

    async fn attempt(&mut self) -> anyhow::Result<()> {
        self.transport.connect(self.address, self.port).await
    }
}

// Tests ----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use anyhow::bail;
    use russh::keys::PrivateKey;
    use tokio::time::Instant;

    use super::*;
    use crate::auth::tests::PRIVATE_KEY;
    use crate::auth::KeyAuth;
    use crate::auth::PasswordAuth;
    use crate::session::ExecOutput;
    use crate::trust::tests::public_key;
    use crate::trust::tests::KEY;
    use crate::trust::tests::KEY_FINGERPRINT;
    use crate::trust::PinnedFingerprints;

    /// What a scripted host does, and what happened to it.
    #[derive(Debug, Default)]
    struct Script {
        connect_failures: u32,
        reject_auth: bool,
        events: Vec<String>,
        connects: u32,
        connected_at: Vec<Instant>,
    }

    /// Hands out transports that all follow one shared [`Script`].
    #[derive(Debug, Clone, Default)]
    struct ScriptedFactory {
        script: Arc<Mutex<Script>>,
    }

    impl ScriptedFactory {
        fn new(connect_failures: u32, reject_auth: bool) -> Self {
            let script = Script {
                connect_failures,
                reject_auth,
                ..Default::default()
            };
            Self {
                script: Arc::new(Mutex::new(script)),
            }
        }

        fn connects(&self) -> u32 {
            self.script.lock().unwrap().connects
        }

        fn events(&self) -> Vec<String> {
            self.script.lock().unwrap().events.clone()
        }

        fn gaps(&self) -> Vec<Duration> {
            let script = self.script.lock().unwrap();
            script.connected_at.windows(2).map(|w| w[1] - w[0]).collect()
        }
    }

    impl TransportFactory for ScriptedFactory {
        fn transport(&self) -> Box<dyn Transport> {
            Box::new(ScriptedTransport {
                script: self.script.clone(),
                verifier: None,
                connected: false,
                authenticated: false,
            })
        }
    }

    struct ScriptedTransport {
        script: Arc<Mutex<Script>>,
        verifier: Option<Arc<dyn HostKeyVerifier>>,
        connected: bool,
        authenticated: bool,
    }

    impl ScriptedTransport {
        fn event(&self, event: String) {
            self.script.lock().unwrap().events.push(event);
        }

        fn try_connect(&mut self, address: &str, port: u16) -> anyhow::Result<()> {
            let mut script = self.script.lock().unwrap();
            script.connects += 1;
            script.connected_at.push(Instant::now());
            script.events.push(format!("connect:{address}:{port}"));
            if script.connects <= script.connect_failures {
                bail!("connection timed out");
            }
            let verifier = self.verifier.as_ref().expect("verifier installed");
            if !verifier.verify(address, port, &public_key(KEY)) {
                bail!("host key rejected");
            }
            self.connected = true;
            Ok(())
        }

        fn try_auth(&mut self, method: &str) -> anyhow::Result<bool> {
            if !self.connected {
                bail!("not connected");
            }
            self.event(format!("auth:{method}"));
            self.authenticated = !self.script.lock().unwrap().reject_auth;
            Ok(self.authenticated)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn set_keep_alive_interval(&mut self, interval: Duration) {
            self.event(format!("keep_alive:{}", interval.as_secs()));
        }

        fn set_host_key_verifier(&mut self, verifier: Arc<dyn HostKeyVerifier>) {
            self.event("verifier".to_owned());
            self.verifier = Some(verifier);
        }

        async fn connect(&mut self, address: &str, port: u16) -> anyhow::Result<()> {
            self.try_connect(address, port)
        }

        fn is_authenticated(&self) -> bool {
            self.authenticated
        }

        async fn auth_none(&mut self, _user: &str) -> anyhow::Result<bool> {
            self.try_auth("none")
        }

        async fn auth_password(&mut self, _user: &str, _password: &str) -> anyhow::Result<bool> {
            self.try_auth("password")
        }

        async fn auth_publickey(&mut self, user: &str, _key: PrivateKey) -> anyhow::Result<bool> {
            self.try_auth(&format!("publickey:{user}"))
        }

        async fn auth_agent(&mut self, _user: &str, _socket: &Path) -> anyhow::Result<bool> {
            self.try_auth("agent")
        }

        async fn exec(&mut self, command: &str) -> anyhow::Result<ExecOutput> {
            Ok(ExecOutput {
                exit_status: 0,
                stdout: command.as_bytes().to_vec(),
                stderr: Vec::new(),
            })
        }

        async fn disconnect(&mut self) -> anyhow::Result<()> {
            self.event("disconnect".to_owned());
            Ok(())
        }
    }

    fn deploy_host() -> Host {
        Host::builder()
            .address("10.0.0.5")
            .port(22)
            .user("deploy")
            .authentication(Arc::new(KeyAuth::from_openssh(PRIVATE_KEY)))
            .build()
    }

    fn client(factory: &ScriptedFactory, max_attempts: u32) -> SshClientFactory {
        let policy = RetryPolicy::new(max_attempts, Duration::from_secs(1)).unwrap();
        SshClientFactory::new(Arc::new(factory.clone())).with_retry_policy(policy)
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_two_timeouts() {
        let factory = ScriptedFactory::new(2, false);
        let start = Instant::now();

        let session = client(&factory, 3)
            .new_connection(&deploy_host())
            .await
            .unwrap();

        assert_eq!(session.user(), "deploy");
        assert_eq!(factory.connects(), 3);
        assert_eq!(factory.gaps(), [Duration::from_secs(1), Duration::from_secs(2)]);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(
            factory.events(),
            [
                "keep_alive:60",
                "verifier",
                "connect:10.0.0.5:22",
                "connect:10.0.0.5:22",
                "connect:10.0.0.5:22",
                "auth:publickey:deploy",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let factory = ScriptedFactory::new(u32::MAX, false);

        let error = client(&factory, 3)
            .new_connection(&deploy_host())
            .await
            .unwrap_err();

        match error {
            Error::Connectivity {
                address,
                port,
                attempts,
                source,
            } => {
                assert_eq!(address, "10.0.0.5");
                assert_eq!(port, 22);
                assert_eq!(attempts, 3);
                assert_eq!(source.to_string(), "connection timed out");
            }
            other => panic!("expected connectivity error, got {other:?}"),
        }
        assert_eq!(factory.connects(), 3);
        assert!(!factory.events().iter().any(|e| e.starts_with("auth")));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_credentials_are_not_retried() {
        let factory = ScriptedFactory::new(0, true);
        let host = Host::builder()
            .address("10.0.0.5")
            .user("deploy")
            .authentication(Arc::new(PasswordAuth::new("hunter2")))
            .build();
        let start = Instant::now();

        let error = client(&factory, 4)
            .new_connection(&host)
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Authentication { ref user, .. } if user == "deploy"));
        assert_eq!(factory.connects(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_does_not_wait() {
        let factory = ScriptedFactory::new(1, false);
        let start = Instant::now();

        let error = client(&factory, 1)
            .new_connection(&deploy_host())
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Connectivity { attempts: 1, .. }));
        assert_eq!(factory.connects(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn default_policy_makes_four_attempts() {
        let factory = ScriptedFactory::new(u32::MAX, false);
        let start = Instant::now();

        let error = SshClientFactory::new(Arc::new(factory.clone()))
            .new_connection(&deploy_host())
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Connectivity { attempts: 4, .. }));
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2 + 4));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_remaining_attempts() {
        let factory = ScriptedFactory::new(u32::MAX, false);
        let client = client(&factory, 4);

        let result = tokio::time::timeout(
            Duration::from_millis(1500),
            client.new_connection(&deploy_host()),
        )
        .await;

        // Attempts run at 0s and 1s, the next one would start at 3s.
        assert!(result.is_err());
        assert_eq!(factory.connects(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(factory.connects(), 2);
        assert!(!factory.events().iter().any(|e| e.starts_with("auth")));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_host_key_verifier() {
        let pinned = ScriptedFactory::new(0, false);
        client(&pinned, 1)
            .with_host_key_verifier(Arc::new(PinnedFingerprints::new([KEY_FINGERPRINT])))
            .new_connection(&deploy_host())
            .await
            .unwrap();

        let unpinned = ScriptedFactory::new(0, false);
        let error = client(&unpinned, 2)
            .with_host_key_verifier(Arc::new(PinnedFingerprints::default()))
            .new_connection(&deploy_host())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Connectivity { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn custom_keep_alive() {
        let factory = ScriptedFactory::new(0, false);

        client(&factory, 1)
            .with_keep_alive(Duration::from_secs(15))
            .new_connection(&deploy_host())
            .await
            .unwrap();

        assert_eq!(factory.events()[0], "keep_alive:15");
    }

    #[tokio::test(start_paused = true)]
    async fn descriptor_is_reusable() {
        let factory = ScriptedFactory::new(0, false);
        let client = client(&factory, 1);
        let host = deploy_host();

        let (a, b) = tokio::join!(client.new_connection(&host), client.new_connection(&host));

        let mut a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(factory.connects(), 2);
        assert!(a.transport_mut().is_authenticated());
        assert_eq!(a.exec("true").await.unwrap().stdout, b"true");
        a.close().await.unwrap();
        b.close().await.unwrap();
        assert_eq!(factory.events().iter().filter(|e| *e == "disconnect").count(), 2);
    }
}
