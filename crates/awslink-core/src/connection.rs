//! The connection lifecycle state machine.
//!
//! A [`Connection`] owns at most one client handle for one AWS service and
//! moves through five states:
//!
//! ```text
//! Uninitialized --init--> Initialized --start--> Started --stop--> Stopped --close--> Closed
//!                              ^                                     |                  |
//!                              +---------------init------------------+------------------+
//! ```
//!
//! # Concurrency
//!
//! `init`, `start`, `stop` and `close` run under one async lifecycle lock, so
//! two `init` calls can never build two handles and `close` never overlaps an
//! in-flight `init`. The handle is published through a short `parking_lot`
//! write lock once construction has finished; [`Connection::client`] only takes
//! the matching read lock and never waits for construction.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, ConnectionResult};
use crate::factory::ClientFactory;
use crate::lifecycle::Lifecycle;
use crate::transport::TransportConfig;

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, no client built yet.
    Uninitialized,
    /// Client built and usable.
    Initialized,
    /// Started; the client is usable.
    Started,
    /// Stopped; the client has been released.
    Stopped,
    /// Closed; the client has been released. `init` may be called again.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

struct Published<C> {
    state: ConnectionState,
    client: Option<Arc<C>>,
}

/// Lifecycle-managed owner of one AWS service client.
///
/// # Examples
///
/// ```no_run
/// # async fn example<F: awslink_core::ClientFactory>(factory: F) -> awslink_core::ConnectionResult<()> {
/// use awslink_core::{Connection, ConnectionConfig};
///
/// let config = ConnectionConfig::builder().region("eu-central-1").build();
/// let connection = Connection::new(config, factory);
/// connection.init().await?;
/// let client = connection.client()?;
/// // issue requests with `client`, re-fetching it on every use
/// connection.close().await;
/// # Ok(())
/// # }
/// ```
pub struct Connection<F: ClientFactory> {
    config: ConnectionConfig,
    factory: F,
    lifecycle: tokio::sync::Mutex<()>,
    published: RwLock<Published<F::Client>>,
}

impl<F: ClientFactory> Connection<F> {
    /// Create an uninitialized connection. Nothing is validated or resolved
    /// until [`Connection::init`].
    #[must_use]
    pub fn new(config: ConnectionConfig, factory: F) -> Self {
        Self {
            config,
            factory,
            lifecycle: tokio::sync::Mutex::new(()),
            published: RwLock::new(Published {
                state: ConnectionState::Uninitialized,
                client: None,
            }),
        }
    }

    /// Service this connection is bound to.
    #[must_use]
    pub fn service(&self) -> &'static str {
        F::SERVICE
    }

    /// The connection configuration.
    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The client factory.
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.published.read().state
    }

    /// The current client handle.
    ///
    /// Callers should fetch the handle for each unit of work and not keep it
    /// across lifecycle transitions.
    ///
    /// # Errors
    /// Returns [`ConnectionError::NotInitialized`] before `init` or after
    /// `stop`/`close`.
    pub fn client(&self) -> ConnectionResult<Arc<F::Client>> {
        self.published
            .read()
            .client
            .clone()
            .ok_or(ConnectionError::NotInitialized { service: F::SERVICE })
    }

    /// Build the client handle.
    ///
    /// Succeeds without rebuilding when the connection is already initialized
    /// or started.
    ///
    /// # Errors
    /// Returns [`ConnectionError::Init`] wrapping the configuration,
    /// authentication or construction failure. The state is left unchanged.
    pub async fn init(&self) -> ConnectionResult<()> {
        let _guard = self.lifecycle.lock().await;

        let state = self.state();
        if matches!(state, ConnectionState::Initialized | ConnectionState::Started) {
            debug!(service = F::SERVICE, %state, "connection already initialized");
            return Ok(());
        }

        let client = self.build_client().await.map_err(|e| {
            warn!(service = F::SERVICE, error = %e, "connection initialization failed");
            ConnectionError::Init {
                service: F::SERVICE,
                source: Box::new(e),
            }
        })?;

        {
            let mut published = self.published.write();
            published.client = Some(Arc::new(client));
            published.state = ConnectionState::Initialized;
        }
        info!(
            service = F::SERVICE,
            region = ?self.config.region,
            "connection initialized"
        );
        Ok(())
    }

    /// Mark the connection started. The handle built by `init` is already
    /// request-ready, so there is nothing to open.
    ///
    /// # Errors
    /// Returns [`ConnectionError::InvalidState`] unless the connection is
    /// initialized (or already started).
    pub async fn start(&self) -> ConnectionResult<()> {
        let _guard = self.lifecycle.lock().await;

        let mut published = self.published.write();
        match published.state {
            ConnectionState::Initialized => {
                published.state = ConnectionState::Started;
                drop(published);
                info!(service = F::SERVICE, "connection started");
                Ok(())
            }
            ConnectionState::Started => Ok(()),
            state => Err(ConnectionError::InvalidState {
                service: F::SERVICE,
                operation: "start",
                state,
            }),
        }
    }

    /// Shut down and release the client handle.
    ///
    /// Shutdown failures are logged and swallowed; the handle is discarded in
    /// every case.
    pub async fn stop(&self) {
        let _guard = self.lifecycle.lock().await;

        self.release().await;
        let mut published = self.published.write();
        if matches!(
            published.state,
            ConnectionState::Initialized | ConnectionState::Started
        ) {
            published.state = ConnectionState::Stopped;
            drop(published);
            info!(service = F::SERVICE, "connection stopped");
        }
    }

    /// Release anything left and mark the connection closed.
    ///
    /// Safe to call in any state, including after a failed `init`.
    pub async fn close(&self) {
        let _guard = self.lifecycle.lock().await;

        self.release().await;
        self.published.write().state = ConnectionState::Closed;
        info!(service = F::SERVICE, "connection closed");
    }

    async fn build_client(&self) -> ConnectionResult<F::Client> {
        self.config.validate()?;
        let credentials = self.config.authentication.resolve()?;
        let retry_policy = self.config.retry_policy.build()?;
        let transport = TransportConfig::build(&self.config.client_configuration, retry_policy)?;
        let endpoint = self.config.endpoint_builder();
        debug!(
            service = F::SERVICE,
            ambient_credentials = credentials.is_ambient(),
            endpoint = ?endpoint,
            "building client"
        );
        self.factory
            .create_client(credentials, &transport, endpoint.as_ref())
            .await
    }

    /// Must be called with the lifecycle lock held.
    async fn release(&self) {
        let client = self.published.write().client.take();
        if let Some(client) = client {
            if let Err(e) = self.factory.shutdown_client(&client).await {
                warn!(
                    service = F::SERVICE,
                    error = %e,
                    "client shutdown failed, discarding handle"
                );
            }
            debug!(service = F::SERVICE, "client released");
        }
    }
}

impl<F: ClientFactory> fmt::Debug for Connection<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let published = self.published.read();
        f.debug_struct("Connection")
            .field("service", &F::SERVICE)
            .field("state", &published.state)
            .field("has_client", &published.client.is_some())
            .field("config", &self.config)
            .field("factory", &self.factory)
            .finish()
    }
}

#[async_trait]
impl<F: ClientFactory> Lifecycle for Connection<F> {
    fn name(&self) -> &str {
        F::SERVICE
    }

    async fn init(&self) -> ConnectionResult<()> {
        Connection::init(self).await
    }

    async fn start(&self) -> ConnectionResult<()> {
        Connection::start(self).await
    }

    async fn stop(&self) {
        Connection::stop(self).await;
    }

    async fn close(&self) {
        Connection::close(self).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::auth::{Authentication, Credentials};
    use crate::client::ClientBuilder;
    use crate::endpoint::{CustomEndpoint, EndpointBuilder};
    use crate::error::ShutdownError;
    use crate::lifecycle::{init_and_start, stop_and_close};

    #[derive(Debug)]
    struct FakeClient {
        id: usize,
        region: Option<String>,
        endpoint: Option<String>,
    }

    #[derive(Debug, Default)]
    struct CountingFactory {
        created: AtomicUsize,
        shutdowns: AtomicUsize,
        attempts: AtomicUsize,
        build_delay: Duration,
        fail_build: bool,
        fail_shutdown: bool,
    }

    #[async_trait]
    impl ClientFactory for CountingFactory {
        type Client = FakeClient;

        const SERVICE: &'static str = "fake";

        async fn create_client(
            &self,
            credentials: Credentials,
            transport: &TransportConfig,
            endpoint: &dyn EndpointBuilder,
        ) -> ConnectionResult<FakeClient> {
            let builder = ClientBuilder::new(credentials, transport).rebuild_with(endpoint)?;
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if !self.build_delay.is_zero() {
                tokio::time::sleep(self.build_delay).await;
            }
            if self.fail_build {
                return Err(ConnectionError::Construction("endpoint unreachable".to_owned()));
            }
            let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(FakeClient {
                id,
                region: builder.region().map(|r| r.as_ref().to_owned()),
                endpoint: builder.endpoint_url().map(ToOwned::to_owned),
            })
        }

        async fn shutdown_client(&self, _client: &FakeClient) -> Result<(), ShutdownError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if self.fail_shutdown {
                return Err(ShutdownError::new("fake", "socket already closed"));
            }
            Ok(())
        }
    }

    fn config() -> ConnectionConfig {
        ConnectionConfig::builder().region("eu-central-1").build()
    }

    fn connection(factory: CountingFactory) -> Connection<CountingFactory> {
        Connection::new(config(), factory)
    }

    #[tokio::test]
    async fn test_should_fail_client_access_before_init() {
        let conn = connection(CountingFactory::default());
        assert_eq!(conn.state(), ConnectionState::Uninitialized);
        assert!(matches!(
            conn.client(),
            Err(ConnectionError::NotInitialized { service: "fake" })
        ));
    }

    #[tokio::test]
    async fn test_should_expose_client_after_init_and_release_on_stop() {
        let conn = connection(CountingFactory::default());
        conn.init().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Initialized);
        let client = conn.client().unwrap();
        assert_eq!(client.region.as_deref(), Some("eu-central-1"));
        assert!(client.endpoint.is_none());

        conn.start().await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Started);
        assert!(conn.client().is_ok());

        conn.stop().await;
        assert_eq!(conn.state(), ConnectionState::Stopped);
        assert!(conn.client().is_err());
        assert_eq!(conn.factory().shutdowns.load(Ordering::SeqCst), 1);

        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(conn.client().is_err());
        assert_eq!(conn.factory().shutdowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_should_build_distinct_handle_after_reinit() {
        let conn = connection(CountingFactory::default());
        init_and_start(&conn).await.unwrap();
        let first = conn.client().unwrap();
        stop_and_close(&conn).await;
        assert!(conn.client().is_err());

        init_and_start(&conn).await.unwrap();
        let second = conn.client().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_should_treat_repeated_init_as_noop() {
        let conn = connection(CountingFactory::default());
        conn.init().await.unwrap();
        conn.init().await.unwrap();
        conn.start().await.unwrap();
        conn.init().await.unwrap();
        assert_eq!(conn.factory().created.load(Ordering::SeqCst), 1);
        assert_eq!(conn.state(), ConnectionState::Started);
    }

    #[tokio::test]
    async fn test_should_reject_start_before_init() {
        let conn = connection(CountingFactory::default());
        let err = conn.start().await.unwrap_err();
        assert!(matches!(
            err,
            ConnectionError::InvalidState {
                operation: "start",
                state: ConnectionState::Uninitialized,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_should_not_advance_when_endpoint_rebuild_fails() {
        let config = ConnectionConfig::builder()
            .region("eu-central-1")
            .custom_endpoint(CustomEndpoint::new("::not a url::", "us-east-1"))
            .build();
        let conn = Connection::new(config, CountingFactory::default());

        let err = conn.init().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Init { service: "fake", .. }));
        assert!(matches!(err.root_cause(), ConnectionError::Construction(_)));
        assert_eq!(conn.state(), ConnectionState::Uninitialized);
        assert!(conn.client().is_err());
        assert_eq!(conn.factory().created.load(Ordering::SeqCst), 0);

        stop_and_close(&conn).await;
        assert!(conn.client().is_err());
    }

    #[tokio::test]
    async fn test_should_fail_blank_secret_at_init_not_construction() {
        let config = ConnectionConfig::builder()
            .region("eu-central-1")
            .authentication(Authentication::keys("access", ""))
            .build();
        let conn = Connection::new(config, CountingFactory::default());
        assert_eq!(conn.state(), ConnectionState::Uninitialized);

        let err = conn.init().await.unwrap_err();
        assert!(matches!(err.root_cause(), ConnectionError::Authentication(_)));
        assert_eq!(conn.state(), ConnectionState::Uninitialized);
    }

    #[tokio::test]
    async fn test_should_fail_init_on_unknown_transport_key() {
        let config = ConnectionConfig::builder()
            .region("eu-central-1")
            .client_configuration([("NoSuchSetting".to_owned(), "1".to_owned())].into())
            .build();
        let conn = Connection::new(config, CountingFactory::default());

        let err = conn.init().await.unwrap_err();
        match err.root_cause() {
            ConnectionError::Configuration(message) => assert!(message.contains("NoSuchSetting")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_should_route_to_custom_endpoint() {
        let config = ConnectionConfig::builder()
            .region("eu-central-1")
            .custom_endpoint(CustomEndpoint::new("http://localhost:4566", "us-east-1"))
            .build();
        let conn = Connection::new(config, CountingFactory::default());
        conn.init().await.unwrap();

        let client = conn.client().unwrap();
        assert_eq!(client.endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(client.region.as_deref(), Some("us-east-1"));
        assert_eq!(conn.config().region.as_deref(), Some("eu-central-1"));
    }

    #[tokio::test]
    async fn test_should_swallow_shutdown_errors() {
        let conn = connection(CountingFactory {
            fail_shutdown: true,
            ..CountingFactory::default()
        });
        init_and_start(&conn).await.unwrap();
        conn.stop().await;
        assert!(conn.client().is_err());
        assert_eq!(conn.state(), ConnectionState::Stopped);
    }

    #[tokio::test]
    async fn test_should_close_without_init() {
        let conn = connection(CountingFactory::default());
        conn.stop().await;
        assert_eq!(conn.state(), ConnectionState::Uninitialized);
        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.factory().shutdowns.load(Ordering::SeqCst), 0);

        conn.init().await.unwrap();
        assert!(conn.client().is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_construct_exactly_one_handle_under_concurrent_init() {
        let conn = Arc::new(connection(CountingFactory {
            build_delay: Duration::from_millis(20),
            ..CountingFactory::default()
        }));

        let tasks = (0..16).map(|_| {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move {
                conn.init().await?;
                conn.client()
            })
        });
        let results = futures::future::join_all(tasks).await;

        let handles: Vec<_> = results
            .into_iter()
            .map(|joined| joined.expect("task panicked").expect("init failed"))
            .collect();
        assert_eq!(conn.factory().created.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_fail_every_concurrent_init_without_partial_state() {
        let conn = Arc::new(connection(CountingFactory {
            build_delay: Duration::from_millis(5),
            fail_build: true,
            ..CountingFactory::default()
        }));

        let tasks = (0..16).map(|_| {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.init().await })
        });
        let results = futures::future::join_all(tasks).await;

        for joined in results {
            let err = joined.expect("task panicked").unwrap_err();
            assert!(matches!(err, ConnectionError::Init { service: "fake", .. }), "{err}");
            assert!(matches!(err.root_cause(), ConnectionError::Construction(_)));
        }
        assert_eq!(conn.factory().attempts.load(Ordering::SeqCst), 16);
        assert_eq!(conn.factory().created.load(Ordering::SeqCst), 0);
        assert_eq!(conn.state(), ConnectionState::Uninitialized);
        assert!(matches!(
            conn.client(),
            Err(ConnectionError::NotInitialized { service: "fake" })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_reject_blank_secret_for_every_concurrent_init() {
        let config = ConnectionConfig::builder()
            .region("eu-central-1")
            .authentication(Authentication::keys("AKID", "  "))
            .build();
        let conn = Arc::new(Connection::new(config, CountingFactory::default()));

        let tasks = (0..8).map(|_| {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.init().await })
        });
        for joined in futures::future::join_all(tasks).await {
            let err = joined.expect("task panicked").unwrap_err();
            assert!(matches!(
                err.root_cause(),
                ConnectionError::Authentication(_)
            ));
        }
        assert_eq!(conn.factory().attempts.load(Ordering::SeqCst), 0);
        assert_eq!(conn.state(), ConnectionState::Uninitialized);
        assert!(conn.client().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_read_client_while_lifecycle_lock_is_held() {
        let conn = Arc::new(connection(CountingFactory::default()));
        conn.init().await.unwrap();

        let _guard = conn.lifecycle.lock().await;
        let reader = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move { conn.client().map(|c| c.id) })
        };
        let id = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("client() blocked on the lifecycle lock")
            .expect("task panicked")
            .unwrap();
        assert_eq!(id, 1);
    }
}
