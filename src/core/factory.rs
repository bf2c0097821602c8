//! Generic "connect, probe, cache" acquisition for vendor clients.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;

use crate::domain::ports::Connector;
use crate::utils::error::{AppError, ClientKind, Result};

/// Upper bound for the connectivity probe run right after construction.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// A live vendor client. Dereferences to the vendor type.
pub struct ClientHandle<C: Connector> {
    connector: Arc<C>,
    client: C::Client,
    closed: AtomicBool,
}

impl<C: Connector> ClientHandle<C> {
    pub(crate) fn new(connector: Arc<C>, client: C::Client) -> Self {
        Self {
            connector,
            client,
            closed: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> ClientKind {
        self.connector.kind()
    }

    pub fn client(&self) -> &C::Client {
        &self.client
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Releases the vendor client. Calls after the first one are no-ops.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.connector
            .close(&self.client)
            .await
            .map_err(|e| AppError::close(self.kind(), e))?;
        tracing::debug!(kind = %self.kind(), "client closed");
        Ok(())
    }
}

impl<C: Connector> Deref for ClientHandle<C> {
    type Target = C::Client;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl<C: Connector> fmt::Debug for ClientHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("kind", &self.kind())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Holds at most one handle of its kind. The first successful
/// [`acquire`](Self::acquire) wins; later calls get the same handle no
/// matter which config they pass. Failed attempts leave the slot empty.
pub struct ClientFactory<C: Connector> {
    connector: Arc<C>,
    probe_timeout: Duration,
    slot: OnceCell<Arc<ClientHandle<C>>>,
}

impl<C: Connector> ClientFactory<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector: Arc::new(connector),
            probe_timeout: PROBE_TIMEOUT,
            slot: OnceCell::new(),
        }
    }

    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    pub fn kind(&self) -> ClientKind {
        self.connector.kind()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Cached handle, if one was acquired.
    pub fn get(&self) -> Option<Arc<ClientHandle<C>>> {
        self.slot.get().cloned()
    }

    pub async fn acquire(&self, config: &C::Config) -> Result<Arc<ClientHandle<C>>> {
        if let Some(handle) = self.slot.get() {
            tracing::debug!(kind = %self.kind(), "reusing cached client");
            return Ok(Arc::clone(handle));
        }

        self.slot
            .get_or_try_init(|| self.connect(config))
            .await
            .cloned()
    }

    async fn connect(&self, config: &C::Config) -> Result<Arc<ClientHandle<C>>> {
        let kind = self.kind();
        let client = self
            .connector
            .connect(config)
            .await
            .map_err(|e| AppError::connection(kind, e))?;

        let probe = tokio::time::timeout(self.probe_timeout, self.connector.probe(&client)).await;
        let failure = match probe {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(AppError::connection(kind, e)),
            Err(_) => Some(AppError::connection(
                kind,
                format!("connectivity probe timed out after {:?}", self.probe_timeout),
            )),
        };
        if let Some(err) = failure {
            if let Err(e) = self.connector.close(&client).await {
                tracing::debug!(kind = %kind, error = %e, "releasing unprobed client failed");
            }
            return Err(err);
        }

        tracing::info!(kind = %kind, "{kind} client initialised");
        Ok(Arc::new(ClientHandle::new(Arc::clone(&self.connector), client)))
    }

    /// Closes the cached handle; a factory that never connected has nothing to close.
    pub async fn close(&self) -> Result<()> {
        match self.slot.get() {
            Some(handle) => handle.close().await,
            None => Ok(()),
        }
    }
}

impl<C: Connector> fmt::Debug for ClientFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("kind", &self.kind())
            .field("probe_timeout", &self.probe_timeout)
            .field("connected", &self.slot.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::BoxError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct MockConnector {
        connects: AtomicUsize,
        probes: AtomicUsize,
        closes: AtomicUsize,
    }

    #[derive(Clone)]
    struct MockConfig {
        label: &'static str,
        reachable: bool,
        probe_delay: Duration,
    }

    impl MockConfig {
        fn up(label: &'static str) -> Self {
            Self {
                label,
                reachable: true,
                probe_delay: Duration::ZERO,
            }
        }

        fn down(label: &'static str) -> Self {
            Self {
                reachable: false,
                ..Self::up(label)
            }
        }
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Config = MockConfig;
        type Client = MockConfig;

        fn kind(&self) -> ClientKind {
            ClientKind::InfluxDb
        }

        async fn connect(&self, config: &MockConfig) -> std::result::Result<MockConfig, BoxError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(config.clone())
        }

        async fn probe(&self, client: &MockConfig) -> std::result::Result<(), BoxError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(client.probe_delay).await;
            if client.reachable {
                Ok(())
            } else {
                Err("connection refused".into())
            }
        }

        async fn close(&self, _client: &MockConfig) -> std::result::Result<(), BoxError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_second_acquire_returns_cached_handle() {
        let factory = ClientFactory::new(MockConnector::default());

        let first = factory.acquire(&MockConfig::up("primary")).await.unwrap();
        let second = factory.acquire(&MockConfig::up("other")).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.label, "primary");
        assert_eq!(factory.connector().connects.load(Ordering::SeqCst), 1);
        assert_eq!(factory.connector().probes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_probe_leaves_slot_empty() {
        let factory = ClientFactory::new(MockConnector::default());

        let err = factory.acquire(&MockConfig::down("broken")).await.unwrap_err();
        assert!(matches!(err, AppError::Connection { kind: ClientKind::InfluxDb, .. }));
        assert!(factory.get().is_none());
        // the unprobed client is released
        assert_eq!(factory.connector().closes.load(Ordering::SeqCst), 1);

        let handle = factory.acquire(&MockConfig::up("fixed")).await.unwrap();
        assert_eq!(handle.label, "fixed");
        assert!(factory.get().is_some());
    }

    #[tokio::test]
    async fn test_probe_timeout_is_connection_error() {
        let factory =
            ClientFactory::new(MockConnector::default()).with_probe_timeout(Duration::from_millis(50));
        let slow = MockConfig {
            probe_delay: Duration::from_secs(30),
            ..MockConfig::up("slow")
        };

        let started = std::time::Instant::now();
        let err = factory.acquire(&slow).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
        assert!(factory.get().is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let factory = ClientFactory::new(MockConnector::default());
        assert!(factory.close().await.is_ok());
        assert_eq!(factory.connector().closes.load(Ordering::SeqCst), 0);

        let handle = factory.acquire(&MockConfig::up("primary")).await.unwrap();
        handle.close().await.unwrap();
        handle.close().await.unwrap();
        factory.close().await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(factory.connector().closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_callers_share_one_handle() {
        let factory = Arc::new(ClientFactory::new(MockConnector::default()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                tokio::spawn(async move {
                    let config = MockConfig {
                        probe_delay: Duration::from_millis(20),
                        ..MockConfig::up("racer")
                    };
                    factory.acquire(&config).await.unwrap()
                })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }

        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(factory.connector().connects.load(Ordering::SeqCst), 1);
    }
}
