//! Named connection registry
//!
//! Holds connection configurations by name and lazily creates one shared
//! [`Connection`] per name on first use. Resetting a name drops the registry's
//! handle; callers still holding the `Arc` keep their connection until they
//! release it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::driver::{Driver, MySqlDriver};
use crate::error::{DbError, Result};

/// Name used when the caller does not pick one
pub const DEFAULT_CONNECTION: &str = "default";

/// Connection shared between tasks
pub type SharedConnection<D> = Arc<Mutex<Connection<D>>>;

struct Inner<D: Driver> {
    configs: HashMap<String, ConnectionConfig>,
    instances: HashMap<String, SharedConnection<D>>,
}

/// Registry of named connections
pub struct ConnectionRegistry<D: Driver> {
    inner: Mutex<Inner<D>>,
}

impl<D: Driver> Default for ConnectionRegistry<D> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                configs: HashMap::new(),
                instances: HashMap::new(),
            }),
        }
    }
}

impl<D: Driver> ConnectionRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the configuration for `name`
    ///
    /// An existing connection under that name is dropped so the next
    /// [`instance`](Self::instance) call picks up the new configuration.
    pub async fn configure(&self, name: impl Into<String>, config: ConnectionConfig) {
        let name = name.into();
        let mut inner = self.inner.lock().await;
        if inner.instances.remove(&name).is_some() {
            debug!(connection = %name, "dropping connection after reconfiguration");
        }
        inner.configs.insert(name, config);
    }

    /// Configuration registered under `name`
    pub async fn config(&self, name: &str) -> Option<ConnectionConfig> {
        self.inner.lock().await.configs.get(name).cloned()
    }

    /// Registered names, sorted
    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().await.configs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Shared connection for `name`, created through `connect` on first use
    ///
    /// The registry is not locked while `connect` runs. When two tasks race
    /// on the same name, the first connection stored wins and the other is
    /// dropped. Fails with [`DbError::Connection`] when `name` has no
    /// configuration.
    pub async fn instance<F, Fut>(&self, name: &str, connect: F) -> Result<SharedConnection<D>>
    where
        F: FnOnce(ConnectionConfig) -> Fut,
        Fut: Future<Output = Result<D>>,
    {
        let config = {
            let inner = self.inner.lock().await;
            if let Some(existing) = inner.instances.get(name) {
                return Ok(Arc::clone(existing));
            }
            inner.configs.get(name).cloned().ok_or_else(|| {
                DbError::Connection(format!("No configuration for connection '{}'", name))
            })?
        };

        let driver = connect(config.clone()).await?;

        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.instances.get(name) {
            debug!(connection = %name, "connection created concurrently, discarding");
            return Ok(Arc::clone(existing));
        }
        let shared = Arc::new(Mutex::new(Connection::new(driver, config)));
        inner.instances.insert(name.to_string(), Arc::clone(&shared));
        info!(connection = %name, "connection created");

        Ok(shared)
    }

    /// Whether a live connection exists for `name`
    pub async fn is_connected(&self, name: &str) -> bool {
        self.inner.lock().await.instances.contains_key(name)
    }

    /// Drop the connection for `name`, keeping its configuration
    pub async fn reset(&self, name: &str) -> bool {
        let removed = self.inner.lock().await.instances.remove(name).is_some();
        if removed {
            debug!(connection = %name, "connection reset");
        }
        removed
    }

    /// Drop every connection, keeping configurations
    pub async fn reset_all(&self) {
        let mut inner = self.inner.lock().await;
        debug!(count = inner.instances.len(), "resetting all connections");
        inner.instances.clear();
    }
}

impl ConnectionRegistry<MySqlDriver> {
    /// Shared MySQL connection for `name`
    pub async fn connection(&self, name: &str) -> Result<SharedConnection<MySqlDriver>> {
        self.instance(name, |config| async move { MySqlDriver::connect(&config).await })
            .await
    }
}
