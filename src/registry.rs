//! Named logical connections with lazily created executor handles.
//!
//! The registry is an explicit object passed to every operation. Each
//! connection performs its handshake at most once; concurrent first callers
//! wait on the same initialisation.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::ConnectionConfig;
use crate::service::{ExecutionError, GraphExecutor};

/// Opens executor handles. Called at most once per registered connection.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Performs the handshake for `identity`.
    async fn connect(
        &self,
        identity: &str,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn GraphExecutor>, ExecutionError>;
}

/// Registration failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Empty identity.
    #[error("connection is missing an identity")]
    MissingIdentity,
    /// Identity registered earlier in this process.
    #[error("connection '{0}' is already registered")]
    AlreadyRegistered(String),
    /// No connection under this identity.
    #[error("connection '{0}' is not registered")]
    NotRegistered(String),
}

/// One registered logical connection.
pub struct Connection {
    identity: String,
    config: ConnectionConfig,
    handle: OnceCell<Arc<dyn GraphExecutor>>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("identity", &self.identity)
            .field("endpoint", &self.config.redacted_endpoint())
            .field("open", &self.handle.initialized())
            .finish()
    }
}

impl Connection {
    /// Registered identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Settings supplied at registration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// True once the handshake has completed.
    pub fn is_open(&self) -> bool {
        self.handle.initialized()
    }

    /// Returns the shared handle, performing the handshake on first use.
    /// A failed handshake leaves the connection unopened so a later call
    /// may try again.
    pub async fn executor(
        &self,
        connector: &dyn Connector,
    ) -> Result<Arc<dyn GraphExecutor>, ExecutionError> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                let executor = connector.connect(&self.identity, &self.config).await?;
                info!(
                    connection = %self.identity,
                    endpoint = %self.config.redacted_endpoint(),
                    "registry.connection.open"
                );
                Ok::<_, ExecutionError>(executor)
            })
            .await?;
        Ok(Arc::clone(handle))
    }
}

/// Process-wide table of logical connections.
pub struct ConnectionRegistry {
    connector: Arc<dyn Connector>,
    connections: Mutex<HashMap<String, Arc<Connection>>>,
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connections = self.connections.lock();
        let mut names: Vec<&String> = connections.keys().collect();
        names.sort();
        f.debug_struct("ConnectionRegistry")
            .field("connections", &names)
            .finish()
    }
}

impl ConnectionRegistry {
    /// Creates an empty registry opening handles through `connector`.
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `identity`. No handshake happens until first use.
    pub fn register(&self, identity: &str, config: ConnectionConfig) -> Result<(), RegistryError> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(RegistryError::MissingIdentity);
        }
        let mut connections = self.connections.lock();
        if connections.contains_key(identity) {
            warn!(connection = identity, "registry.connection.duplicate");
            return Err(RegistryError::AlreadyRegistered(identity.to_string()));
        }
        connections.insert(
            identity.to_string(),
            Arc::new(Connection {
                identity: identity.to_string(),
                config,
                handle: OnceCell::new(),
            }),
        );
        Ok(())
    }

    /// Looks up a registered connection. Surrounding whitespace is ignored,
    /// as at registration.
    pub fn connection(&self, identity: &str) -> Result<Arc<Connection>, RegistryError> {
        let identity = identity.trim();
        self.connections
            .lock()
            .get(identity)
            .cloned()
            .ok_or_else(|| RegistryError::NotRegistered(identity.to_string()))
    }

    /// Registered identities, sorted.
    pub fn identities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Shared executor for `identity`, opening it on first use.
    pub async fn executor(&self, identity: &str) -> crate::Result<Arc<dyn GraphExecutor>> {
        let connection = self.connection(identity)?;
        Ok(connection.executor(self.connector.as_ref()).await?)
    }
}
