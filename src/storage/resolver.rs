//! Lazily built transport client / 懒加载的传输客户端

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{ObjectTransport, TransportCredentials, TransportFactory};
use crate::error::StorageError;

/// Credentials resolver: owns the credentials and the single shared client.
///
/// Concurrent first use blocks on the cell, so at most one client is built.
/// A failed construction is not cached.
pub struct ClientResolver {
    credentials: TransportCredentials,
    factory: Arc<dyn TransportFactory>,
    client: OnceCell<Arc<dyn ObjectTransport>>,
}

impl ClientResolver {
    pub fn new(credentials: TransportCredentials, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            credentials,
            factory,
            client: OnceCell::new(),
        }
    }

    /// Get (building on first use) the transport client / 获取传输客户端
    pub fn client(&self) -> Result<Arc<dyn ObjectTransport>, StorageError> {
        self.client
            .get_or_try_init(|| {
                tracing::debug!(
                    "Building {} transport client for region {}",
                    self.factory.provider(),
                    self.credentials.region
                );
                self.factory.create_transport(&self.credentials)
            })
            .map(Arc::clone)
    }

    pub fn is_initialized(&self) -> bool {
        self.client.get().is_some()
    }

    pub fn region(&self) -> &str {
        &self.credentials.region
    }
}
