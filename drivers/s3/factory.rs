//! S3传输工厂

use std::sync::Arc;

use super::driver::S3Transport;
use crate::error::StorageError;
use crate::storage::{ObjectTransport, TransportCredentials, TransportFactory};

/// S3传输工厂
pub struct S3TransportFactory;

impl TransportFactory for S3TransportFactory {
    fn provider(&self) -> &'static str {
        "s3"
    }

    fn create_transport(
        &self,
        credentials: &TransportCredentials,
    ) -> Result<Arc<dyn ObjectTransport>, StorageError> {
        Ok(Arc::new(S3Transport::new(credentials)?))
    }
}
