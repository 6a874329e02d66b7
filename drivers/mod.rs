// Transport package / 传输驱动包
pub mod memory;
pub mod s3;

use std::sync::Arc;

use crate::storage::TransportRegistry;

/// Register all transports to the registry / 注册所有传输驱动
pub fn register_all(registry: &mut TransportRegistry) {
    // Register S3 transport / 注册S3对象存储
    registry.register_factory(Arc::new(s3::S3TransportFactory));
    // Register in-process transport / 注册内存存储
    registry.register_factory(Arc::new(memory::MemoryTransportFactory::new()));
}
