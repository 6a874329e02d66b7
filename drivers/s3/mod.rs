//! S3 compatible transport (AWS S3, MinIO, OSS, COS) / S3兼容对象存储

mod config;
mod driver;
mod factory;

pub use driver::S3Transport;
pub use factory::S3TransportFactory;
