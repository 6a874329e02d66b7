use std::collections::HashMap;
use std::sync::Arc;

use super::TransportFactory;
use crate::error::ConfigError;

/// Transport factory registry (provider name -> factory) / 传输工厂注册表
#[derive(Clone, Default)]
pub struct TransportRegistry {
    factories: HashMap<String, Arc<dyn TransportFactory>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in provider / 注册所有内置提供方
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all(&mut registry);
        registry
    }

    /// Register transport factory / 注册传输工厂
    pub fn register_factory(&mut self, factory: Arc<dyn TransportFactory>) {
        let provider = factory.provider().to_string();
        self.factories.insert(provider.clone(), factory);
        tracing::info!("Transport factory registered: {}", provider);
    }

    /// Look up the factory for a provider / 获取提供方的工厂
    pub fn get_factory(&self, provider: &str) -> Result<Arc<dyn TransportFactory>, ConfigError> {
        self.factories
            .get(provider)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProvider(provider.to_string()))
    }

    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}
