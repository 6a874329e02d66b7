use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redactor_s3::config;
use redactor_s3::storage::{ObjectStorage, TransportRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redactor_s3=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    config::init_config()?;
    let app_config = config::config();
    tracing::info!("Server will listen on {}:{}", app_config.server.host, app_config.server.port);

    // Register transport factories / 注册传输工厂
    let registry = TransportRegistry::with_defaults();
    tracing::info!("Available storage providers: {:?}", registry.providers());

    let storage = ObjectStorage::new(app_config.storage.clone(), &registry)?;
    tracing::info!(
        "Using bucket {} (provider {}, prefix {:?})",
        storage.bucket(),
        app_config.storage.provider,
        storage.prefix()
    );

    let app = redactor_s3::create_router(Arc::new(storage), &app_config);

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
