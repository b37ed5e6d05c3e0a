use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drivemaster_api::{
    config::Config,
    create_router,
    services::AppState,
    store::{MemorySnapshotStore, MemoryStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // OpenTelemetry export only when a collector is configured
    let tracer = match std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        Ok(endpoint) => Some(init_telemetry(endpoint)?),
        Err(_) => None,
    };
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drivemaster_api=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .with(tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer)))
        .init();

    tracing::info!("Starting DriveMaster API");

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded for environment: {:?}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    let bind_addr = config.bind_addr.clone();
    let app_state = if config.in_memory {
        tracing::warn!("Running on in-memory stores; progress is lost on restart");
        let store = Arc::new(MemoryStore::new());
        AppState::with_stores(config, store.clone(), store, Arc::new(MemorySnapshotStore::new()))
    } else {
        let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
            .await
            .context("Failed to connect to MongoDB")?;
        tracing::info!("MongoDB connected");

        let redis_client = redis::Client::open(config.redis_uri.clone())
            .context("Failed to create Redis client")?;

        AppState::new(config, mongo_client, redis_client)
            .await
            .context("Failed to initialize application state")?
    };

    let app = create_router(Arc::new(app_state));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_telemetry(endpoint: String) -> anyhow::Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .context("Failed to create OTLP exporter")?;

    let resource = Resource::builder_empty()
        .with_service_name("drivemaster-api")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer("drivemaster-api");
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracer)
}
