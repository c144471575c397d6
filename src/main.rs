use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use htsnexus::{
    Config,
    handlers::{AppState, create_router},
    index::{CachedIndexStore, SqliteIndexStore},
    location::{BlobSigner, LocationResolver},
    range::RangeResolver,
    response::ResponseAssembler,
    service::TicketService,
};

#[cfg(feature = "s3")]
fn blob_signer(config: &Config) -> anyhow::Result<Option<Arc<dyn BlobSigner>>> {
    use htsnexus::location::{S3Credentials, S3Signer};

    let Some(path) = &config.credentials else {
        return Ok(None);
    };
    let credentials = S3Credentials::from_file(path)?;
    tracing::info!("Loaded S3 credentials from {:?}", path);
    let signer: Arc<dyn BlobSigner> = Arc::new(S3Signer::new(credentials, config.presign_expiry()));
    Ok(Some(signer))
}

#[cfg(not(feature = "s3"))]
fn blob_signer(config: &Config) -> anyhow::Result<Option<Arc<dyn BlobSigner>>> {
    if config.credentials.is_some() {
        anyhow::bail!("--credentials requires the s3 feature");
    }
    Ok(None)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = SqliteIndexStore::open(&config.index_db, config.binning_strategy())?;
    let locations = LocationResolver::new(
        config.data_dir.clone(),
        blob_signer(&config)?,
        config.lookup_timeout(),
    );

    let blob_accessions = store.count_blob_accessions().await?;
    if blob_accessions > 0 && !locations.can_sign() {
        tracing::warn!(
            blob_accessions,
            "index has S3 accessions but no credentials were supplied; their tickets will fail"
        );
    }

    let index_path = store.path().to_path_buf();
    let store = Arc::new(CachedIndexStore::new(
        Arc::new(store),
        config.cache_capacity,
        config.lookup_timeout(),
    ));
    let service = TicketService::new(
        RangeResolver::new(store),
        locations,
        ResponseAssembler::new(&config.effective_base_url(), config.max_payload)?,
    );

    let state = AppState {
        service: Arc::new(service),
        default_namespace: config.default_namespace.clone(),
        max_payload: config.max_payload,
    };

    let app = create_router(state);
    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting htsnexus server on {}", addr);
    tracing::info!("Index database: {:?}", index_path);
    tracing::info!("Data directory: {:?}", config.data_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
