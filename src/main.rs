use dca_positions::engine::{Aggregator, IndexerRegistry, PositionTracker};
use dca_positions::{api, config::Config, GraphQlIndexer, HttpUnderlyingResolver, IndexerSource};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let mut sources = IndexerRegistry::new();
    for endpoint in &config.indexer_endpoints {
        let source: Arc<dyn IndexerSource> = Arc::new(GraphQlIndexer::new(endpoint.url.clone()));
        if sources
            .insert((endpoint.version, endpoint.chain_id), source)
            .is_some()
        {
            tracing::warn!(
                "Duplicate indexer for chain {} {}; keeping the last one",
                endpoint.chain_id,
                endpoint.version
            );
        }
    }
    tracing::info!("Configured {} indexing sources", sources.len());

    let resolver = Arc::new(HttpUnderlyingResolver::new(
        config.underlying_api_url.clone(),
    ));
    let aggregator = Aggregator::new(sources, resolver).with_page_size(config.indexer_page_size);
    let tracker = Arc::new(PositionTracker::new(aggregator));

    let app = api::create_router(api::AppState::new(tracker));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
