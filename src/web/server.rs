use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Config;
use crate::fetcher::{FetchError, Fetcher, HttpTransport};
use crate::poller::{Poller, PollerError};
use crate::storage::{SampleStore, StorageError};

use super::api::iss as iss_handlers;
use super::api_doc::ApiDoc;
use super::rate_limit::{rate_limit_middleware, RateLimiter};
use super::state::AppState;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("source error: {0}")]
    Source(#[from] FetchError),
    #[error("poller error: {0}")]
    Poller(#[from] PollerError),
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut iss = Router::new()
        .route("/iss/sun", get(iss_handlers::read_sun))
        .route("/iss/position", get(iss_handlers::read_position));
    if let Some(limiter) = RateLimiter::from_config(&state.config.api.rate_limit) {
        iss = iss.route_layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    Router::new()
        .route("/", get(iss_handlers::read_root))
        .merge(iss)
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the position poller and serves the HTTP API until `shutdown`
/// resolves, then stops the poller after its current tick.
pub async fn run_server(
    config: Config,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let bind_addr = config.web.bind.clone();
    let store = Arc::new(SampleStore::open(&config.storage.path)?);

    let target = config.source.target();
    let transport = HttpTransport::new(&target)?;
    let mut poller = Poller::new(
        Fetcher::new(transport, target.url),
        store.clone(),
        config.source.wait_time(),
    );
    poller.start()?;
    log::debug!("Started ISS position poller");

    let state = AppState {
        config: Arc::new(config),
        store,
    };
    let app = router(state);

    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
        .await;

    poller.stop().await;
    log::info!("Poller {:?}", poller.state());
    served?;
    Ok(())
}
