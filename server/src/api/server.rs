use anyhow::Result;
use axum::{
    http::Uri,
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use super::rate_limit::{rate_limit_layer, rate_limit_middleware};
use super::{regions, spectator, subjects};
use crate::clock::Clock;
use crate::replay::ReplayService;
use crate::storage::SubjectStore;
use crate::transport::IdentityDirectory;

/// Requests per minute allowed on the subject registration endpoints
const SUBJECT_REQUESTS_PER_MINUTE: usize = 30;

#[derive(Clone)]
pub struct ApiState {
    pub replay: ReplayService,
    pub subjects: Arc<dyn SubjectStore>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub clock: Arc<dyn Clock>,
}

pub fn build_router(state: ApiState, compress_responses: bool, cancellation_token: CancellationToken) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let subject_limiter = rate_limit_layer(SUBJECT_REQUESTS_PER_MINUTE, 60, cancellation_token);

    let subject_routes = Router::new()
        .route("/api/subjects/:region/:name", post(subjects::add_subject))
        .route("/api/challengers/:region", post(subjects::add_challengers))
        .layer(middleware::from_fn_with_state(subject_limiter, rate_limit_middleware));

    let mut app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/regions", get(regions::list_regions))
        .merge(subject_routes)
        .merge(spectator::routes())
        .fallback(fallback)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if compress_responses {
        app = app.layer(CompressionLayer::new());
    }
    app
}

pub async fn run_api_server(addr: &str, app: Router, cancellation_token: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { cancellation_token.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("API server error: {}", e))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn fallback(uri: Uri) -> impl IntoResponse {
    debug!("No route for {}", uri);
    axum::http::StatusCode::NOT_FOUND
}
