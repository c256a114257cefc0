use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::{AppConfig, StorageConfig};
use crate::state::AppState;
use crate::{auth, recipes};

pub fn build_app(state: AppState) -> Router {
    let media = media_routes(&state.config);

    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(recipes::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .merge(media)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

/// Uploaded files are served straight from disk when stored locally.
fn media_routes(config: &AppConfig) -> Router {
    match &config.storage {
        StorageConfig::Local { media_root } => {
            let prefix = config.media_url.trim_end_matches('/');
            if prefix.is_empty() {
                return Router::new();
            }
            Router::new().nest_service(prefix, ServeDir::new(media_root))
        }
        StorageConfig::S3(_) => Router::new(),
    }
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
