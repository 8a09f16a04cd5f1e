//! HTTP server implementation

use anyhow::Context;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServeConfig;
use crate::static_files::StaticFiles;

/// Build the router for a site root
pub fn router(files: StaticFiles) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/", get(index_handler))
        .route("/*path", get(static_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(files)
}

/// Bind and serve until SIGTERM or Ctrl-C
pub async fn serve(config: ServeConfig) -> anyhow::Result<()> {
    let files = StaticFiles::new(&config.root)?;

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?;

    info!(
        "Serving {} on http://{}",
        files.root().display(),
        listener.local_addr()?
    );

    axum::serve(listener, router(files))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "tutorial-serve"
    }))
}

async fn index_handler(State(files): State<StaticFiles>) -> Response {
    files.serve("index.html").await
}

async fn static_handler(State(files): State<StaticFiles>, Path(path): Path<String>) -> Response {
    files.serve(&path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn site() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("index.html"),
            "<title>Tutorial Examples</title>",
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("03-counter")).unwrap();
        std::fs::write(
            dir.path().join("03-counter/index.html"),
            "<span class=\"count\">0</span>",
        )
        .unwrap();
        let app = router(StaticFiles::new(dir.path()).unwrap());
        (dir, app)
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_root_serves_index() {
        let (_dir, app) = site();
        let resp = get(app, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Tutorial Examples"));
    }

    #[tokio::test]
    async fn test_example_directory_serves_its_index() {
        let (_dir, app) = site();
        let resp = get(app, "/03-counter/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("class=\"count\""));
    }

    #[tokio::test]
    async fn test_example_directory_without_slash_redirects() {
        let (_dir, app) = site();
        let resp = get(app, "/03-counter").await;
        assert_eq!(resp.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(resp.headers()[header::LOCATION], "/03-counter/");
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let (_dir, app) = site();
        let resp = get(app, "/99-missing/").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health() {
        let (_dir, app) = site();
        let resp = get(app, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }
}
