pub mod config;
pub mod deadline;
pub mod error;
pub mod routes;
pub mod state;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(config: ServerConfig) -> Router {
    let cors = cors_layer(config.cors_origin.as_deref());
    let body_limit = DefaultBodyLimit::max(config.max_upload_bytes);
    let app_state = state::AppState::new(config);

    Router::new()
        .route("/status", get(routes::status::status))
        .route("/get_ifc_values", post(routes::values::get_ifc_values))
        .route("/modify_ifc", post(routes::modify::modify_ifc))
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// CORS for the browser front end. No origin, an empty one, or `*` (alone
/// or anywhere in the list) allows any origin.
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([
            header::CONTENT_DISPOSITION,
            HeaderName::from_static(routes::modify::SAVED_FILE_HEADER),
        ]);

    let entries: Vec<&str> = origin
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();
    if entries.is_empty() || entries.contains(&"*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = entries
        .into_iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Serve on a pre-bound listener until `shutdown` resolves.
///
/// Creates the upload and output directories first, so the service never
/// starts without somewhere to stage files.
pub async fn serve_on<F>(
    config: ServerConfig,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    config.prepare_dirs()?;
    let addr = listener.local_addr()?;
    let app = build_router(config);

    tracing::info!("IFC service listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("IFC service stopped");
    Ok(())
}
