//! Edge gateway (`atelier edge`): the API proxy plus the navigation guard in
//! front of the frontend.
//!
//! `/api/*` goes to the backend untouched. Everything else goes through the
//! guard, which consumes the token authority's contract: local verification
//! with the shared secret and remote rotation via `POST /api/auth/refresh-token`.

use anyhow::Result;
use axum::{
    http::{HeaderName, HeaderValue},
    routing::any,
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::info;
use ulid::Ulid;

mod guard;
mod policy;
mod proxy;
mod state;

pub use policy::{Decision, RoutePolicy};
pub use state::EdgeState;

const REQUEST_ID: &str = "x-request-id";

#[must_use]
pub fn router(state: Arc<EdgeState>) -> Router {
    Router::new()
        .route("/api/*path", any(proxy::proxy))
        .fallback(guard::guard)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(crate::api::make_span))
                .layer(Extension(state)),
        )
}

/// Start the edge gateway
///
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, state: Arc<EdgeState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Edge listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}
