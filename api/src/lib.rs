mod error;
mod live_ws;
mod response;
mod routes;
mod state;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use axum::http::{header::CONTENT_TYPE, Method};
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the HTTP + WebSocket application.
///
/// Handlers read the peer address through `ConnectInfo<SocketAddr>`, so the
/// router must be served with connect info (or given a `MockConnectInfo`
/// layer in tests).
pub fn build_router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]);

    routes::create_routes()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// On shutdown the broadcast hub is closed first so that open live
/// connections end and the graceful drain can finish.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    state: ApiState,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let hub = state.service.hub().clone();
    let app = build_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        hub.shutdown().await;
    })
    .await
}

pub async fn start_server<F>(
    addr: SocketAddr,
    state: ApiState,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "api_listening");

    serve(listener, state, shutdown).await?;

    Ok(())
}
