//! HTTP transport for the auth service.
//!
//! Thin JSON adapter: handlers validate input, build a per-request
//! [`CallContext`] and map [`AuthError`](crate::auth::AuthError) kinds to
//! status codes. All business rules live in [`AuthService`].

use crate::auth::{AuthService, CallContext};
use anyhow::Result;
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    routing::{delete, get, post},
    Router,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;

pub(crate) mod handlers;

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct ApiState {
    auth: Arc<AuthService>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl ApiState {
    #[must_use]
    pub fn new(auth: Arc<AuthService>, request_timeout: Duration) -> Self {
        Self {
            auth,
            request_timeout,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling `shutdown` stops the server and aborts in-flight calls.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    #[must_use]
    pub fn shutdown(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Context for one request: bounded by the request timeout and cancelled
    /// on server shutdown.
    #[must_use]
    pub fn call_context(&self) -> CallContext {
        CallContext::new()
            .with_cancellation(self.shutdown.child_token())
            .with_timeout(self.request_timeout)
    }
}

/// Build the router with every route and the request-id/trace layers.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/validate", post(handlers::auth::validate))
        .route("/auth/is-admin", post(handlers::auth::is_admin))
        .route("/users/:id", delete(handlers::users::delete))
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn serve(port: u16, state: ApiState) -> Result<()> {
    let shutdown = state.shutdown().clone();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    () = shutdown.cancelled() => return,
                }
            }
            Err(err) => {
                error!("Failed to register SIGTERM handler: {}", err);
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received SIGINT"),
                    () = shutdown.cancelled() => return,
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
            () = shutdown.cancelled() => return,
        }
    }

    shutdown.cancel();
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
