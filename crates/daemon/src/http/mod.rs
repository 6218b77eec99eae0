// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP control surface.
//!
//! `/mcp` carries the tool-call protocol with header-addressed sessions;
//! `/events` streams the bus; the `/api` routes expose read-only admin
//! state. Binds loopback by default and stays there unless configured
//! otherwise.

use crate::sessions::SessionRegistry;
use crate::supervisor::Supervisor;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::Stream;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use swarm_client::ClientFactory;
use swarm_core::{Clock, SessionId};
use swarm_wire::{method, JsonRpcMessage, SESSION_HEADER};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::mcp::ToolServer;

/// Interval between explicit ping frames on `/events`.
const EVENTS_PING_INTERVAL: Duration = Duration::from_secs(15);

/// Shared state behind every route.
pub struct AppState<F: ClientFactory, C: Clock> {
    pub sessions: Arc<SessionRegistry<F, C>>,
    pub tools: ToolServer<F, C>,
    pub started_at: Instant,
}

impl<F: ClientFactory, C: Clock> Clone for AppState<F, C> {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            tools: self.tools.clone(),
            started_at: self.started_at,
        }
    }
}

impl<F: ClientFactory, C: Clock> AppState<F, C> {
    fn supervisor(&self) -> &Supervisor<F, C> {
        self.sessions.supervisor()
    }
}

/// Build the full router; CORS (headers + OPTIONS preflight) attaches
/// when configured.
pub fn router<F: ClientFactory, C: Clock>(state: AppState<F, C>) -> Router {
    let cors = state.supervisor().config().cors;
    let router = Router::new()
        .route(
            "/mcp",
            axum::routing::post(mcp_post::<F, C>)
                .get(mcp_stream::<F, C>)
                .delete(mcp_delete::<F, C>),
        )
        .route("/health", get(health::<F, C>))
        .route("/events", get(events::<F, C>))
        .route("/api/sessions", get(api_sessions::<F, C>))
        .route("/api/logs/:base", get(api_logs::<F, C>))
        .route("/api/config", get(api_config::<F, C>))
        .with_state(state);
    if cors {
        let layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers([HeaderName::from_static("mcp-session-id")]);
        router.layer(layer)
    } else {
        router
    }
}

/// Serve until `shutdown` fires.
pub async fn serve<F: ClientFactory, C: Clock>(
    state: AppState<F, C>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let config = state.supervisor().config().clone();
    let app = router(state);

    if let Some(socket_path) = &config.socket_path {
        // A configured unix socket overrides host:port entirely.
        let _ = tokio::fs::remove_file(socket_path).await;
        let listener = tokio::net::UnixListener::bind(socket_path)?;
        info!(socket = %socket_path.display(), "listening on unix socket");
        return serve_unix(listener, app, shutdown).await;
    }

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Accept loop for unix-socket serving; each connection runs on its own
/// task under hyper's auto (HTTP/1 + HTTP/2) connection builder.
async fn serve_unix(
    listener: tokio::net::UnixListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    use hyper_util::rt::{TokioExecutor, TokioIo};
    use tower::{Service, ServiceExt};

    let mut make_service = app.into_make_service();
    loop {
        let (stream, _addr) = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            accepted = listener.accept() => accepted?,
        };
        let tower_service = match make_service.call(&stream).await {
            Ok(service) => service,
            Err(_) => continue,
        };
        tokio::spawn(async move {
            let socket = TokioIo::new(stream);
            let hyper_service = hyper::service::service_fn(
                move |request: hyper::Request<hyper::body::Incoming>| {
                    tower_service.clone().oneshot(request)
                },
            );
            if let Err(e) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(socket, hyper_service)
                .await
            {
                debug!("unix connection error: {e}");
            }
        });
    }
}

fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(SessionId::from_string)
}

fn error_body(code: i64, message: &str) -> Json<Value> {
    Json(json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": { "code": code, "message": message },
    }))
}

/// POST /mcp: protocol messages, session minting on initialize.
pub(crate) async fn mcp_post<F: ClientFactory, C: Clock>(
    State(state): State<AppState<F, C>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, HeaderMap, Json<Value>) {
    let message: JsonRpcMessage = match serde_json::from_value(body) {
        Ok(message) => message,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                HeaderMap::new(),
                error_body(-32700, &format!("parse error: {e}")),
            );
        }
    };
    let is_initialize = message.method() == Some(method::INITIALIZE);

    // Resolve (or mint) the owning session.
    let session = match session_from_headers(&headers) {
        Some(id) => match state.sessions.get(&id) {
            Some(handle) => handle,
            // Per the protocol, a POSTed initialize with a stale id may
            // mint a fresh session; anything else is gone.
            None if is_initialize => match state.sessions.open() {
                Ok(handle) => handle,
                Err(e) => {
                    return (
                        StatusCode::SERVICE_UNAVAILABLE,
                        HeaderMap::new(),
                        error_body(-32000, &e.to_string()),
                    );
                }
            },
            None => {
                return (
                    StatusCode::NOT_FOUND,
                    HeaderMap::new(),
                    error_body(-32001, "unknown session"),
                );
            }
        },
        None if is_initialize => match state.sessions.open() {
            Ok(handle) => handle,
            Err(e) => {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    HeaderMap::new(),
                    error_body(-32000, &e.to_string()),
                );
            }
        },
        None => {
            return (
                StatusCode::BAD_REQUEST,
                HeaderMap::new(),
                error_body(-32600, "missing session header"),
            );
        }
    };

    let mut response_headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(session.id.as_str()) {
        response_headers.insert(SESSION_HEADER, value);
    }

    let server = state.tools.for_session(session.id.clone());
    match server.handle(message).await {
        Some(response) => {
            let body = serde_json::to_value(&response).unwrap_or(Value::Null);
            (StatusCode::OK, response_headers, Json(body))
        }
        // Notifications are accepted without a body.
        None => (StatusCode::ACCEPTED, response_headers, Json(Value::Null)),
    }
}

/// GET /mcp: the session's server-push stream.
pub(crate) async fn mcp_stream<F: ClientFactory, C: Clock>(
    State(state): State<AppState<F, C>>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let id = session_from_headers(&headers).ok_or(StatusCode::BAD_REQUEST)?;
    let handle = state.sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let rx = handle.take_push_stream().ok_or(StatusCode::CONFLICT)?;

    let stream = ReceiverStream::new(rx).map(|message| {
        let data = serde_json::to_string(&message).unwrap_or_default();
        Ok(Event::default().event("message").data(data))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(EVENTS_PING_INTERVAL)))
}

/// DELETE /mcp: explicit session end.
pub(crate) async fn mcp_delete<F: ClientFactory, C: Clock>(
    State(state): State<AppState<F, C>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let Some(id) = session_from_headers(&headers) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "missing session header"})));
    };
    if state.sessions.close(&id).await {
        (StatusCode::OK, Json(json!({"ok": true})))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"error": "unknown session"})))
    }
}

pub(crate) async fn health<F: ClientFactory, C: Clock>(
    State(state): State<AppState<F, C>>,
) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "mode": state.supervisor().config().mode,
        "sessions": state.sessions.count(),
        "workers": state.supervisor().list().len(),
        "uptime_s": state.started_at.elapsed().as_secs(),
    }))
}

/// GET /events: every bus event as a data frame, with explicit pings.
pub(crate) async fn events<F: ClientFactory, C: Clock>(
    State(state): State<AppState<F, C>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut bus_rx = state.supervisor().bus().subscribe();
    let (tx, rx) = tokio::sync::mpsc::channel::<String>(64);

    tokio::spawn(async move {
        let mut ping = tokio::time::interval(EVENTS_PING_INTERVAL);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                received = bus_rx.recv() => match received {
                    Ok(envelope) => {
                        let frame = serde_json::to_string(&envelope).unwrap_or_default();
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                    }
                    // A lagged subscriber lost its own backlog; resume.
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "event stream lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = ping.tick() => {
                    if tx.send(r#"{"type":"ping"}"#.to_string()).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|data| Ok(Event::default().data(data)));
    Sse::new(stream)
}

pub(crate) async fn api_sessions<F: ClientFactory, C: Clock>(
    State(state): State<AppState<F, C>>,
) -> Json<Value> {
    Json(json!({ "sessions": state.sessions.meta() }))
}

pub(crate) async fn api_logs<F: ClientFactory, C: Clock>(
    State(state): State<AppState<F, C>>,
    Path(base): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let cell = state.supervisor().cell(&base).ok_or(StatusCode::NOT_FOUND)?;
    let lines = cell.client().map(|c| c.stderr_tail()).unwrap_or_default();
    Ok(Json(json!({ "worker": base, "lines": lines })))
}

pub(crate) async fn api_config<F: ClientFactory, C: Clock>(
    State(state): State<AppState<F, C>>,
) -> Json<Value> {
    Json(serde_json::to_value(state.supervisor().config()).unwrap_or(Value::Null))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
