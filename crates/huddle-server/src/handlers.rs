//! Connection handlers for the Huddle server.
//!
//! This module wires the HTTP surface and drives each connection: inbound
//! events go to the router, outbound events come from the hub queue.

use crate::config::{Config, CorsConfig};
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use axum::{
    extract::{ws::WebSocketUpgrade, ConnectInfo, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use huddle_core::{ConnectionId, PresenceRegistry, Router as ChatRouter};
use huddle_transport::{Connection, Hub, WebSocketConnection};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, trace, warn};

/// Shared server state.
pub struct AppState {
    /// The chat router.
    pub router: ChatRouter,
    /// Live connections and room subscriptions.
    pub hub: Arc<Hub>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let hub = Arc::new(Hub::new());
        let router =
            ChatRouter::with_config(PresenceRegistry::shared(), hub.clone(), config.router_config());

        Self {
            router,
            hub,
            config,
        }
    }
}

/// Build the HTTP application.
///
/// # Errors
///
/// Returns an error if a configured CORS origin is not a valid header value.
pub fn build_app(state: Arc<AppState>) -> Result<Router> {
    let static_files =
        ServeDir::new(&state.config.static_dir).append_index_html_on_directories(true);
    let cors = cors_layer(&state.config.cors)?;

    let mut app = Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    Ok(app)
}

fn cors_layer(config: &CorsConfig) -> Result<Option<CorsLayer>> {
    if config.allowed_origins.is_empty() {
        return Ok(None);
    }

    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET]),
    ))
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let addr = config.bind_addr()?;
    let state = Arc::new(AppState::new(config));
    let app = build_app(state.clone())?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Huddle server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, state.config.transport.websocket_path
    );
    info!("Serving static files from {}", state.config.static_dir.display());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.router.stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": state.hub.connection_count(),
        "participants": stats.participant_count,
        "rooms": stats.room_count,
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if state.hub.connection_count() >= state.config.limits.max_connections {
        warn!(remote = %addr, "Connection limit reached, refusing upgrade");
        metrics::record_error("connection_limit");
        return (StatusCode::SERVICE_UNAVAILABLE, "Connection limit reached").into_response();
    }

    ws.max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| {
            let conn = WebSocketConnection::new(ConnectionId::generate(), socket)
                .with_remote_addr(addr);
            serve_connection(conn, state)
        })
        .into_response()
}

/// Drive one connection until it closes.
pub async fn serve_connection<C: Connection>(mut conn: C, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();
    let id = conn.id().clone();

    debug!(connection = %id, remote = ?conn.remote_addr(), "WebSocket connected");

    let mut outbound = state.router.connect_with(&id, || state.hub.register(&id));

    loop {
        tokio::select! {
            biased;

            outgoing = outbound.recv() => {
                let Some(event) = outgoing else { break };
                match conn.send(&event).await {
                    Ok(size) => metrics::record_outbound(size),
                    Err(e) => {
                        debug!(connection = %id, error = %e, "Send failed");
                        metrics::record_error("send");
                        break;
                    }
                }
            }

            incoming = conn.recv() => {
                match incoming {
                    Ok(Some(event)) => {
                        let start = Instant::now();
                        metrics::record_event(event.event_type().as_str());

                        if let Err(e) = state.router.handle(&id, event) {
                            warn!(connection = %id, error = %e, "Rejected event");
                            metrics::record_error("invalid_event");
                        }

                        metrics::record_latency(start.elapsed().as_secs_f64());
                        metrics::set_presence(state.router.stats());
                    }
                    Ok(None) => break,
                    Err(e) if e.is_recoverable() => {
                        warn!(connection = %id, error = %e, "Dropped malformed frame");
                        metrics::record_error("protocol");
                    }
                    Err(e) => {
                        debug!(connection = %id, error = %e, "Receive failed");
                        metrics::record_error("websocket");
                        break;
                    }
                }
            }
        }
    }

    // Unregister first so the departing connection gets none of its own notices.
    state.hub.unregister(&id);
    state.router.disconnect(&id);
    metrics::set_presence(state.router.stats());

    if let Err(e) = conn.close().await {
        trace!(connection = %id, error = %e, "Close after disconnect failed");
    }

    debug!(connection = %id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        config.port = 0;
        config.metrics.enabled = false;
        config.static_dir = "does-not-exist".into();
        config
    }

    async fn spawn_server(config: Config) -> (SocketAddr, Arc<AppState>) {
        let state = Arc::new(AppState::new(config));
        let app = build_app(state.clone()).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        (addr, state)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        client
    }

    async fn send(client: &mut Client, value: Value) {
        client.send(WsMessage::Text(value.to_string())).await.unwrap();
    }

    async fn next_event(client: &mut Client) -> Value {
        loop {
            let frame = timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for event")
                .expect("stream ended")
                .expect("websocket error");
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    fn assert_notice(event: &Value, text: &str) {
        assert_eq!(event["event"], "message");
        assert_eq!(event["data"]["name"], "Admin");
        assert_eq!(event["data"]["text"], text);
        assert!(event["data"]["time"].is_string());
    }

    fn roster_names(event: &Value) -> Vec<String> {
        assert_eq!(event["event"], "userList");
        event["data"]["users"]
            .as_array()
            .unwrap()
            .iter()
            .map(|user| user["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_chat_session_end_to_end() {
        let (addr, state) = spawn_server(test_config()).await;

        let mut alice = connect(addr).await;
        assert_notice(&next_event(&mut alice).await, "Welcome to Chat App!");

        send(&mut alice, json!({"event": "enterRoom", "data": {"name": "alice", "room": "lobby"}})).await;
        assert_notice(&next_event(&mut alice).await, "You have joined the lobby chat room");
        assert_eq!(roster_names(&next_event(&mut alice).await), vec!["alice"]);
        assert_eq!(
            next_event(&mut alice).await,
            json!({"event": "roomList", "data": {"rooms": ["lobby"]}})
        );

        let mut bob = connect(addr).await;
        assert_notice(&next_event(&mut bob).await, "Welcome to Chat App!");

        send(&mut bob, json!({"event": "enterRoom", "data": {"name": "bob", "room": "lobby"}})).await;
        assert_notice(&next_event(&mut bob).await, "You have joined the lobby chat room");
        assert_eq!(roster_names(&next_event(&mut bob).await), vec!["alice", "bob"]);
        assert_eq!(next_event(&mut bob).await["event"], "roomList");

        assert_notice(&next_event(&mut alice).await, "bob has joined the room");
        assert_eq!(roster_names(&next_event(&mut alice).await), vec!["alice", "bob"]);
        assert_eq!(next_event(&mut alice).await["event"], "roomList");

        send(&mut bob, json!({"event": "message", "data": {"name": "bob", "text": "hi"}})).await;
        for client in [&mut alice, &mut bob] {
            let event = next_event(client).await;
            assert_eq!(event["event"], "message");
            assert_eq!(event["data"]["name"], "bob");
            assert_eq!(event["data"]["text"], "hi");
        }

        send(&mut alice, json!({"event": "activity", "data": "alice"})).await;
        assert_eq!(
            next_event(&mut bob).await,
            json!({"event": "activity", "data": "alice"})
        );

        assert_eq!(state.router.stats().participant_count, 2);

        bob.close(None).await.unwrap();
        assert_notice(&next_event(&mut alice).await, "bob has left the room");
        assert_eq!(roster_names(&next_event(&mut alice).await), vec!["alice"]);
        assert_eq!(
            next_event(&mut alice).await,
            json!({"event": "roomList", "data": {"rooms": ["lobby"]}})
        );
        assert_eq!(state.router.stats().participant_count, 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection() {
        let (addr, _state) = spawn_server(test_config()).await;

        let mut client = connect(addr).await;
        assert_notice(&next_event(&mut client).await, "Welcome to Chat App!");

        client
            .send(WsMessage::Text("not json".to_string()))
            .await
            .unwrap();
        send(&mut client, json!({"event": "shout", "data": {}})).await;
        send(&mut client, json!({"event": "enterRoom", "data": {"name": "carol", "room": "den"}})).await;

        assert_notice(&next_event(&mut client).await, "You have joined the den chat room");
    }

    #[tokio::test]
    async fn test_invalid_room_is_ignored() {
        let (addr, state) = spawn_server(test_config()).await;

        let mut client = connect(addr).await;
        assert_notice(&next_event(&mut client).await, "Welcome to Chat App!");

        send(&mut client, json!({"event": "enterRoom", "data": {"name": "dave", "room": "   "}})).await;
        send(&mut client, json!({"event": "enterRoom", "data": {"name": "dave", "room": "ok"}})).await;

        // The first join produced nothing; the next event belongs to the second.
        assert_notice(&next_event(&mut client).await, "You have joined the ok chat room");
        assert_eq!(state.router.stats().room_count, 1);
    }

    #[tokio::test]
    async fn test_connection_limit_refuses_upgrade() {
        let mut config = test_config();
        config.limits.max_connections = 0;
        let (addr, _state) = spawn_server(config).await;

        assert!(connect_async(format!("ws://{}/ws", addr)).await.is_err());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, _state) = spawn_server(test_config()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut response = String::new();
        timeout(Duration::from_secs(5), stream.read_to_string(&mut response))
            .await
            .unwrap()
            .unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        let health: Value = serde_json::from_str(body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["participants"], 0);
        assert_eq!(health["rooms"], 0);
    }

    #[test]
    fn test_cors_layer() {
        assert!(cors_layer(&CorsConfig::default()).unwrap().is_none());

        let config = CorsConfig {
            allowed_origins: vec!["http://localhost:5173".to_string()],
        };
        assert!(cors_layer(&config).unwrap().is_some());

        let config = CorsConfig {
            allowed_origins: vec!["bad\norigin".to_string()],
        };
        assert!(cors_layer(&config).is_err());
    }
}
