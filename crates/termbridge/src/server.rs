//! HTTP and WebSocket surface.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{Message as WsMessage, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use futures::{future, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{info, instrument, warn};

use termbridge_core::{Error, ProbeRequest, ProbeResponse, ServerConfig, ServerMessage};
use termbridge_session::{probe, RelaySession, SessionRegistry};

/// Application state shared across routes
#[derive(Clone)]
pub struct AppState {
    /// Validated server configuration
    pub config: Arc<ServerConfig>,
    /// Live client connections
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    /// Build state for a configuration.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.server.max_sessions));
        Self {
            config: Arc::new(config),
            registry,
        }
    }
}

/// Create router with all routes
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.config.server.static_dir.clone();

    let mut app = Router::new()
        .route("/ws/shell", get(shell_handler))
        .route("/api/probe", post(probe_handler))
        .route("/api/sessions", get(list_sessions))
        .route("/health", get(health))
        .with_state(state);

    // Serve the browser terminal if a static directory is configured
    if let Some(dir) = static_dir {
        info!("Serving static files from {}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    // Add CORS layer for development front ends
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    app.layer(cors).layer(TraceLayer::new_for_http())
}

/// Bind the listener and serve until the process exits.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let listener =
        tokio::net::TcpListener::bind((config.server.bind_address.as_str(), config.server.port))
            .await?;
    let local = listener.local_addr()?;
    let app = create_router(AppState::new(config));

    info!("termbridge listening on http://{}", local);
    info!("WebSocket endpoint: ws://{}/ws/shell", local);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK", "service": "termbridge" }))
}

/// GET /api/sessions - List live client connections
async fn list_sessions(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.registry.list();
    Json(serde_json::json!({ "sessions": sessions }))
}

/// POST /api/probe - One-shot probe of a Telnet host
#[instrument(skip_all)]
async fn probe_handler(
    State(state): State<AppState>,
    payload: Result<Json<ProbeRequest>, JsonRejection>,
) -> (StatusCode, Json<ProbeResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let message = Error::MalformedMessage(rejection.body_text()).to_string();
            return (StatusCode::BAD_REQUEST, Json(ProbeResponse::failed(message)));
        }
    };

    match probe(&request, &state.config).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(e @ (Error::InvalidAddress(_) | Error::InvalidPort(_))) => {
            info!("Rejected probe: {}", e);
            (StatusCode::BAD_REQUEST, Json(ProbeResponse::failed(e.to_string())))
        }
        Err(e) => {
            warn!("Probe failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ProbeResponse::failed(e.to_string())),
            )
        }
    }
}

/// GET /ws/shell - Interactive relay session
#[instrument(skip_all)]
async fn shell_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let peer = peer.map(|ConnectInfo(addr)| addr.to_string());
    ws.on_upgrade(move |socket| handle_shell(socket, state, peer))
}

/// Run one relay session for the lifetime of the WebSocket.
async fn handle_shell(mut socket: WebSocket, state: AppState, peer: Option<String>) {
    let info = match state.registry.register(peer) {
        Ok(info) => info,
        Err(e) => {
            warn!("Refusing WebSocket: {}", e);
            if let Ok(json) = ServerMessage::from(&e).to_json() {
                let _ = socket.send(WsMessage::Text(json)).await;
            }
            let _ = socket.close().await;
            return;
        }
    };
    info!(
        "WebSocket session {} opened from {}",
        info.id,
        info.peer.as_deref().unwrap_or("unknown")
    );

    let (mut ws_sink, ws_stream) = socket.split();
    let (outbox, mut replies) = mpsc::channel::<ServerMessage>(state.config.server.queue_depth);

    // Spawn task to send messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(message) = replies.recv().await {
            match message.to_json() {
                Ok(json) => {
                    if ws_sink.send(WsMessage::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Could not encode reply: {}", e),
            }
        }
        let _ = ws_sink.close().await;
    });

    // Text frames go to the relay; a close frame or transport error ends it
    let rejects = outbox.clone();
    let inbound = ws_stream
        .take_while(|frame| future::ready(matches!(frame, Ok(m) if !matches!(m, WsMessage::Close(_)))))
        .filter_map(move |frame| {
            let rejects = rejects.clone();
            async move {
                match frame {
                    Ok(WsMessage::Text(text)) => Some(text),
                    Ok(WsMessage::Binary(_)) => {
                        let err = Error::MalformedMessage("binary frames are not supported".into());
                        let _ = rejects.send(ServerMessage::from(&err)).await;
                        None
                    }
                    _ => None,
                }
            }
        });

    let (relay, events) = RelaySession::new(info.id, Arc::clone(&state.config), outbox);
    relay.run(Box::pin(inbound), events).await;

    state.registry.unregister(&info.id);
    let _ = send_task.await;
    info!("WebSocket session {} closed", info.id);
}
