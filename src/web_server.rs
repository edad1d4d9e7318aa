use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse},
    routing::get,
    serve, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::collaborator::Collaborator;
use crate::render::Templates;
use crate::session::{run_session, ClientFrame, ServerFrame, SessionContext};
use crate::transcript::Transcript;

// Shared application state. Nothing conversation-specific lives here:
// every WebSocket connection builds its own conversation.
#[derive(Clone)]
pub struct AppState {
    templates: Arc<Templates>,
    collaborator: Arc<dyn Collaborator>,
    timeout: Duration,
}

impl AppState {
    pub fn new(collaborator: Arc<dyn Collaborator>, timeout: Duration) -> Result<Self> {
        let templates = Templates::new().context("Failed to initialize template engine")?;
        Ok(Self {
            templates: Arc::new(templates),
            collaborator,
            timeout,
        })
    }
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, Html<String>> {
    // A new page always starts from the greeting; the live session begins once the socket opens.
    state
        .templates
        .render_index(&Transcript::new(), false)
        .map(Html)
        .map_err(|e| {
            error!("Failed to render template: {}", e);
            Html(format!("Internal Server Error: {}", e))
        })
}

// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

// Bridge one WebSocket onto a chat session.
async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("New chat session established");
    let (mut sink, stream) = socket.split();
    let (frame_tx, mut frame_rx) = mpsc::channel::<ServerFrame>(16);

    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server frame: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                warn!("WebSocket client disconnected or send error. Closing connection.");
                break;
            }
        }
    });

    // Stop at Close or a transport error; skip anything that is not a client frame.
    let incoming = stream
        .take_while(|msg| futures::future::ready(matches!(msg, Ok(m) if !matches!(m, Message::Close(_)))))
        .filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        warn!("Ignoring malformed client frame: {}", e);
                        None
                    }
                },
                Ok(Message::Binary(_)) => {
                    warn!("Received unexpected binary message from client");
                    None
                }
                _ => None,
            }
        });
    let incoming = Box::pin(incoming);

    let ctx = SessionContext {
        collaborator: state.collaborator,
        templates: state.templates,
        timeout: state.timeout,
    };
    if let Err(e) = run_session(incoming, frame_tx, ctx).await {
        error!("Chat session failed: {:?}", e);
    }

    // The writer ends once the session drops its sender.
    if let Err(e) = writer.await {
        error!("WebSocket writer task failed: {:?}", e);
    }
    info!("Chat session closed");
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let app = build_router(state);
    info!("Web server listening on http://{}", addr);

    // Bind using tokio::net::TcpListener
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
