//! WebSocketTransport - foxglove WebSocket v1 over axum

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use contracts::{ContractError, OutboundFrame, ViewerTransport};

use crate::error::PublisherError;
use crate::protocol::{ClientMessage, SUBPROTOCOL};
use crate::publisher::SessionConnector;

/// Write half of one viewer WebSocket
pub struct WebSocketTransport {
    name: String,
    sink: SplitSink<WebSocket, Message>,
}

impl WebSocketTransport {
    pub fn new(name: impl Into<String>, sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            name: name.into(),
            sink,
        }
    }

    fn write_error(&self, e: axum::Error) -> ContractError {
        ContractError::session_write(&self.name, e.to_string())
    }
}

impl ViewerTransport for WebSocketTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&mut self, frame: OutboundFrame) -> Result<(), ContractError> {
        let message = match frame {
            OutboundFrame::Text(text) => Message::Text(text.into()),
            OutboundFrame::Binary(data) => Message::Binary(data),
        };
        let result = self.sink.send(message).await;
        result.map_err(|e| self.write_error(e))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        let result = self.sink.flush().await;
        result.map_err(|e| self.write_error(e))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        let result = self.sink.close().await;
        result.map_err(|e| self.write_error(e))
    }
}

/// Running viewer endpoint
pub struct WebSocketServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WebSocketServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for the listener task
    #[instrument(name = "websocket_server_shutdown", skip(self))]
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            error!(error = ?e, "WebSocket server task panicked");
        }
    }
}

/// Bind the viewer endpoint; every upgraded connection becomes a session.
#[instrument(name = "websocket_serve", skip(connector))]
pub async fn serve(
    host: &str,
    port: u16,
    connector: SessionConnector,
) -> Result<WebSocketServer, PublisherError> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| PublisherError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr = listener.local_addr()?;

    let app = Router::new()
        .route("/", get(ws_handler))
        .with_state(connector);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = server.await {
            error!(error = %e, "WebSocket server failed");
        }
    });

    info!(%local_addr, protocol = SUBPROTOCOL, "Viewer endpoint listening");

    Ok(WebSocketServer {
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        task,
    })
}

async fn ws_handler(ws: WebSocketUpgrade, State(connector): State<SessionConnector>) -> Response {
    ws.protocols([SUBPROTOCOL])
        .on_upgrade(move |socket| handle_socket(socket, connector))
}

/// Read loop of one connection; writes go through the session worker.
async fn handle_socket(socket: WebSocket, connector: SessionConnector) {
    let (sink, mut stream) = socket.split();

    let link = match connector.connect(WebSocketTransport::new("websocket", sink)) {
        Ok(link) => link,
        Err(e) => {
            warn!(error = %e, "Viewer connection rejected");
            return;
        }
    };
    info!(session = link.id(), "Viewer connected");

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => match ClientMessage::parse(text.as_str()) {
                Ok(message) => {
                    if !link.forward(message) {
                        break;
                    }
                }
                Err(e) => {
                    warn!(session = link.id(), error = %e, "Malformed client message");
                }
            },
            Ok(Message::Binary(_)) => {
                debug!(session = link.id(), "Ignoring binary client message");
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(session = link.id(), error = %e, "Viewer socket error");
                break;
            }
        }
    }

    link.disconnect();
    info!(session = link.id(), "Viewer disconnected");
}
