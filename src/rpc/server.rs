//! WebSocket server for the RPC interface

use std::future::Future;
use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async_with_config;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, instrument, warn};

use crate::rpc::dispatch::Dispatcher;
use crate::rpc::protocol::Response;
use crate::rpc::Result;

/// Server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub listen_addr: SocketAddr,

    /// Largest accepted message or frame, in bytes
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 2022)),
            max_message_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}

/// Accepts WebSocket connections and serves RPC frames
pub struct RpcServer {
    listener: TcpListener,
    dispatcher: Dispatcher,
    config: ServerConfig,
}

impl RpcServer {
    /// Bind the listener
    #[instrument(skip(dispatcher))]
    pub async fn bind(config: ServerConfig, dispatcher: Dispatcher) -> Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;
        info!("RPC server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            dispatcher,
            config,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let dispatcher = self.dispatcher.clone();
                            let ws_config = self.config.websocket_config();
                            tokio::spawn(async move {
                                let served = serve_connection(stream, addr, dispatcher, ws_config);
                                if let Err(e) = served.await {
                                    warn!("Connection {} ended with error: {}", addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = &mut shutdown => {
                    info!("RPC server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Serve until the process is interrupted
    pub async fn run(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await
    }
}

/// Drive one connection: requests are dispatched concurrently and their
/// responses funnelled through a single writer task.
async fn serve_connection(
    stream: TcpStream,
    addr: SocketAddr,
    dispatcher: Dispatcher,
    ws_config: WebSocketConfig,
) -> Result<()> {
    let ws_stream = accept_async_with_config(stream, Some(ws_config)).await?;
    info!("Accepted WebSocket connection from {}", addr);

    let (mut ws_sink, mut ws_source) = ws_stream.split();
    let (send_tx, mut send_rx) = mpsc::unbounded_channel::<Response>();

    // Outbound task
    let writer = tokio::spawn(async move {
        while let Some(response) = send_rx.recv().await {
            let serialized = match serde_json::to_string(&response) {
                Ok(s) => s,
                Err(e) => {
                    error!("Failed to serialize response: {}", e);
                    continue;
                }
            };

            if let Err(e) = ws_sink.send(WsMessage::Text(serialized.into())).await {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
        let _ = ws_sink.send(WsMessage::Close(None)).await;
    });

    while let Some(ws_msg) = ws_source.next().await {
        match ws_msg {
            Ok(WsMessage::Text(text)) => {
                let dispatcher = dispatcher.clone();
                let send_tx = send_tx.clone();
                tokio::spawn(async move {
                    let response = dispatcher.handle_text(&text).await;
                    if send_tx.send(response).is_err() {
                        debug!("Connection closed before response could be sent");
                    }
                });
            }
            Ok(WsMessage::Binary(data)) => {
                warn!("Ignoring binary message of {} bytes from {}", data.len(), addr);
            }
            Ok(WsMessage::Close(_)) => {
                info!("WebSocket connection {} closed by peer", addr);
                break;
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {
                // Pong replies are handled by tungstenite
            }
            Err(e) => {
                warn!("WebSocket error from {}: {}", addr, e);
                break;
            }
        }
    }

    // Writer exits once in-flight responses are flushed and every sender is gone
    drop(send_tx);
    let _ = writer.await;
    debug!("Connection task for {} ended", addr);
    Ok(())
}
