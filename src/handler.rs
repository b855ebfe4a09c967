//! WebSocket connection handler
//!
//! Handles individual client connections: WebSocket handshake, token
//! extraction, frame parsing, and bidirectional communication with the
//! RoomServer through a [`Session`].

use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use crate::auth::Credentials;
use crate::error::AppError;
use crate::gateway::{Gateway, Session};
use crate::message::{ClientMessage, ServerMessage};

/// Handle a new TCP connection
///
/// Performs WebSocket handshake, authenticates through the gateway,
/// and manages the connection lifecycle until either side closes.
pub async fn handle_connection(stream: TcpStream, gateway: Gateway) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    serve_stream(stream, &peer_addr, gateway).await
}

/// Serve one client over any byte stream
///
/// Once a session is established it is always disconnected before
/// returning, whichever side fails first.
pub async fn serve_stream<S>(stream: S, peer_addr: &str, gateway: Gateway) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    // WebSocket handshake, keeping the query string for credentials
    let mut query: Option<String> = None;
    let capture_query = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        query = req.uri().query().map(ToOwned::to_owned);
        Ok(resp)
    };
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, capture_query).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Create channel for server -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(gateway.outbound_buffer());

    let credentials = Credentials::from_query(query.as_deref());
    let session = match gateway.connect(&credentials, msg_tx.clone()).await {
        Ok(session) => session,
        Err(e) => {
            let frame = serde_json::to_string(&ServerMessage::from(e))?;
            let _ = ws_sender.send(Message::Text(frame.into())).await;
            let _ = ws_sender.close().await;
            info!("Connection from {} rejected", peer_addr);
            return Ok(());
        }
    };
    info!("Connection {} from {}", session.id(), peer_addr);

    // Send connection success message
    let connected_msg = ServerMessage::Connected {
        connection_id: session.id().to_string(),
        user: session.user().cloned(),
    };
    let greeted = match serde_json::to_string(&connected_msg) {
        Ok(json) => ws_sender
            .send(Message::Text(json.into()))
            .await
            .map_err(AppError::from),
        Err(e) => Err(e.into()),
    };
    if let Err(e) = greeted {
        warn!("Failed to greet {}: {}", session.id(), e);
        let connection_id = session.id();
        session.disconnect().await;
        info!("Connection {} disconnected", connection_id);
        return Ok(());
    }

    // Spawn write task (ServerMessage -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for connection");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Read loop runs here so it can borrow the session
    tokio::select! {
        _ = read_loop(&mut ws_receiver, &session, &msg_tx) => {
            debug!("Read loop completed for {}", session.id());
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", session.id());
        }
    }

    let connection_id = session.id();
    session.disconnect().await;

    // Dropping the last sender lets the write task flush and exit
    drop(msg_tx);
    if !write_task.is_finished() {
        let _ = write_task.await;
    }

    info!("Connection {} disconnected", connection_id);

    Ok(())
}

/// WebSocket -> Session until the client closes or errors
async fn read_loop<S>(
    ws_receiver: &mut SplitStream<WebSocketStream<S>>,
    session: &Session,
    replies: &mpsc::Sender<ServerMessage>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => dispatch(session, client_msg).await,
                    Err(e) => {
                        warn!("Invalid JSON from {}: {}", session.id(), e);
                        AppError::Json(e).into()
                    }
                };
                if replies.send(reply).await.is_err() {
                    debug!("Write side closed, ending read loop for {}", session.id());
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                debug!("Connection {} sent close frame", session.id());
                break;
            }
            Ok(Message::Ping(_)) => {
                // Pong is handled automatically by tungstenite
                debug!("Ping from {}", session.id());
            }
            Ok(Message::Pong(_)) => {
                debug!("Pong from {}", session.id());
            }
            Ok(_) => {
                // Binary or other message types - ignore
            }
            Err(e) => {
                error!("WebSocket error for {}: {}", session.id(), e);
                break;
            }
        }
    }
    debug!("Read loop ended for {}", session.id());
}

/// Apply one client frame and build the ack or error for the sender
async fn dispatch(session: &Session, msg: ClientMessage) -> ServerMessage {
    let result = match msg {
        ClientMessage::Join { room_id } => session
            .join(room_id)
            .await
            .map(|room_id| ServerMessage::Joined { room_id }),
        ClientMessage::Leave { room_id } => session
            .leave(room_id)
            .await
            .map(|room_id| ServerMessage::Left { room_id }),
        ClientMessage::Message { room_id, payload } => session
            .message(room_id, payload)
            .await
            .map(|(room_id, timestamp)| ServerMessage::Sent { room_id, timestamp }),
    };
    result.unwrap_or_else(ServerMessage::from)
}
