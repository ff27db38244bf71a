use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::session::DocSession;
use crate::services::auth_service;
use crate::state::AppState;

/// WebSocket entry point for `/ws/document/{doc_id}/`.
///
/// Identity is resolved from the upgrade request's credentials before the
/// socket is accepted; the session decides after the upgrade whether the
/// connection may stay open. Rejections carry no payload, the client just
/// observes a closed connection.
pub async fn websocket_handler(
    Path(document_id): Path<Uuid>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Response {
    info!("New WebSocket connection attempt for document {}", document_id);
    let identity = auth_service::resolve_identity(&headers, &state.config);
    ws.on_upgrade(move |socket| handle_socket(socket, document_id, identity, state))
}

async fn handle_socket(
    socket: WebSocket,
    document_id: Uuid,
    identity: Option<auth_service::UserIdentity>,
    state: Arc<AppState>,
) {
    let session_id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let mut session = DocSession::new(
        session_id,
        document_id,
        identity,
        state.registry.clone(),
        state.documents.clone(),
        state.permissions.clone(),
        outbound_tx,
    );

    // Authenticate and authorize before anything is sent. Dropping the
    // socket here closes the connection without a payload.
    if !session.connect().await {
        return;
    }

    let (mut sink, mut stream) = socket.split();

    // Writer task: drain queued frames into the socket. It ends when the
    // session's outbound channel closes or the peer stops accepting.
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = outbound_rx.recv().await {
            if sink.send(Message::Text(payload)).await.is_err() {
                break;
            }
        }
    });

    // Read loop stays on this task so deregistration always runs, even
    // when the writer side is the one that fails.
    loop {
        tokio::select! {
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => session.receive(&text).await,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {
                        // Ping/pong/binary frames are not part of the protocol.
                        debug!("Ignoring non-text frame on document {}", document_id);
                    }
                }
            }
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    session.disconnect().await;
    info!(
        "WebSocket connection {} terminated for document {}",
        session.id(),
        document_id
    );
}
