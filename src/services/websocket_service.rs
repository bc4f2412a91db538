use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::{room_events, room_service},
    state::SharedState,
};

/// Handle the full lifecycle of one room client connection.
///
/// Inbound frames are processed one at a time, so a connection's own messages take effect
/// in the order it sent them.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (control_tx, mut control_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps room notifications flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(message) = outbound_rx.recv() => match serde_json::to_string(&message) {
                    Ok(payload) => Message::Text(payload.into()),
                    Err(err) => {
                        warn!(error = %err, "failed to serialize outbound message `{message:?}`");
                        continue;
                    }
                },
                Some(control) = control_rx.recv() => control,
                else => break,
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    let connection_id = Uuid::new_v4();
    state
        .connections()
        .register(connection_id, outbound_tx.clone());
    info!(connection_id = %connection_id, "connection opened");

    if outbound_tx
        .send(ServerMessage::Welcome { connection_id })
        .is_err()
    {
        room_service::disconnect(&state, connection_id).await;
        finalize(writer_task, outbound_tx, control_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection_id = %connection_id, payload = %text, "received client message");
                handle_text(&state, connection_id, &text).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = control_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(connection_id = %connection_id, "client closed connection");
                let _ = control_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {
                let err = ServiceError::InvalidInput("binary frames are not supported".into());
                room_events::send_error(&state, &connection_id, &err);
            }
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection_id = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    room_service::disconnect(&state, connection_id).await;
    info!(connection_id = %connection_id, "connection closed");

    finalize(writer_task, outbound_tx, control_tx).await;
}

async fn handle_text(state: &SharedState, connection_id: Uuid, text: &str) {
    let message = match ClientMessage::from_json_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(connection_id = %connection_id, error = %err, "rejected client message");
            let reply = ServiceError::InvalidInput(err.to_string());
            room_events::send_error(state, &connection_id, &reply);
            return;
        }
    };

    let kind = message.kind();
    let room = message.room_code().to_owned();
    if let Err(err) = room_service::handle_client_message(state, connection_id, message).await {
        match &err {
            ServiceError::InvalidTransition(_) | ServiceError::NotMember(_) => {
                warn!(connection_id = %connection_id, room = %room, kind, error = %err, "message rejected");
            }
            _ => {
                debug!(connection_id = %connection_id, room = %room, kind, error = %err, "message failed");
            }
        }
        room_events::send_error(state, &connection_id, &err);
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
///
/// The registry entry is gone by now, so dropping our senders closes both channels.
async fn finalize(
    writer_task: JoinHandle<()>,
    outbound_tx: mpsc::UnboundedSender<ServerMessage>,
    control_tx: mpsc::UnboundedSender<Message>,
) {
    drop(outbound_tx);
    drop(control_tx);
    let _ = writer_task.await;
}
