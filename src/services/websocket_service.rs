//! Participant WebSocket lifecycle: join handshake, message dispatch,
//! best-effort broadcast fan-out and disconnect cleanup.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    services::game_service,
    state::{ParticipantConnection, SharedState, roster::ConnectionId},
};

/// Handle the full lifecycle for an individual participant connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames; a slow socket only ever backs up its own queue.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id: ConnectionId = Uuid::new_v4();
    state.connections().insert(
        connection_id,
        ParticipantConnection {
            id: connection_id,
            tx: outbound_tx.clone(),
        },
    );

    info!(connection = %connection_id, "participant socket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(inbound) => handle_message(&state, connection_id, &outbound_tx, inbound).await,
                Err(err) => {
                    warn!(connection = %connection_id, error = %err, "unparsable client message");
                    send_message_to_websocket(
                        &outbound_tx,
                        &ServerMessage::Error {
                            message: "could not parse message".into(),
                        },
                        "parse error report",
                    );
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.connections().remove(&connection_id);
    game_service::disconnect(&state, connection_id).await;
    info!(connection = %connection_id, "participant socket disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Dispatch one parsed client message.
async fn handle_message(
    state: &SharedState,
    connection_id: ConnectionId,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    inbound: ClientMessage,
) {
    match inbound {
        ClientMessage::Join { name, roll_number } => {
            match game_service::join(state, connection_id, &name, &roll_number).await {
                Ok(joined) => {
                    send_message_to_websocket(
                        outbound_tx,
                        &ServerMessage::JoinAck {
                            success: true,
                            message: if joined.rebound {
                                "welcome back".into()
                            } else {
                                "joined successfully".into()
                            },
                            score: Some(joined.score),
                            status: Some(joined.status.into()),
                            round: Some(joined.round),
                        },
                        "join ack",
                    );
                }
                Err(err) => {
                    send_message_to_websocket(
                        outbound_tx,
                        &ServerMessage::JoinAck {
                            success: false,
                            message: err.to_string(),
                            score: None,
                            status: None,
                            round: None,
                        },
                        "join rejection",
                    );
                }
            }
        }
        ClientMessage::SubmitAnswer {
            question_id,
            payload,
        } => {
            if let Err(err) =
                game_service::submit_answer(state, connection_id, question_id, payload).await
            {
                report_error(outbound_tx, &err);
            }
        }
        ClientMessage::GetState => {
            let snapshot = game_service::state_snapshot(state).await;
            send_message_to_websocket(
                outbound_tx,
                &ServerMessage::GameState(snapshot),
                "state snapshot",
            );
        }
        ClientMessage::Unknown => {
            send_message_to_websocket(
                outbound_tx,
                &ServerMessage::Error {
                    message: "unsupported message type".into(),
                },
                "unknown message report",
            );
        }
    }
}

/// Push a failure back to the offending socket only; errors never fan out.
fn report_error(outbound_tx: &mpsc::UnboundedSender<Message>, err: &ServiceError) {
    send_message_to_websocket(
        outbound_tx,
        &ServerMessage::Error {
            message: err.to_string(),
        },
        "error report",
    );
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Delivery is best effort: serialization failures are logged (a bug, not a
/// transport problem) and a closed writer just means the socket is gone.
pub fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
    context: &str,
) where
    T: ?Sized + Serialize,
{
    let payload = match serde_json::to_string(value) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(context, error = %err, "failed to serialize outbound message");
            return;
        }
    };

    let _ = tx.send(Message::Text(payload.into()));
}

/// Fan a message out to every connected participant socket, best effort.
pub fn broadcast_message(state: &SharedState, message: &ServerMessage) {
    for connection in state.connections().iter() {
        send_message_to_websocket(&connection.tx, message, "broadcast");
    }
}

/// Send a message to one connection, if it is still registered.
pub fn send_to_connection(
    state: &SharedState,
    connection_id: ConnectionId,
    message: &ServerMessage,
) {
    let Some(connection) = state.connections().get(&connection_id) else {
        return;
    };
    let tx = connection.tx.clone();
    drop(connection);
    send_message_to_websocket(&tx, message, "targeted send");
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
