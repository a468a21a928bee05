//! One actor per WebSocket connection.
//!
//! The actor parses inbound frames into [`ClientEvent`]s, forwards them to the
//! gateway and writes back whatever the player's [`EventSubscription`]
//! receives. Protocol and rule errors are answered with `ERROR` frames and
//! never close the socket. When the socket closes the gateway is told, which
//! dequeues the player or starts their forfeit clock.

use crate::errors::IntoErrorResponse;
use crate::events::{ClientEvent, EventBus, EventSubscription, ServerEvent};
use crate::game::{ConnectionId, PlayerId};
use crate::gateway::{GatewayError, SessionGateway};
use futures::{SinkExt, StreamExt};
use warp::ws::{Message, WebSocket};

struct Connection {
    id: ConnectionId,
    player: Option<PlayerId>,
    subscription: Option<EventSubscription>,
}

pub async fn serve_connection(socket: WebSocket, gateway: SessionGateway, bus: EventBus) {
    let mut connection = Connection {
        id: gateway.open_connection(),
        player: None,
        subscription: None,
    };
    tracing::debug!(connection = connection.id, "websocket opened");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            inbound = stream.next() => {
                let message = match inbound {
                    Some(Ok(message)) => message,
                    Some(Err(err)) => {
                        tracing::debug!(connection = connection.id, error = %err, "websocket read failed");
                        break;
                    }
                    None => break,
                };
                if message.is_close() {
                    break;
                }
                let Ok(text) = message.to_str() else {
                    continue;
                };
                if let Err(err) = handle_text(&gateway, &bus, &mut connection, text) {
                    if send_event(&mut sink, &err.to_server_event()).await.is_err() {
                        break;
                    }
                }
            }
            outbound = next_event(&mut connection.subscription) => {
                match outbound {
                    Some(event) => {
                        if send_event(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        // The bus pruned this subscriber; pick the stream back up.
                        if let Some(player) = &connection.player {
                            tracing::warn!(connection = connection.id, player = %player, "resubscribing lagging connection");
                            connection.subscription = Some(bus.subscribe(player.clone()));
                        } else {
                            connection.subscription = None;
                        }
                    }
                }
            }
        }
    }

    tracing::debug!(connection = connection.id, "websocket closed");
    drop(connection.subscription.take());
    if let Some(player) = connection.player.take() {
        if let Err(err) = gateway.disconnect(&player, connection.id) {
            tracing::warn!(player = %player, error = %err, "disconnect handling failed");
        }
    }
}

fn handle_text(
    gateway: &SessionGateway,
    bus: &EventBus,
    connection: &mut Connection,
    text: &str,
) -> Result<(), GatewayError> {
    let event: ClientEvent =
        serde_json::from_str(text).map_err(|err| GatewayError::Protocol(err.to_string()))?;

    match event {
        ClientEvent::JoinQueue { username } => {
            let requested = username.trim().to_string();
            if let Some(bound) = &connection.player {
                if *bound != requested {
                    return Err(GatewayError::IdentityMismatch {
                        bound: bound.clone(),
                        requested,
                    });
                }
            }

            // Subscribe first so the replies to this join are not missed.
            let fresh = connection.subscription.is_none();
            if fresh && !requested.is_empty() {
                connection.subscription = Some(bus.subscribe(requested.clone()));
            }
            match gateway.join(connection.id, &requested) {
                Ok(_) => {
                    connection.player = Some(requested);
                    Ok(())
                }
                Err(err) => {
                    if fresh {
                        connection.subscription = None;
                    }
                    Err(err)
                }
            }
        }
        ClientEvent::Move { match_id, column } => {
            let player = connection.player.as_deref().ok_or(GatewayError::NotJoined)?;
            gateway.submit_move(player, &match_id, column).map(|_| ())
        }
    }
}

async fn next_event(subscription: &mut Option<EventSubscription>) -> Option<ServerEvent> {
    match subscription {
        Some(subscription) => subscription.receiver().recv().await,
        None => std::future::pending().await,
    }
}

async fn send_event<S>(sink: &mut S, event: &ServerEvent) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(err) => {
            tracing::warn!(event = event.kind(), error = %err, "failed to serialize event");
            return Ok(());
        }
    };
    sink.send(Message::text(json)).await.map_err(|_| ())
}
