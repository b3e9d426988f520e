use std::time::{Duration, Instant};

use actix_web::web;
use actix_ws::{CloseReason, Message};
use futures_util::{
    StreamExt as _,
    future::{Either, select},
};
use rand::Rng as _;
use tokio::{pin, sync::mpsc, time::interval};

use crate::ws::{ConnId, server::RoomRegistry};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay text messages received from the client to the rest of its room,
/// respond to ping messages, and monitor connection health to detect
/// network issues and free up resources.
pub async fn relay_ws(
    registry: web::Data<RoomRegistry>,
    mut session: actix_ws::Session,
    mut msg_stream: actix_ws::MessageStream,
    room: String,
) {
    let conn_id: ConnId = rand::rng().random();

    let mut last_heartbeat = Instant::now();
    let mut interval = interval(HEARTBEAT_INTERVAL);

    let (conn_tx, mut conn_rx) = mpsc::unbounded_channel();

    registry.join(&room, conn_id, conn_tx);

    log::info!("Connection {conn_id} joined room {room}");

    let close_reason: Option<CloseReason> = loop {
        // most of the futures we process need to be stack-pinned to work with select()

        let tick = interval.tick();
        pin!(tick);

        let msg_rx = conn_rx.recv();
        pin!(msg_rx);

        let messages = select(msg_stream.next(), msg_rx);
        pin!(messages);

        match select(messages, tick).await {
            // frames received from the client
            Either::Left((Either::Left((Some(Ok(msg)), _)), _)) => match msg {
                Message::Ping(bytes) => {
                    last_heartbeat = Instant::now();
                    if session.pong(&bytes).await.is_err() {
                        break None;
                    }
                }

                Message::Pong(_) => {
                    last_heartbeat = Instant::now();
                }

                Message::Text(text) => {
                    last_heartbeat = Instant::now();
                    registry.broadcast(&room, conn_id, text.to_string());
                }

                Message::Binary(_) => {
                    last_heartbeat = Instant::now();
                    log::debug!("Ignoring binary message from {conn_id}");
                }

                Message::Close(reason) => break reason,

                _ => {
                    break None;
                }
            },

            // client WebSocket stream error
            Either::Left((Either::Left((Some(Err(err)), _)), _)) => {
                log::error!("{err}");
                break None;
            }

            // client WebSocket stream ended
            Either::Left((Either::Left((None, _)), _)) => break None,

            // messages relayed from other room members
            Either::Left((Either::Right((Some(room_msg), _)), _)) => {
                if session.text(room_msg).await.is_err() {
                    break None;
                }
            }

            // the registry dropped our sender (e.g. a duplicate join
            // replaced it); nothing left to relay
            Either::Left((Either::Right((None, _)), _)) => break None,

            // heartbeat interval tick
            Either::Right((_inst, _)) => {
                // if no heartbeat ping/pong received recently, close the connection
                if Instant::now().duration_since(last_heartbeat) > CLIENT_TIMEOUT {
                    log::info!(
                        "client has not sent heartbeat in over {CLIENT_TIMEOUT:?}; disconnecting"
                    );
                    break None;
                }

                // send heartbeat ping
                let _ = session.ping(b"").await;
            }
        };
    };

    registry.leave(&room, conn_id);

    log::info!("Connection {conn_id} left room {room}");

    // attempt to close connection gracefully
    let _ = session.close(close_reason).await;
}
