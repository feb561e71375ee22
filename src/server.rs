// 11.0 server.rs: the transport boundary. one websocket per player bridged to
// arena commands, plus a liveness probe. no game logic lives here.

use crate::ledger::OrderRequest;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::ArenaHandle;
use crate::session::SessionParams;
use crate::types::{ProviderId, SessionId};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

pub fn create_app(arena: ArenaHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .with_state(arena)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Liveness only: 200 whenever the process is up.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn ws_handler(ws: WebSocketUpgrade, State(arena): State<ArenaHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, arena))
}

async fn handle_socket(socket: WebSocket, arena: ArenaHandle) {
    let (id, mut pushes) = arena.connect();
    debug!(session = %id, "client connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            push = pushes.recv() => {
                let Some(msg) = push else { break };
                if send_message(&mut sink, &msg).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) => {
                                if dispatch(&arena, id, msg, &mut sink).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                debug!(session = %id, error = %err, "unparseable client message");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        warn!(session = %id, error = %err, "websocket error");
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong/binary ignored
                }
            }
        }
    }

    // removal is immediate on disconnect, sessions never linger
    arena.disconnect(id);
    debug!(session = %id, "client disconnected, session removed");
}

async fn dispatch(
    arena: &ArenaHandle,
    id: SessionId,
    msg: ClientMessage,
    sink: &mut SplitSink<WebSocket, Message>,
) -> Result<(), axum::Error> {
    match msg {
        ClientMessage::StartGame { player_name, difficulty, mode, price_provider } => {
            arena.start_game(
                id,
                SessionParams {
                    player_name,
                    difficulty,
                    mode,
                    provider: ProviderId::parse(&price_provider),
                },
            );
            Ok(())
        }
        ClientMessage::PlaceOrder { base, quote, side, size, leverage } => {
            let order = OrderRequest { base, quote, side, size, leverage };
            // synchronous ack: the order either fully executed or nothing changed
            let ack = match arena.place_order(id, order).await {
                Ok(receipt) => ServerMessage::OrderAck {
                    pair_price: receipt.pair_price,
                    converted_from_usd: receipt.converted_from_usd,
                },
                Err(err) => ServerMessage::OrderRejected { error: err.to_string() },
            };
            send_message(sink, &ack).await
        }
        ClientMessage::ClaimFaucet => {
            arena.claim_faucet(id);
            Ok(())
        }
    }
}

async fn send_message(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(err) => {
            warn!(error = %err, "failed to serialize server message");
            Ok(())
        }
    }
}
