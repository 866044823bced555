use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use log::{debug, warn};

use crate::dispatch::{SubscriberRegistry, Subscription};

use super::AppState;

/// `GET /ws`: streams `build_updated` events until the client goes away.
pub(super) async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let subscribers = Arc::clone(state.ingestor.dispatcher().subscribers());
    ws.on_upgrade(move |socket| stream_events(socket, subscribers))
}

async fn stream_events(mut socket: WebSocket, subscribers: Arc<SubscriberRegistry>) {
    let Subscription { id, mut events } = subscribers.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                // Pruned by the registry after falling behind.
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Could not encode live event: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    subscribers.unsubscribe(id);
    debug!("Live connection {id} closed");
}
