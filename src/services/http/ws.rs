use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};

use super::AppState;
use crate::services::notifier::{reply_to, Notifier, ServerEvent};

pub async fn connect(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let notifier = state.notifier.clone();
    ws.on_upgrade(move |socket| serve_socket(socket, notifier))
}

async fn serve_socket(socket: WebSocket, notifier: Notifier) {
    let (client_id, mut outbound) = notifier.register();
    let (mut sender, mut receiver) = socket.split();

    notifier.send_to(
        &client_id,
        &ServerEvent::Connected {
            message: "Connected to SpinBet live feed".to_string(),
        },
    );

    let forward = async {
        while let Some(payload) = outbound.recv().await {
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    };

    let listen = async {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Some(reply) = reply_to(text.as_str()) {
                        notifier.send_to(&client_id, &reply);
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    log::warn!("WebSocket error from client {}: {}", client_id, e);
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = forward => {}
        _ = listen => {}
    }

    notifier.unregister(&client_id);
}
