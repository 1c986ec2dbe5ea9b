//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection holds a set of live queries; a background task watches the
//! change hub and re-sends the affected snapshots.

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    realtime::{ChangeEvent, Collection},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    Sink, SinkExt,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;
type Subscriptions = Arc<Mutex<HashSet<Collection>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("New WebSocket connection established for user: {}", user_id);

    // The sender is wrapped in an Arc<Mutex<>> to allow for shared mutable access across tasks.
    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));
    let subscriptions: Subscriptions = Arc::new(Mutex::new(HashSet::new()));
    let cancel = CancellationToken::new();

    // Subscribe to the hub before any snapshot goes out so no change is missed.
    let changes = app_state.changes.subscribe();
    let push_task = tokio::spawn(push_changes(
        app_state.clone(),
        user_id,
        ws_sender.clone(),
        subscriptions.clone(),
        changes,
        cancel.clone(),
    ));

    // --- Main Message Loop ---
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let keep_going = handle_text_message(
                    text.as_str(),
                    &app_state,
                    user_id,
                    &subscriptions,
                    &ws_sender,
                )
                .await;
                if !keep_going {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("Client sent close message.");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // --- Cleanup ---
    cancel.cancel();
    if let Err(e) = push_task.await {
        error!("Change push task ended abnormally: {:?}", e);
    }
    info!("WebSocket connection closed for user: {}", user_id);
}

/// Applies one client request. Returns `false` once the socket is unusable.
async fn handle_text_message(
    text: &str,
    app_state: &Arc<AppState>,
    user_id: Uuid,
    subscriptions: &Subscriptions,
    ws_sender: &WsSender,
) -> bool {
    let reply = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Subscribe { collection }) => {
            subscriptions.lock().await.insert(collection);
            if send(ws_sender, &ServerMessage::Subscribed { collection }).await.is_err() {
                return false;
            }
            snapshot(app_state, user_id, collection).await
        }
        Ok(ClientMessage::Unsubscribe { collection }) => {
            subscriptions.lock().await.remove(&collection);
            ServerMessage::Unsubscribed { collection }
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            }
        }
    };
    send(ws_sender, &reply).await.is_ok()
}

/// Re-sends snapshots for every subscribed collection the change hub reports as touched.
async fn push_changes<S>(
    app_state: Arc<AppState>,
    user_id: Uuid,
    ws_sender: Arc<Mutex<S>>,
    subscriptions: Subscriptions,
    mut changes: broadcast::Receiver<ChangeEvent>,
    cancel: CancellationToken,
) where
    S: Sink<Message, Error = axum::Error> + Unpin + Send,
{
    loop {
        let touched: Vec<Collection> = tokio::select! {
            _ = cancel.cancelled() => break,
            event = changes.recv() => match event {
                Ok(event) if event.user_id == user_id => {
                    if subscriptions.lock().await.contains(&event.collection) {
                        vec![event.collection]
                    } else {
                        continue;
                    }
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(%user_id, skipped, "Change subscription lagged, resending all snapshots");
                    subscriptions.lock().await.iter().copied().collect()
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        for collection in touched {
            debug!(%user_id, ?collection, "Pushing snapshot");
            let message = snapshot(&app_state, user_id, collection).await;
            if send(&ws_sender, &message).await.is_err() {
                return;
            }
        }
    }
}

/// Queries the full, ordered collection for the user.
async fn snapshot(app_state: &AppState, user_id: Uuid, collection: Collection) -> ServerMessage {
    let result = match collection {
        Collection::Tasks => app_state
            .db
            .list_tasks(user_id)
            .await
            .map(|tasks| ServerMessage::TasksSnapshot { tasks }),
        Collection::Documents => app_state
            .db
            .list_documents(user_id)
            .await
            .map(|documents| ServerMessage::DocumentsSnapshot { documents }),
        Collection::AiTasks => app_state
            .db
            .list_ai_tasks(user_id)
            .await
            .map(|ai_tasks| ServerMessage::AiTasksSnapshot { ai_tasks }),
    };
    result.unwrap_or_else(|e| {
        error!(%user_id, ?collection, error = %e, "Snapshot query failed");
        ServerMessage::Error {
            message: "Failed to load data.".to_string(),
        }
    })
}

async fn send<S>(ws_sender: &Arc<Mutex<S>>, message: &ServerMessage) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| {
            debug!("Failed to send WebSocket message: {}", e);
            e
        })
}
