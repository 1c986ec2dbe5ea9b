//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol for live queries between the browser
//! client and the API server.

use crate::web::realtime::Collection;
use serde::{Deserialize, Serialize};
use study_planner_core::domain::{AiTask, Document, Task};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a live query. The server answers with a snapshot right away and
    /// again after every change to that collection.
    Subscribe { collection: Collection },

    /// Stops pushing snapshots for a collection.
    Unsubscribe { collection: Collection },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
/// Snapshots always carry the full, ordered collection for the user.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Subscribed { collection: Collection },

    Unsubscribed { collection: Collection },

    TasksSnapshot { tasks: Vec<Task> },

    DocumentsSnapshot { documents: Vec<Document> },

    AiTasksSnapshot { ai_tasks: Vec<AiTask> },

    /// Reports a problem with the last request or snapshot.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_use_snake_case_tags() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"subscribe","collection":"ai_tasks"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                collection: Collection::AiTasks
            }
        );
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"subscribe","collection":"notes"}"#).is_err());
    }

    #[test]
    fn server_snapshot_shape() {
        let json = serde_json::to_value(ServerMessage::TasksSnapshot { tasks: vec![] }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "tasks_snapshot", "tasks": []}));

        let json = serde_json::to_value(ServerMessage::Subscribed {
            collection: Collection::Documents,
        })
        .unwrap();
        assert_eq!(json["collection"], "documents");
    }
}
