use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::ChatMessage;

/// Events a client sends to the server, as JSON text frames tagged by `event`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    /// Join a room. Replies with `load_messages` to this client only.
    JoinRoom { room_id: String },
    /// Persist a chat message, then fan it out to the whole room.
    SendMessage { room_id: String, author: String, text: String },
    /// Board invalidation pulse: the sender has already persisted its change.
    UpdateBoard { room_id: String },
    /// Ephemeral cursor position, fanned out to the sender's rooms.
    #[serde(rename = "cursor-move")]
    CursorMove { x: f64, y: f64, user_name: String, color: String },
}

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full chat history for a room, delivered point-to-point to the joiner.
    LoadMessages { room_id: String, messages: Vec<ChatMessage> },
    /// A durable chat message, delivered to every room member (sender included).
    ReceiveMessage {
        #[serde(flatten)]
        message: ChatMessage,
    },
    /// "Something changed in this room, go re-fetch." Carries no board data.
    BoardUpdated { room_id: String },
    /// A peer's cursor moved.
    #[serde(rename = "cursor-update")]
    CursorUpdate { sender_id: Uuid, user_name: String, color: String, x: f64, y: f64 },
    /// A peer disconnected; evict its cursor entry.
    #[serde(rename = "user-disconnected")]
    UserDisconnected { sender_id: Uuid },
}

/// A peer's live cursor, as tracked by the reconciliation layer.
///
/// Exactly one entry per sender; the last update wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorState {
    pub sender_id: Uuid,
    pub display_name: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::{from_str, json, to_value, Value};

    #[test]
    fn client_event_names_match_wire_contract() {
        let join: ClientEvent =
            from_str(r#"{"event":"join_room","roomId":"p1"}"#).unwrap();
        assert_eq!(join, ClientEvent::JoinRoom { room_id: "p1".into() });

        let send: ClientEvent = from_str(
            r#"{"event":"send_message","roomId":"p1","author":"alice","text":"hello"}"#,
        )
        .unwrap();
        assert_eq!(
            send,
            ClientEvent::SendMessage { room_id: "p1".into(), author: "alice".into(), text: "hello".into() }
        );

        let moved: ClientEvent = from_str(
            r##"{"event":"cursor-move","x":1.5,"y":2.0,"userName":"alice","color":"#f00"}"##,
        )
        .unwrap();
        assert_eq!(
            moved,
            ClientEvent::CursorMove { x: 1.5, y: 2.0, user_name: "alice".into(), color: "#f00".into() }
        );
    }

    #[test]
    fn server_event_names_match_wire_contract() {
        let sender = Uuid::new_v4();

        let updated = to_value(&ServerEvent::BoardUpdated { room_id: "p1".into() }).unwrap();
        assert_eq!(updated, json!({"event": "board_updated", "roomId": "p1"}));

        let gone = to_value(&ServerEvent::UserDisconnected { sender_id: sender }).unwrap();
        assert_eq!(gone["event"], "user-disconnected");
        assert_eq!(gone["senderId"], Value::String(sender.to_string()));

        let cursor = to_value(&ServerEvent::CursorUpdate {
            sender_id: sender,
            user_name: "alice".into(),
            color: "#f00".into(),
            x: 3.0,
            y: 4.0,
        })
        .unwrap();
        assert_eq!(cursor["event"], "cursor-update");
        assert_eq!(cursor["userName"], "alice");
    }

    #[test]
    fn receive_message_flattens_the_chat_payload() {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            room_id: "p1".into(),
            author: "alice".into(),
            text: "hello".into(),
            created_at: Utc::now(),
        };
        let value = to_value(&ServerEvent::ReceiveMessage { message: message.clone() }).unwrap();
        assert_eq!(value["event"], "receive_message");
        assert_eq!(value["roomId"], "p1");
        assert_eq!(value["text"], "hello");

        let back: ServerEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, ServerEvent::ReceiveMessage { message });
    }

    #[test]
    fn malformed_payloads_fail_to_parse() {
        assert!(from_str::<ClientEvent>("not json").is_err());
        assert!(from_str::<ClientEvent>(r#"{"event":"join_room"}"#).is_err());
        assert!(from_str::<ClientEvent>(r#"{"event":"no_such_event","roomId":"p1"}"#).is_err());
    }
}
