use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{FileRecord, ServerDescriptor, ServerStats};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub server: ServerDescriptor,
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: ServerStats,
}

/// Outgoing sends are either chat text or a slash command; the service
/// dispatches on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Message,
    Command,
}

/// Body of `POST /api/message`. Constructed per send, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingPayload {
    #[serde(rename = "type")]
    pub kind: PayloadKind,
    pub content: String,
    pub channel: String,
}

/// Body of `GET /api/poll`: raw message lines plus a roster map keyed by
/// channel name for every channel the session has joined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default)]
    pub users: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub name: String,
    #[serde(default)]
    pub users_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelListResponse {
    pub channels: Vec<ChannelSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelResponse {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelTopicResponse {
    #[serde(default)]
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file: FileRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileListResponse {
    pub files: Vec<FileRecord>,
}

/// Error envelope the service attaches to non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outgoing_payload_serializes_kind_as_type_field() {
        let payload = OutgoingPayload {
            kind: PayloadKind::Command,
            content: "/join #rust".to_string(),
            channel: "#rust".to_string(),
        };
        let json = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(json["type"], "command");
        assert_eq!(json["content"], "/join #rust");
        assert_eq!(json["channel"], "#rust");
    }

    #[test]
    fn login_response_tolerates_descriptor_without_max_users() {
        let raw = r##"{
            "token": "abc123",
            "username": "alice",
            "server": {"id": "server1", "host": "127.0.0.1", "port": 5001},
            "channels": ["#general"]
        }"##;
        let parsed: LoginResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.server.id, "server1");
        assert_eq!(parsed.server.max_users, 0);
        assert_eq!(parsed.channels, vec!["#general".to_string()]);
    }

    #[test]
    fn poll_response_defaults_missing_sections() {
        let parsed: PollResponse = serde_json::from_str("{}").expect("parse");
        assert!(parsed.messages.is_empty());
        assert!(parsed.users.is_empty());
    }
}
