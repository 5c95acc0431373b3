use serde::{Deserialize, Serialize};

/// One entry of the static server pool document.
///
/// Immutable after load; identity is `id`. The login response echoes a
/// descriptor back and may omit `max_users`, hence the serde default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    pub id: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub max_users: u32,
}

impl ServerDescriptor {
    /// Base URL for every API call against this server.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}/api", self.host, self.port)
    }
}

/// Transient load snapshot fetched from a candidate during selection.
/// Usage values are fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerStats {
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub active_users_count: u32,
}

/// Server-assigned record for an uploaded file. Never mutated locally;
/// removed only when a fresh file listing omits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: i64,
    pub original_name: String,
    pub size: u64,
    pub uploader: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

/// A decoded line from a poll response.
///
/// `Plain` and `System` keep the raw wire text (timestamp included) so
/// subscribers can render it unchanged; `FileShare` carries the metadata
/// extracted from the service's inline file-share notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Plain {
        text: String,
    },
    System {
        text: String,
    },
    FileShare {
        filename: String,
        size_label: String,
        download_path: String,
    },
}
