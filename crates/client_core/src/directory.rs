//! Static server pool configuration.
//!
//! The pool is a JSON document of shape `{"servers": [...]}`, loaded once
//! at startup. Path resolution follows default-then-env-override, with the
//! `MIRAGE_SERVERS` variable taking precedence.

use std::{env, fs, path::{Path, PathBuf}};

use serde::Deserialize;
use shared::domain::ServerDescriptor;

use crate::error::{ClientError, Result};

pub const SERVERS_ENV: &str = "MIRAGE_SERVERS";
pub const DEFAULT_SERVERS_PATH: &str = "servers.json";

#[derive(Debug, Deserialize)]
struct ServersDocument {
    servers: Vec<ServerDescriptor>,
}

/// Resolves the server list path: `MIRAGE_SERVERS` when set, else
/// `servers.json` in the working directory.
pub fn servers_path() -> PathBuf {
    env::var(SERVERS_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SERVERS_PATH))
}

/// Loads and validates the candidate pool. An unreadable or malformed
/// document, or an entry with an empty `id`/`host` or zero capacity, is a
/// `Validation` error naming the problem.
pub fn load_servers(path: &Path) -> Result<Vec<ServerDescriptor>> {
    let raw = fs::read_to_string(path).map_err(|err| {
        ClientError::Validation(format!(
            "failed to read server list {}: {err}",
            path.display()
        ))
    })?;
    let document: ServersDocument = serde_json::from_str(&raw)
        .map_err(|err| ClientError::Validation(format!("malformed server list: {err}")))?;

    for server in &document.servers {
        if server.id.trim().is_empty() || server.host.trim().is_empty() {
            return Err(ClientError::Validation(
                "server entries must carry a non-empty id and host".to_string(),
            ));
        }
        if server.max_users == 0 {
            return Err(ClientError::Validation(format!(
                "server {} declares zero capacity",
                server.id
            )));
        }
    }
    Ok(document.servers)
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;

    fn write_temp(contents: &str) -> PathBuf {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("mirage_servers_test_{suffix}.json"));
        fs::write(&path, contents).expect("write temp servers file");
        path
    }

    #[test]
    fn loads_a_valid_pool() {
        let path = write_temp(
            r#"{"servers": [
                {"id": "server1", "host": "127.0.0.1", "port": 5001, "max_users": 100},
                {"id": "server2", "host": "127.0.0.1", "port": 5002, "max_users": 50}
            ]}"#,
        );
        let servers = load_servers(&path).expect("load");
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].id, "server1");
        assert_eq!(servers[1].max_users, 50);
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn rejects_zero_capacity_entries() {
        let path = write_temp(
            r#"{"servers": [{"id": "server1", "host": "127.0.0.1", "port": 5001, "max_users": 0}]}"#,
        );
        let err = load_servers(&path).expect_err("must fail");
        assert!(matches!(err, ClientError::Validation(_)));
        assert!(err.to_string().contains("server1"));
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn rejects_malformed_documents() {
        let path = write_temp("{not json");
        let err = load_servers(&path).expect_err("must fail");
        assert!(matches!(err, ClientError::Validation(_)));
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn missing_file_is_a_validation_error() {
        let err = load_servers(Path::new("/nonexistent/servers.json")).expect_err("must fail");
        assert!(matches!(err, ClientError::Validation(_)));
    }
}
