//! Least-loaded server selection.
//!
//! Each candidate is probed for live stats with a bounded timeout;
//! candidates that fail to answer are skipped for the round, not
//! penalized. Selection is idempotent and may be re-run later to
//! re-balance (e.g. on reconnect).

use std::time::Duration;

use reqwest::Client;
use shared::{
    domain::{ServerDescriptor, ServerStats},
    protocol::StatsResponse,
};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Hard per-probe deadline; the only timeout in the client.
pub const STATS_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

const CPU_WEIGHT: f64 = 0.4;
const MEMORY_WEIGHT: f64 = 0.3;
const CAPACITY_WEIGHT: f64 = 0.3;

/// Weighted load score; lower is better. A descriptor with unknown
/// capacity (`max_users == 0`, e.g. an un-annotated login echo) counts its
/// capacity term as fully utilized rather than dividing by zero.
pub fn load_score(stats: &ServerStats, max_users: u32) -> f64 {
    let capacity = if max_users == 0 {
        1.0
    } else {
        f64::from(stats.active_users_count) / f64::from(max_users)
    };
    CPU_WEIGHT * stats.cpu_usage + MEMORY_WEIGHT * stats.memory_usage + CAPACITY_WEIGHT * capacity
}

/// Picks the candidate with the strictly lowest load score, scanning left
/// to right so ties keep the first-seen candidate. If no candidate
/// answered, falls back to the first configured one so the caller always
/// has a server to attempt authentication against; an empty pool is the
/// terminal `NoServers`.
pub async fn select_best(
    http: &Client,
    candidates: &[ServerDescriptor],
) -> Result<ServerDescriptor> {
    if candidates.is_empty() {
        return Err(ClientError::NoServers);
    }

    let mut best: Option<(f64, &ServerDescriptor)> = None;
    for server in candidates {
        let stats = match fetch_stats(http, server).await {
            Ok(stats) => stats,
            Err(err) => {
                debug!(server = %server.id, "stats probe failed: {err}");
                continue;
            }
        };
        let score = load_score(&stats, server.max_users);
        if best.as_ref().map_or(true, |(lowest, _)| score < *lowest) {
            best = Some((score, server));
        }
    }

    match best {
        Some((score, server)) => {
            debug!(server = %server.id, score, "selected least-loaded server");
            Ok(server.clone())
        }
        None => {
            warn!(
                fallback = %candidates[0].id,
                "no candidate answered its stats probe; falling back to first configured server"
            );
            Ok(candidates[0].clone())
        }
    }
}

async fn fetch_stats(http: &Client, server: &ServerDescriptor) -> Result<ServerStats> {
    let response: StatsResponse = http
        .get(format!("{}/server/stats", server.base_url()))
        .timeout(STATS_PROBE_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(response.stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(cpu: f64, mem: f64, users: u32) -> ServerStats {
        ServerStats {
            cpu_usage: cpu,
            memory_usage: mem,
            active_users_count: users,
        }
    }

    #[test]
    fn score_weights_cpu_memory_and_capacity() {
        let score = load_score(&stats(0.5, 0.5, 50), 100);
        assert!((score - (0.4 * 0.5 + 0.3 * 0.5 + 0.3 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn lightly_loaded_server_scores_below_heavily_loaded() {
        let light = load_score(&stats(0.1, 0.1, 1), 100);
        let heavy = load_score(&stats(0.9, 0.9, 99), 100);
        assert!(light < heavy);
    }

    #[test]
    fn unknown_capacity_counts_as_saturated() {
        let score = load_score(&stats(0.0, 0.0, 10), 0);
        assert!((score - CAPACITY_WEIGHT).abs() < 1e-9);
    }
}
