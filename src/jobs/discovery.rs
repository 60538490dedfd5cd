//! Synchronous discovery with background handoff
//!
//! Discovery counts reachable pages and answers within a bounded window. A
//! run that finishes in time returns its count directly; one that does not
//! is cancelled, re-submitted to the queue as a background job, and the
//! caller is told the count will arrive via the persisted record and the
//! progress stream.

use crate::config::{self, CrawlConfig};
use crate::crawler::Traversal;
use crate::jobs::{JobQueue, JobState, LastDiscovery};
use crate::progress::ProgressBroadcaster;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How long a discovery request may run before it is handed to the queue.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(14);

/// Wire shape of a discovery reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages_found: Option<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<String>>,
}

impl DiscoveryResponse {
    fn failure(message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            success: false,
            pages_found: None,
            message: message.into(),
            details,
            logs: None,
        }
    }
}

/// Serves one discovery request.
///
/// The single-flight gate is claimed for the whole response window; on
/// timeout it is released just before the job is re-submitted, so the
/// worker can pick the continuation up on its next poll.
pub async fn run_discovery(
    config: CrawlConfig,
    queue: &Arc<JobQueue>,
    state: &Arc<JobState>,
    progress: &Arc<ProgressBroadcaster>,
) -> DiscoveryResponse {
    run_discovery_with_window(config, queue, state, progress, DISCOVERY_TIMEOUT).await
}

/// [`run_discovery`] with an explicit response window.
pub async fn run_discovery_with_window(
    config: CrawlConfig,
    queue: &Arc<JobQueue>,
    state: &Arc<JobState>,
    progress: &Arc<ProgressBroadcaster>,
    window: Duration,
) -> DiscoveryResponse {
    let mut config = config;
    config.discover_only = true;

    if let Err(e) = config::validate(&config) {
        return DiscoveryResponse::failure("Invalid crawl configuration", Some(e.to_string()));
    }

    let guard = match state.try_begin() {
        Some(g) => g,
        None => return DiscoveryResponse::failure("Another job is already running", None),
    };

    let cancel = CancellationToken::new();
    let traversal = match Traversal::new(config.clone(), Arc::clone(progress), cancel.clone()) {
        Ok(t) => t,
        Err(e) => return DiscoveryResponse::failure("Invalid crawl configuration", Some(e.to_string())),
    };

    tokio::select! {
        result = traversal.discover() => {
            if result.success {
                if let Some(pages) = result.pages_found {
                    state.set_last_discovery(LastDiscovery {
                        pages_found: pages,
                        timestamp: Utc::now(),
                        start_url: config.start_url.clone(),
                    });
                }
                DiscoveryResponse {
                    success: true,
                    pages_found: result.pages_found,
                    message: result.message,
                    details: None,
                    logs: Some(result.log),
                }
            } else {
                DiscoveryResponse {
                    success: false,
                    pages_found: None,
                    message: result.message,
                    details: None,
                    logs: Some(result.log),
                }
            }
        }
        _ = tokio::time::sleep(window) => {
            cancel.cancel();
            drop(guard);
            queue.enqueue(config);
            DiscoveryResponse {
                success: true,
                pages_found: None,
                message: "Discovery is taking longer than expected and will continue in the background"
                    .to_string(),
                details: None,
                logs: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn harness(dir: &tempfile::TempDir) -> (Arc<JobQueue>, Arc<JobState>, Arc<ProgressBroadcaster>) {
        (
            Arc::new(JobQueue::new()),
            Arc::new(JobState::new(dir.path().join("last_discovery.json"))),
            Arc::new(ProgressBroadcaster::new()),
        )
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_gate() {
        let dir = tempdir().unwrap();
        let (queue, state, progress) = harness(&dir);
        let config = CrawlConfig {
            start_url: "ftp://example.com/".to_string(),
            ..CrawlConfig::default()
        };

        let response = run_discovery(config, &queue, &state, &progress).await;
        assert!(!response.success);
        assert_eq!(response.message, "Invalid crawl configuration");
        assert!(response.details.is_some());
        assert!(!state.is_running());
    }

    #[tokio::test]
    async fn test_busy_gate_reports_running_job() {
        let dir = tempdir().unwrap();
        let (queue, state, progress) = harness(&dir);
        let _held = state.try_begin().unwrap();

        let config = CrawlConfig {
            start_url: "https://example.com/".to_string(),
            ..CrawlConfig::default()
        };
        let response = run_discovery(config, &queue, &state, &progress).await;
        assert!(!response.success);
        assert_eq!(response.message, "Another job is already running");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_response_wire_shape() {
        let response = DiscoveryResponse {
            success: true,
            pages_found: Some(12),
            message: "Discovery complete: 12 pages found".to_string(),
            details: None,
            logs: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["pagesFound"], 12);
        assert!(json.get("details").is_none());
        assert!(json.get("logs").is_none());
    }

    #[test]
    fn test_busy_response_wire_shape() {
        let response = DiscoveryResponse::failure("Another job is already running", None);
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(
            json,
            r#"{"success":false,"message":"Another job is already running"}"#
        );
    }
}
