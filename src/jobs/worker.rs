//! Background job worker
//!
//! A single loop that polls the queue once a second and runs each job behind
//! the single-flight gate. When the gate is held by someone else (a
//! synchronous discovery request, for instance), the dequeued job goes back
//! to the head of the queue instead of being dropped, and the worker waits
//! for the next poll.

use crate::config::CrawlConfig;
use crate::crawler::Traversal;
use crate::jobs::{JobGuard, JobQueue, JobState, LastDiscovery};
use crate::progress::ProgressBroadcaster;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runs the worker loop until `shutdown` fires.
pub async fn run_worker(
    queue: Arc<JobQueue>,
    state: Arc<JobState>,
    progress: Arc<ProgressBroadcaster>,
    shutdown: CancellationToken,
) {
    tracing::info!("job worker started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::info!("job worker shutting down");
                return;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        let config = match queue.try_dequeue() {
            Some(c) => c,
            None => continue,
        };

        let guard = match state.try_begin() {
            Some(g) => g,
            None => {
                // another job holds the gate: keep this one, try again later
                queue.requeue(config);
                continue;
            }
        };

        run_job(config, guard, &state, &progress, &shutdown).await;
    }
}

async fn run_job(
    config: CrawlConfig,
    guard: JobGuard,
    state: &Arc<JobState>,
    progress: &Arc<ProgressBroadcaster>,
    shutdown: &CancellationToken,
) {
    let discover = config.discover_only;
    let start_url = config.start_url.clone();
    tracing::info!(start_url = %start_url, discover, "job started");

    match Traversal::new(config, Arc::clone(progress), shutdown.child_token()) {
        Ok(traversal) => {
            let result = traversal.run().await;
            if result.success {
                if discover {
                    if let Some(pages) = result.pages_found {
                        state.set_last_discovery(LastDiscovery {
                            pages_found: pages,
                            timestamp: Utc::now(),
                            start_url,
                        });
                    }
                }
                progress.broadcast(&format!("Completed: {}", result.message));
            } else {
                progress.broadcast(&format!("Error: {}", result.message));
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "job rejected");
            progress.broadcast(&format!("Error: {}", e));
        }
    }

    drop(guard);
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
    async fn test_worker_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let (queue, state, progress) = harness(&dir);
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(run_worker(
            queue,
            state,
            progress,
            shutdown.clone(),
        ));
        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_gate_requeues_job() {
        let dir = tempdir().unwrap();
        let (queue, state, progress) = harness(&dir);
        let shutdown = CancellationToken::new();

        queue.enqueue(CrawlConfig {
            start_url: "https://example.com/".to_string(),
            ..CrawlConfig::default()
        });
        let _held = state.try_begin().unwrap();

        let handle = tokio::spawn(run_worker(
            Arc::clone(&queue),
            Arc::clone(&state),
            progress,
            shutdown.clone(),
        ));

        // a few poll cycles with the gate held: the job must survive them
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(queue.len(), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_job_broadcasts_error_and_frees_gate() {
        let dir = tempdir().unwrap();
        let (queue, state, progress) = harness(&dir);
        let shutdown = CancellationToken::new();
        let (_id, mut rx) = progress.subscribe();

        queue.enqueue(CrawlConfig {
            start_url: "not-a-url".to_string(),
            ..CrawlConfig::default()
        });

        let handle = tokio::spawn(run_worker(
            Arc::clone(&queue),
            Arc::clone(&state),
            Arc::clone(&progress),
            shutdown.clone(),
        ));

        let line = rx.recv().await.unwrap();
        assert!(line.starts_with("Error:"), "got: {}", line);
        assert!(!state.is_running());

        shutdown.cancel();
        handle.await.unwrap();
    }
}
