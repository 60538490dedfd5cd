//! FIFO job queue
//!
//! Submission is fire-and-forget; the worker polls with a non-blocking pop.

use crate::config::CrawlConfig;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<CrawlConfig>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, config: CrawlConfig) {
        tracing::debug!(start_url = %config.start_url, "job enqueued");
        self.jobs.lock().unwrap().push_back(config);
    }

    /// Puts a job back at the head of the queue, preserving its turn.
    pub fn requeue(&self, config: CrawlConfig) {
        self.jobs.lock().unwrap().push_front(config);
    }

    pub fn try_dequeue(&self) -> Option<CrawlConfig> {
        self.jobs.lock().unwrap().pop_front()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> CrawlConfig {
        CrawlConfig {
            start_url: url.to_string(),
            ..CrawlConfig::default()
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = JobQueue::new();
        queue.enqueue(config("https://a.example/"));
        queue.enqueue(config("https://b.example/"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_dequeue().unwrap().start_url, "https://a.example/");
        assert_eq!(queue.try_dequeue().unwrap().start_url, "https://b.example/");
        assert!(queue.try_dequeue().is_none());
    }

    #[test]
    fn test_requeue_goes_to_front() {
        let queue = JobQueue::new();
        queue.enqueue(config("https://a.example/"));
        queue.enqueue(config("https://b.example/"));

        let first = queue.try_dequeue().unwrap();
        queue.requeue(first);
        assert_eq!(queue.try_dequeue().unwrap().start_url, "https://a.example/");
    }

    #[test]
    fn test_empty_queue() {
        let queue = JobQueue::new();
        assert!(queue.is_empty());
        assert!(queue.try_dequeue().is_none());
    }
}
