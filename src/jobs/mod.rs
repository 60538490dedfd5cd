//! Job orchestration
//!
//! Crawls run one at a time. [`JobState`] is the single-flight gate plus the
//! persisted last-discovery record, [`JobQueue`] holds submitted configs in
//! FIFO order, and [`run_worker`] is the background loop that drains the
//! queue. [`run_discovery`] serves the synchronous discovery path, handing
//! long runs off to the queue when they outlive the response window.

mod discovery;
mod queue;
mod state;
mod worker;

pub use discovery::{
    run_discovery, run_discovery_with_window, DiscoveryResponse, DISCOVERY_TIMEOUT,
};
pub use queue::JobQueue;
pub use state::{JobGuard, JobState, LastDiscovery};
pub use worker::run_worker;
