//! Progress reporting for dispatch runs. The dispatcher emits done/total in
//! completion order; a console layer consumes via a sink.

use std::sync::Arc;

/// One progress update: how many inference jobs are done and total count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    pub done: usize,
    pub total: usize,
}

/// Sink for progress events. The dispatcher calls this each time a job
/// completes. Implementations may throttle (e.g. max N updates/sec or
/// every k jobs).
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;
