//! Inference engine: a bounded worker pool draining the case-by-model job
//! matrix, with per-job retry and backoff.

pub mod dispatcher;
pub mod retry;
pub mod worker;

pub use dispatcher::Dispatcher;
