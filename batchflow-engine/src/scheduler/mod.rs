//! Scheduler layer for the engine
//!
//! The remote service runs the submitted tasks in parallel across its
//! nodes; this layer only observes them. It polls task state until every
//! task is terminal, the deadline trips, or the session is cancelled.

pub mod monitor;

pub use monitor::{TaskMonitor, deadline_after};
