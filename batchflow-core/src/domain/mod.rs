//! Core domain types
//!
//! These types describe what the engine asks the compute service to do
//! (pools, jobs, task specifications) and what it observes back (task
//! state, failures, outputs). They are shared between the client, which
//! moves them over the wire, and the engine, which orchestrates them.

pub mod job;
pub mod pool;
pub mod session;
pub mod task;
pub mod workflow;
