//! Data Transfer Objects for the compute service
//!
//! Wire representations of the compute service's REST payloads. Domain
//! types that already match the wire shape (task specs, resource files,
//! image references) are sent as-is; everything else is converted here.

pub mod common;
pub mod job;
pub mod pool;
pub mod task;
