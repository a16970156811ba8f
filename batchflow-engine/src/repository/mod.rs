//! Repository layer
//!
//! Repositories are thin seams over the remote services the engine talks
//! to. They carry no business logic; the engine and the resource locator
//! only see these traits, so tests can substitute in-memory fakes.

mod blob;
mod compute;

// Re-export traits
pub use blob::BlobRepository;
pub use compute::ComputeRepository;
