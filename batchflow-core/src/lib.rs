//! Batchflow Core
//!
//! Core types shared by the Batchflow client, engine and CLI.
//!
//! This crate contains:
//! - Domain types: workflow types, task specifications, pool and job
//!   descriptors, observed task state and the session report
//! - DTOs: wire representations of the compute service's REST payloads

pub mod domain;
pub mod dto;
