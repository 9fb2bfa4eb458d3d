//! Use-case facades over the builder and executor.
//!
//! # Responsibility
//! - Provide the manager facade consumed by application services.
//! - Provide typed writers that persist serializable values.
//!
//! # Invariants
//! - Service APIs never bypass the save builder or batch executor.

pub mod manager;
pub mod writer;
