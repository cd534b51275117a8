//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (mangawatch-infra) implements. The core crate never depends on any
//! specific storage technology; `memory` is the in-process test double
//! the service and dispatcher tests run against.

pub mod conversation;
#[cfg(test)]
pub mod memory;
pub mod subscription;
