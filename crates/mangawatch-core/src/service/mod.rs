//! Business logic services (use cases).
//!
//! Services orchestrate repository and catalog calls and enforce the
//! business rules. They depend on traits (ports) -- never on concrete
//! infrastructure implementations.

pub mod conversation;
pub mod subscription;
