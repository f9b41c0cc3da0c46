//! Process-wide runtime configuration: seeded randomness and tracing setup.

pub mod determinism;
pub mod tracing;
