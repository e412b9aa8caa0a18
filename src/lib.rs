//! No library surface of its own; exists so `tests/` can run as
//! workspace-wide integration tests against the shared crates.
