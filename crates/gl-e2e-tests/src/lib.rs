//! End-to-end integration tests across the GridLink crates.
//!
//! All tests live under `tests/`. This library target only exists so the
//! crate is a regular workspace member.
