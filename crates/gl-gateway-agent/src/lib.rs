//! GridLink Gateway Agent library crate.
//!
//! Re-exports all modules so external crates (e.g. `gl-e2e-tests`) can
//! access internal types like `GatewayConfig`, `GatewayHub`, and the
//! telemetry loop.

pub mod config;
pub mod hub;
pub mod telemetry_loop;
