pub mod provision;
pub mod telemetry;
pub mod topics;

pub use provision::*;
pub use telemetry::*;
