//! Process-level helpers for binaries embedding the router.
//!
//! | Module | Description | Feature |
//! |--------|-------------|---------|
//! | [`sig_down`] | Graceful shutdown on SIGTERM/SIGINT | - |
//! | [`telemetry`] | Log subscriber, plus OTLP traces and metrics | OTLP export needs `telemetry` |

pub mod sig_down;
pub mod telemetry;

pub use sig_down::*;
pub use telemetry::*;
