//! Payment router HTTP entrypoint.
//!
//! Loads the registry from the JSON config, seeds an in-memory store with it and
//! serves the routing, lifecycle and diagnostics endpoints of
//! [`paybridge_router::handlers`]. Idle payments are expired in the background.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG` path of the config file (default `config.json`)
//! - `HOST`, `PORT` control the binding address when the config omits them
//! - `RUST_LOG` filters logs, `OTEL_*` variables enable OTLP export (`telemetry` feature)

mod config;
mod run;

use std::process;

use crate::run::run;

#[tokio::main]
async fn main() {
    let result = run().await;
    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1)
    }
}
