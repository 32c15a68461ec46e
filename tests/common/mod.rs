//! Common test utilities: tracing setup for the integration suites.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // restart/split events appear when the `tracing` feature is on
//! }
//! ```
//!
//! Filtering is driven by `RUST_LOG` (e.g. `RUST_LOG=btree_olc=trace`);
//! without it only warnings and errors are shown. The library itself emits
//! nothing unless built with `--features tracing`.

#![allow(dead_code)]

use std::sync::Once;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Ensures tracing is only initialized once across all tests.
static INIT: Once = Once::new();

/// Initialize the tracing subscriber with console logging.
///
/// Safe to call multiple times - only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(setup_tracing);
}

/// Create an `EnvFilter` from `RUST_LOG` or fall back to warnings only.
fn make_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{}", Level::WARN)))
}

fn setup_tracing() {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .compact()
        .with_filter(make_filter());

    // try_init: another harness in the same process may have installed one.
    let _ = Registry::default().with(console_layer).try_init();
}
