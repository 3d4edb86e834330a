#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the land-cover toolchain.
//!
//! [`init_logger`] sets up `pretty_env_logger` from `RUST_LOG`, and
//! [`print_json`] writes command results to stdout so that logs (on
//! stderr) and results never mix.

use serde::Serialize;

/// Initializes the global logger from `RUST_LOG`, defaulting to `info`.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logger() {
    let mut builder = pretty_env_logger::formatted_builder();
    if std::env::var_os("RUST_LOG").is_some() {
        builder.parse_env("RUST_LOG");
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.try_init().ok(); // Already set (e.g., in tests)
}

/// Pretty-printed JSON for `value`.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if `value` cannot be serialized.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Writes `value` to stdout as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`serde_json::Error`] if `value` cannot be serialized.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", to_json(value)?);
    Ok(())
}
