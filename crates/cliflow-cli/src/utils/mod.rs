//! Shared helpers for the `cliflow` commands.
//!
//! - [`logging`]: tracing subscriber and color setup from the global flags

pub mod logging;

pub use logging::initialize_logging;
