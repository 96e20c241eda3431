//! Command implementations for the `cliflow` binary, one submodule each.

mod complete;
mod config;
mod daemon;
mod specs;

pub use complete::execute as complete;
pub use config::{init as config_init, path as config_path};
pub use daemon::{run as daemon_run, start as daemon_start, status as daemon_status, stop as daemon_stop};
pub use specs::execute as list_specs;
