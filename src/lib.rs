//! dockup: backup and restore for databases running in Docker containers

pub mod core;
#[cfg(feature = "server")]
pub mod server;
pub mod utils;
