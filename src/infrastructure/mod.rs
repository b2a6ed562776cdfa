// Infrastructure module - External dependencies and adapters
pub mod ble;
pub mod config;
pub mod logging;
pub mod terminal;
