//! NusTerm Library
//!
//! Interactive terminal sessions with embedded devices over the BLE
//! Nordic UART Service: device selection, bounded-retry connection and
//! the raw-mode keystroke/notification bridge.

pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use crate::core::{ConnectionManager, DeviceSelector, SessionBridge, SessionEnd};
pub use crate::domain::config::NusTermConfig;
pub use crate::domain::error::{NusTermError, NusTermResult};
