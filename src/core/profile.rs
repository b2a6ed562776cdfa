//! Fixed protocol constants for the Nordic UART Service (NUS).

use uuid::Uuid;

/// Connection attempts made for one chosen device before giving up.
pub const MAX_CONNECTION_ATTEMPTS: u32 = 3;

/// Ctrl+C (ASCII ETX). Ends the shell instead of being forwarded.
pub const INTERRUPT_BYTE: u8 = 0x03;

/// Wakes the device's command prompt.
pub const WAKE_SEQUENCE: &[u8] = b"\r";

/// UUID triple identifying a UART-emulation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceProfile {
    pub service: Uuid,
    /// Host -> device, accepts writes
    pub write: Uuid,
    /// Device -> host, emits notifications
    pub notify: Uuid,
}

impl ServiceProfile {
    pub const NORDIC_UART: ServiceProfile = ServiceProfile {
        service: Uuid::from_u128(0x6e400001_b5a3_f393_e0a9_e50e24dcca9e),
        write: Uuid::from_u128(0x6e400002_b5a3_f393_e0a9_e50e24dcca9e),
        notify: Uuid::from_u128(0x6e400003_b5a3_f393_e0a9_e50e24dcca9e),
    };
}

impl Default for ServiceProfile {
    fn default() -> Self {
        Self::NORDIC_UART
    }
}

/// CR-terminated command raising device-side log verbosity.
pub fn log_enable_command(level: &str) -> Vec<u8> {
    format!("log enable {}\r", level).into_bytes()
}
