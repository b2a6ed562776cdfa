// Core module - Session lifecycle: selection, connection, interactive bridge
pub mod bridge;
pub mod connection;
pub mod profile;
pub mod selector;
pub mod terminal;
pub mod transport;

pub use bridge::{BridgeSettings, SessionBridge, SessionEnd, ShutdownSignal};
pub use connection::{ConnectionManager, Session};
pub use profile::ServiceProfile;
pub use selector::DeviceSelector;
pub use terminal::{RawModeGuard, ReadOutcome, Terminal};
pub use transport::{DiscoveredDevice, Transport, WriteMode};
