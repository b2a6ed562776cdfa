use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// A peripheral seen during one scan pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Opaque transport identifier, used to connect
    pub id: String,
    /// Human-readable address
    pub address: String,
    /// Advertised local name
    pub name: Option<String>,
}

impl DiscoveredDevice {
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        let id = id.into();
        Self {
            address: id.clone(),
            id,
            name: name.map(str::to_string),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

impl std::fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.address)
    }
}

/// An enumerated characteristic and the transport's reference to it
#[derive(Debug, Clone)]
pub struct CharacteristicInfo<C> {
    pub service: Uuid,
    pub uuid: Uuid,
    pub characteristic: C,
}

/// GATT write mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Write request, acknowledged by the peripheral
    WithResponse,
    /// Write command, no acknowledgement
    #[default]
    WithoutResponse,
}

impl WriteMode {
    pub fn from_ack_required(ack_required: bool) -> Self {
        if ack_required {
            WriteMode::WithResponse
        } else {
            WriteMode::WithoutResponse
        }
    }
}

/// Sink invoked for every notification buffer, in arrival order
pub type NotificationHandler = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Why a single connection attempt failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection refused: {0}")]
    Refused(String),

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("adapter unavailable: {0}")]
    Unavailable(String),
}

impl ConnectError {
    /// Transient faults worth another attempt. An identity the transport
    /// does not know or an unusable adapter will not improve on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectError::Timeout(_) | ConnectError::Refused(_))
    }
}

/// Transport failures outside of connection establishment
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Bluetooth adapter unavailable: {0}")]
    Unavailable(String),

    #[error("Device not connected")]
    NotConnected,

    #[error("{operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },
}

impl TransportError {
    pub fn operation(operation: &'static str, message: impl ToString) -> Self {
        TransportError::Operation {
            operation,
            message: message.to_string(),
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Wireless transport capability used by the shell
#[async_trait]
pub trait Transport: Send + Sync {
    /// Live connection to one peripheral
    type Handle: Clone + Send + Sync;
    /// Reference to a characteristic on a live connection
    type Characteristic: Clone + Send + Sync;

    /// Discover reachable devices for `timeout`
    async fn scan(&self, timeout: Duration) -> TransportResult<Vec<DiscoveredDevice>>;

    /// Connect to a previously discovered device
    async fn connect(&self, device_id: &str, timeout: Duration) -> Result<Self::Handle, ConnectError>;

    /// Enumerate every characteristic of every service
    async fn characteristics(
        &self,
        handle: &Self::Handle,
    ) -> TransportResult<Vec<CharacteristicInfo<Self::Characteristic>>>;

    /// Write bytes to a characteristic
    async fn write(
        &self,
        handle: &Self::Handle,
        characteristic: &Self::Characteristic,
        data: &[u8],
        mode: WriteMode,
    ) -> TransportResult<()>;

    /// Subscribe to notifications, delivering each buffer to `on_data`
    async fn subscribe(
        &self,
        handle: &Self::Handle,
        characteristic: &Self::Characteristic,
        on_data: NotificationHandler,
    ) -> TransportResult<()>;

    /// Whether the link is still up
    async fn is_connected(&self, handle: &Self::Handle) -> bool;

    /// Tear down the connection
    async fn disconnect(&self, handle: &Self::Handle) -> TransportResult<()>;
}
