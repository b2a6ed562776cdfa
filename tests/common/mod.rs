#![allow(dead_code)]

use async_trait::async_trait;
use nusterm::core::profile::ServiceProfile;
use nusterm::core::terminal::{ReadOutcome, Terminal};
use nusterm::core::transport::{
    CharacteristicInfo, ConnectError, DiscoveredDevice, NotificationHandler, Transport, TransportError,
    TransportResult, WriteMode,
};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Call log entry recorded by the mock transport
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Scan,
    Connect(String),
    Characteristics,
    Write(Vec<u8>, WriteMode),
    Subscribe(Uuid),
    Disconnect,
}

#[derive(Default)]
struct MockState {
    calls: Vec<(Instant, Call)>,
    connect_script: VecDeque<Option<ConnectError>>,
    handler: Option<NotificationHandler>,
    connected: bool,
    writes_before_drop: Option<usize>,
}

/// In-memory transport with scripted connect outcomes
pub struct MockTransport {
    pub devices: Vec<DiscoveredDevice>,
    pub characteristics: Vec<CharacteristicInfo<Uuid>>,
    pub fail_subscribe: bool,
    pub fail_writes: bool,
    /// Device echoes every written byte back as a notification
    pub echo: bool,
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new(devices: Vec<DiscoveredDevice>) -> Self {
        let profile = ServiceProfile::NORDIC_UART;
        Self {
            devices,
            characteristics: vec![
                characteristic(Uuid::from_u128(0x2a00)),
                characteristic(profile.write),
                characteristic(profile.notify),
            ],
            fail_subscribe: false,
            fail_writes: false,
            echo: false,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Outcomes for successive connect calls; `None` is success.
    /// Calls past the end of the script succeed.
    pub fn with_connect_script(self, script: Vec<Option<ConnectError>>) -> Self {
        self.state.lock().unwrap().connect_script = script.into();
        self
    }

    pub fn with_characteristics(mut self, uuids: &[Uuid]) -> Self {
        self.characteristics = uuids.iter().copied().map(characteristic).collect();
        self
    }

    /// Link drops once this many payloads have been written
    pub fn drop_link_after_writes(self, writes: usize) -> Self {
        self.state.lock().unwrap().writes_before_drop = Some(writes);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.iter().map(|(_, call)| call.clone()).collect()
    }

    pub fn timed_writes(&self) -> Vec<(Instant, Vec<u8>)> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|(at, call)| match call {
                Call::Write(data, _) => Some((*at, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.timed_writes().into_iter().map(|(_, data)| data).collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    /// Push a notification to the subscribed handler
    pub fn notify(&self, data: &[u8]) {
        if let Some(handler) = self.state.lock().unwrap().handler.as_mut() {
            handler(data);
        }
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push((Instant::now(), call));
    }
}

pub fn characteristic(uuid: Uuid) -> CharacteristicInfo<Uuid> {
    CharacteristicInfo {
        service: ServiceProfile::NORDIC_UART.service,
        uuid,
        characteristic: uuid,
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Handle = u32;
    type Characteristic = Uuid;

    async fn scan(&self, _timeout: Duration) -> TransportResult<Vec<DiscoveredDevice>> {
        self.record(Call::Scan);
        Ok(self.devices.clone())
    }

    async fn connect(&self, device_id: &str, _timeout: Duration) -> Result<u32, ConnectError> {
        self.record(Call::Connect(device_id.to_string()));
        let mut state = self.state.lock().unwrap();
        match state.connect_script.pop_front().flatten() {
            Some(error) => Err(error),
            None => {
                state.connected = true;
                Ok(1)
            }
        }
    }

    async fn characteristics(&self, _handle: &u32) -> TransportResult<Vec<CharacteristicInfo<Uuid>>> {
        self.record(Call::Characteristics);
        Ok(self.characteristics.clone())
    }

    async fn write(&self, _handle: &u32, _characteristic: &Uuid, data: &[u8], mode: WriteMode) -> TransportResult<()> {
        if !self.state.lock().unwrap().connected {
            return Err(TransportError::NotConnected);
        }
        if self.fail_writes {
            return Err(TransportError::operation("write", "GATT error 0x0e"));
        }
        self.record(Call::Write(data.to_vec(), mode));

        let mut state = self.state.lock().unwrap();
        if let Some(remaining) = state.writes_before_drop.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                state.connected = false;
            }
        }
        if self.echo {
            if let Some(handler) = state.handler.as_mut() {
                handler(data);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, _handle: &u32, characteristic: &Uuid, on_data: NotificationHandler) -> TransportResult<()> {
        self.record(Call::Subscribe(*characteristic));
        if self.fail_subscribe {
            return Err(TransportError::operation("subscribe", "CCCD write rejected"));
        }
        self.state.lock().unwrap().handler = Some(on_data);
        Ok(())
    }

    async fn is_connected(&self, _handle: &u32) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn disconnect(&self, _handle: &u32) -> TransportResult<()> {
        self.record(Call::Disconnect);
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.handler = None;
        Ok(())
    }
}

/// Scripted console input
#[derive(Debug, Clone)]
pub enum Input {
    Byte(u8),
    Idle,
    Fail,
}

#[derive(Debug, Default)]
pub struct TerminalState {
    pub raw: bool,
    pub snapshot_calls: usize,
    pub set_raw_calls: usize,
    pub restore_calls: usize,
    pub script: VecDeque<Input>,
}

/// Terminal whose state stays observable after the bridge borrows it
#[derive(Debug, Clone, Default)]
pub struct MockTerminal {
    pub state: Arc<Mutex<TerminalState>>,
}

impl MockTerminal {
    pub fn typing(bytes: &[u8]) -> Self {
        let terminal = Self::default();
        terminal
            .state
            .lock()
            .unwrap()
            .script
            .extend(bytes.iter().copied().map(Input::Byte));
        terminal
    }

    pub fn scripted(script: Vec<Input>) -> Self {
        let terminal = Self::default();
        terminal.state.lock().unwrap().script = script.into();
        terminal
    }

    pub fn set_raw_calls(&self) -> usize {
        self.state.lock().unwrap().set_raw_calls
    }

    pub fn restore_calls(&self) -> usize {
        self.state.lock().unwrap().restore_calls
    }

    pub fn is_raw(&self) -> bool {
        self.state.lock().unwrap().raw
    }
}

impl Terminal for MockTerminal {
    type Mode = bool;

    fn snapshot_mode(&mut self) -> io::Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.snapshot_calls += 1;
        Ok(state.raw)
    }

    fn set_raw_mode(&mut self) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.set_raw_calls += 1;
        state.raw = true;
        Ok(())
    }

    fn restore_mode(&mut self, mode: bool) -> io::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.restore_calls += 1;
        state.raw = mode;
        Ok(())
    }

    fn read_nonblocking(&mut self) -> io::Result<ReadOutcome> {
        match self.state.lock().unwrap().script.pop_front() {
            Some(Input::Byte(byte)) => Ok(ReadOutcome::Byte(byte)),
            Some(Input::Fail) => Err(io::Error::new(io::ErrorKind::Other, "console closed")),
            Some(Input::Idle) | None => Ok(ReadOutcome::WouldBlock),
        }
    }
}

/// Console stand-in shared with the notification sink
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn widgets() -> Vec<DiscoveredDevice> {
    vec![
        DiscoveredDevice::new("addr1", Some("Widget-A")),
        DiscoveredDevice::new("addr2", None),
        DiscoveredDevice::new("addr3", Some("Widget-B")),
    ]
}
