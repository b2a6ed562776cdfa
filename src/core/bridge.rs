use crate::core::connection::Session;
use crate::core::profile::{log_enable_command, INTERRUPT_BYTE, WAKE_SEQUENCE};
use crate::core::terminal::{RawModeGuard, ReadOutcome, Terminal};
use crate::core::transport::{NotificationHandler, Transport, WriteMode};
use crate::domain::config::SessionTimings;
use crate::domain::error::{NusTermError, NusTermResult};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Why the interactive loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// User typed the interrupt byte
    Interrupted,
    /// Link to the device dropped
    Disconnected,
    /// Process received an out-of-band signal
    Terminated(ShutdownSignal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
    Hangup,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Bridge behaviour knobs
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub device_log_level: String,
    pub write_mode: WriteMode,
    pub prompt_delay: Duration,
    pub log_delay: Duration,
    pub poll_interval: Duration,
    pub link_check_interval: Duration,
}

impl BridgeSettings {
    pub fn new(device_log_level: impl Into<String>, write_mode: WriteMode, timings: &SessionTimings) -> Self {
        Self {
            device_log_level: device_log_level.into(),
            write_mode,
            prompt_delay: timings.prompt_delay,
            log_delay: timings.log_delay,
            poll_interval: timings.poll_interval,
            link_check_interval: timings.link_check_interval,
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self::new("inf", WriteMode::WithoutResponse, &SessionTimings::default())
    }
}

/// Writes device notifications to the console as they arrive
pub struct ConsoleSink<W> {
    out: W,
}

impl<W: Write + Send + 'static> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn deliver(&mut self, data: &[u8]) {
        trace!(bytes = %hex::encode(data), "notification");

        let text = decode_permissive(data);
        if text.is_empty() {
            return;
        }
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!("Failed to write device output to console: {}", e);
        }
    }

    pub fn into_handler(mut self) -> NotificationHandler {
        Box::new(move |data| self.deliver(data))
    }
}

/// Decode as UTF-8, dropping invalid sequences instead of failing or
/// substituting replacement characters.
pub fn decode_permissive(data: &[u8]) -> String {
    data.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// Owns the interactive loop for one connected session
pub struct SessionBridge<'a, T: Transport + ?Sized> {
    transport: &'a T,
    settings: BridgeSettings,
}

impl<'a, T: Transport + ?Sized> SessionBridge<'a, T> {
    pub fn new(transport: &'a T, settings: BridgeSettings) -> Self {
        Self { transport, settings }
    }

    /// Run until Ctrl+C, disconnect, error or a process signal
    pub async fn run<M, W, O>(
        &self,
        session: Session<T>,
        terminal: &mut M,
        console: W,
        status: &mut O,
    ) -> NusTermResult<SessionEnd>
    where
        M: Terminal,
        W: Write + Send + 'static,
        O: Write,
    {
        self.run_until(session, terminal, console, status, shutdown_signal()).await
    }

    /// Like [`run`](Self::run) with a caller-provided shutdown trigger.
    /// The session is disconnected on every exit path.
    pub async fn run_until<M, W, O, F>(
        &self,
        session: Session<T>,
        terminal: &mut M,
        console: W,
        status: &mut O,
        shutdown: F,
    ) -> NusTermResult<SessionEnd>
    where
        M: Terminal,
        W: Write + Send + 'static,
        O: Write,
        F: Future<Output = ShutdownSignal>,
    {
        let result = self.drive(&session, terminal, console, status, shutdown).await;

        match &result {
            Ok(end) => info!("Session with {} ended: {:?}", session.device, end),
            Err(e) => warn!("Session with {} failed: {}", session.device, e),
        }
        if let Err(e) = self.transport.disconnect(&session.handle).await {
            debug!("Disconnect on session exit: {}", e);
        }

        result
    }

    async fn drive<M, W, O, F>(
        &self,
        session: &Session<T>,
        terminal: &mut M,
        console: W,
        status: &mut O,
        shutdown: F,
    ) -> NusTermResult<SessionEnd>
    where
        M: Terminal,
        W: Write + Send + 'static,
        O: Write,
        F: Future<Output = ShutdownSignal>,
    {
        let sink = ConsoleSink::new(console);
        self.transport
            .subscribe(&session.handle, &session.notify_characteristic, sink.into_handler())
            .await?;
        writeln!(status, "Subscribed to TX notifications\n")?;
        writeln!(status, "Raw terminal mode - all keys passed through to device")?;
        writeln!(status, "Ctrl+C to exit\n")?;
        status.flush()?;

        self.handshake(session).await?;

        let mut guard = RawModeGuard::enter(terminal).map_err(terminal_error)?;

        let end = tokio::select! {
            end = self.pump(session, &mut guard) => end,
            signal = shutdown => {
                info!("Received {}, leaving raw mode", signal);
                Ok(SessionEnd::Terminated(signal))
            }
        };

        let restored = guard.restore();
        let end = end?;
        restored.map_err(terminal_error)?;
        Ok(end)
    }

    /// Wake the prompt, then raise device log verbosity. Best effort
    /// priming, so writes are sent in the configured (default unacked) mode.
    async fn handshake(&self, session: &Session<T>) -> NusTermResult<()> {
        let mode = self.settings.write_mode;

        self.transport
            .write(&session.handle, &session.write_characteristic, WAKE_SEQUENCE, mode)
            .await?;
        debug!("Wake sequence sent");
        tokio::time::sleep(self.settings.prompt_delay).await;

        let command = log_enable_command(&self.settings.device_log_level);
        self.transport
            .write(&session.handle, &session.write_characteristic, &command, mode)
            .await?;
        debug!("Requested device log level '{}'", self.settings.device_log_level);
        tokio::time::sleep(self.settings.log_delay).await;

        Ok(())
    }

    async fn pump<M: Terminal>(
        &self,
        session: &Session<T>,
        guard: &mut RawModeGuard<'_, M>,
    ) -> NusTermResult<SessionEnd> {
        let mut last_link_check = Instant::now();

        loop {
            match guard.read_nonblocking().map_err(terminal_error)? {
                ReadOutcome::Byte(INTERRUPT_BYTE) => {
                    debug!("Interrupt byte read, leaving session");
                    return Ok(SessionEnd::Interrupted);
                }
                ReadOutcome::Byte(byte) => {
                    let written = self
                        .transport
                        .write(&session.handle, &session.write_characteristic, &[byte], self.settings.write_mode)
                        .await;
                    if let Err(e) = written {
                        if !self.transport.is_connected(&session.handle).await {
                            return Ok(SessionEnd::Disconnected);
                        }
                        return Err(e.into());
                    }
                    tokio::task::yield_now().await;
                }
                ReadOutcome::WouldBlock => {
                    tokio::time::sleep(self.settings.poll_interval).await;

                    if last_link_check.elapsed() >= self.settings.link_check_interval {
                        last_link_check = Instant::now();
                        if !self.transport.is_connected(&session.handle).await {
                            return Ok(SessionEnd::Disconnected);
                        }
                    }
                }
            }
        }
    }
}

fn terminal_error(e: std::io::Error) -> NusTermError {
    NusTermError::Terminal(e.to_string())
}

/// Resolves when the process receives an interrupt, terminate or hangup signal
#[cfg(unix)]
pub async fn shutdown_signal() -> ShutdownSignal {
    use tokio::signal::unix::{signal, SignalKind};

    let streams = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    );
    let (mut interrupt, mut terminate, mut hangup) = match streams {
        (Ok(interrupt), Ok(terminate), Ok(hangup)) => (interrupt, terminate, hangup),
        _ => {
            warn!("Failed to install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = interrupt.recv() => ShutdownSignal::Interrupt,
        _ = terminate.recv() => ShutdownSignal::Terminate,
        _ = hangup.recv() => ShutdownSignal::Hangup,
    }
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> ShutdownSignal {
    match tokio::signal::ctrl_c().await {
        Ok(()) => ShutdownSignal::Interrupt,
        Err(e) => {
            warn!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending().await
        }
    }
}
