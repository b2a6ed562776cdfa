use std::io;
use tracing::{debug, warn};

/// Result of a non-blocking console read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Byte(u8),
    WouldBlock,
}

/// Console mode control and raw input
pub trait Terminal {
    /// Opaque capture of the console mode prior to raw mode
    type Mode;

    fn snapshot_mode(&mut self) -> io::Result<Self::Mode>;

    /// Unbuffered, unechoed, non-blocking input
    fn set_raw_mode(&mut self) -> io::Result<()>;

    fn restore_mode(&mut self, mode: Self::Mode) -> io::Result<()>;

    fn read_nonblocking(&mut self) -> io::Result<ReadOutcome>;
}

/// Exclusive raw-mode window on a terminal.
///
/// The snapshot taken on entry is restored exactly once: by [`restore`]
/// on the normal path, or by `Drop` when the guard goes out of scope on an
/// early return, a cancelled future or an unwinding panic.
///
/// [`restore`]: RawModeGuard::restore
pub struct RawModeGuard<'a, T: Terminal> {
    terminal: &'a mut T,
    saved: Option<T::Mode>,
}

impl<'a, T: Terminal> RawModeGuard<'a, T> {
    pub fn enter(terminal: &'a mut T) -> io::Result<Self> {
        let saved = terminal.snapshot_mode()?;
        let mut guard = Self {
            terminal,
            saved: Some(saved),
        };
        // A failed switch still restores the snapshot when the guard drops.
        guard.terminal.set_raw_mode()?;
        debug!("Console switched to raw mode");
        Ok(guard)
    }

    pub fn read_nonblocking(&mut self) -> io::Result<ReadOutcome> {
        self.terminal.read_nonblocking()
    }

    pub fn restore(mut self) -> io::Result<()> {
        self.release()
    }

    fn release(&mut self) -> io::Result<()> {
        match self.saved.take() {
            Some(mode) => {
                self.terminal.restore_mode(mode)?;
                debug!("Console mode restored");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<T: Terminal> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to restore console mode: {}", e);
        }
    }
}
