use crate::core::terminal::{ReadOutcome, Terminal};
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use crossterm::queue;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, is_raw_mode_enabled};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;
use tracing::debug;

/// Console mode before the shell took over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsoleMode {
    was_raw: bool,
}

/// Process console driven through crossterm.
///
/// Key events are translated into the bytes a serial terminal would send
/// and queued, so each read yields at most one byte.
#[derive(Debug, Default)]
pub struct CrosstermTerminal {
    pending: VecDeque<u8>,
    paste_enabled: bool,
}

impl CrosstermTerminal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Terminal for CrosstermTerminal {
    type Mode = ConsoleMode;

    fn snapshot_mode(&mut self) -> io::Result<ConsoleMode> {
        Ok(ConsoleMode {
            was_raw: is_raw_mode_enabled()?,
        })
    }

    fn set_raw_mode(&mut self) -> io::Result<()> {
        enable_raw_mode()?;
        // Without bracketed paste, pasted text still arrives as key events.
        match set_bracketed_paste(&mut io::stdout(), true) {
            Ok(()) => self.paste_enabled = true,
            Err(e) => debug!("Bracketed paste unavailable: {}", e),
        }
        Ok(())
    }

    fn restore_mode(&mut self, mode: ConsoleMode) -> io::Result<()> {
        self.pending.clear();
        let paste = if self.paste_enabled {
            self.paste_enabled = false;
            set_bracketed_paste(&mut io::stdout(), false)
        } else {
            Ok(())
        };

        let raw = if mode.was_raw { Ok(()) } else { disable_raw_mode() };
        paste.and(raw)
    }

    fn read_nonblocking(&mut self) -> io::Result<ReadOutcome> {
        if self.pending.is_empty() && event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    self.pending.extend(encode_key(&key));
                }
                Event::Paste(text) => self.pending.extend(text.into_bytes()),
                _ => {}
            }
        }

        Ok(self
            .pending
            .pop_front()
            .map_or(ReadOutcome::WouldBlock, ReadOutcome::Byte))
    }
}

fn set_bracketed_paste<W: Write>(out: &mut W, enabled: bool) -> io::Result<()> {
    if enabled {
        queue!(out, EnableBracketedPaste)?;
    } else {
        queue!(out, DisableBracketedPaste)?;
    }
    out.flush()
}

/// Bytes a VT100-style terminal sends for a key press
pub fn encode_key(key: &KeyEvent) -> Vec<u8> {
    let mut bytes = Vec::new();
    if key.modifiers.contains(KeyModifiers::ALT) {
        bytes.push(0x1b);
    }

    match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => match control_byte(c) {
            Some(byte) => bytes.push(byte),
            None => return Vec::new(),
        },
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        KeyCode::Enter => bytes.push(b'\r'),
        KeyCode::Tab => bytes.push(b'\t'),
        KeyCode::Backspace => bytes.push(0x7f),
        KeyCode::Esc => bytes.push(0x1b),
        KeyCode::BackTab => bytes.extend_from_slice(b"\x1b[Z"),
        KeyCode::Up => bytes.extend_from_slice(b"\x1b[A"),
        KeyCode::Down => bytes.extend_from_slice(b"\x1b[B"),
        KeyCode::Right => bytes.extend_from_slice(b"\x1b[C"),
        KeyCode::Left => bytes.extend_from_slice(b"\x1b[D"),
        KeyCode::Home => bytes.extend_from_slice(b"\x1b[H"),
        KeyCode::End => bytes.extend_from_slice(b"\x1b[F"),
        KeyCode::Insert => bytes.extend_from_slice(b"\x1b[2~"),
        KeyCode::Delete => bytes.extend_from_slice(b"\x1b[3~"),
        KeyCode::PageUp => bytes.extend_from_slice(b"\x1b[5~"),
        KeyCode::PageDown => bytes.extend_from_slice(b"\x1b[6~"),
        KeyCode::F(n @ 1..=4) => bytes.extend_from_slice(&[0x1b, b'O', b'P' + (n - 1)]),
        KeyCode::F(n @ 5..=12) => bytes.extend_from_slice(format!("\x1b[{}~", function_key_code(n)).as_bytes()),
        _ => return Vec::new(),
    }

    bytes
}

// xterm numbering skips 16 and 22
fn function_key_code(n: u8) -> u8 {
    match n {
        5 => 15,
        6..=10 => n + 11,
        _ => n + 12,
    }
}

// Ctrl+letter and the C0 punctuation keys
fn control_byte(c: char) -> Option<u8> {
    match c {
        'a'..='z' => Some(c as u8 - b'a' + 1),
        'A'..='Z' => Some(c as u8 - b'A' + 1),
        '@' | ' ' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '7' | '/' => Some(0x1f),
        '8' | '?' => Some(0x7f),
        _ => None,
    }
}
