//! Raw keyboard input for the teleops binary.

use std::io::{self, Read, Write};

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Keeps the terminal in raw mode; restores it on drop, whatever the exit path.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            eprintln!("failed to restore terminal: {e}");
        }
    }
}

/// Stderr writer that emits `\r\n`, since raw mode turns off output newline translation.
pub struct CrlfStderr;

impl Write for CrlfStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut stderr = io::stderr().lock();
        for chunk in buf.split_inclusive(|b| *b == b'\n') {
            match chunk.strip_suffix(b"\n") {
                Some(line) => {
                    stderr.write_all(line)?;
                    stderr.write_all(b"\r\n")?;
                }
                None => stderr.write_all(chunk)?,
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Starts a reader thread feeding one key code per key press.
///
/// The channel closes on Ctrl-C / Ctrl-D (raw mode) or end of input.
pub fn spawn_key_reader(raw: bool) -> mpsc::Receiver<u8> {
    let (tx, rx) = mpsc::channel(32);
    std::thread::spawn(move || {
        if raw {
            read_raw_keys(&tx);
        } else {
            read_stdin(&tx);
        }
        debug!("key reader stopped");
    });
    rx
}

fn read_raw_keys(tx: &mpsc::Sender<u8>) {
    loop {
        let event = match event::read() {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "keyboard read failed");
                return;
            }
        };
        let Event::Key(key) = event else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        let code = match key.code {
            KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => return,
            KeyCode::Char(c) if c.is_ascii() => c as u8,
            KeyCode::Enter => b'\n',
            _ => continue,
        };
        if tx.blocking_send(code).is_err() {
            return;
        }
    }
}

fn read_stdin(tx: &mpsc::Sender<u8>) {
    for byte in io::stdin().lock().bytes() {
        let Ok(byte) = byte else {
            return;
        };
        if tx.blocking_send(byte).is_err() {
            return;
        }
    }
}
