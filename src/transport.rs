use std::io::{self, Read, Write};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

/// Longest accepted command line, excluding the terminator.
pub const LINE_CAPACITY: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Line(String),
    Overflow,
}

/// Assembles newline-terminated lines from a byte stream into a fixed buffer.
/// Carriage returns are dropped and blank lines are ignored. A line that does not
/// fit is reported once and then discarded up to its newline.
pub struct LineBuffer<const N: usize> {
    buf: heapless::Vec<u8, N>,
    discarding: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            discarding: false,
        }
    }

    pub fn push(&mut self, byte: u8) -> Option<LineEvent> {
        match byte {
            b'\r' => None,
            b'\n' => {
                if self.discarding {
                    self.discarding = false;
                    return None;
                }
                let line = String::from_utf8_lossy(&self.buf).trim().to_string();
                self.buf.clear();
                if line.is_empty() {
                    None
                } else {
                    Some(LineEvent::Line(line))
                }
            }
            _ if self.discarding => None,
            _ => {
                if self.buf.push(byte).is_err() {
                    self.buf.clear();
                    self.discarding = true;
                    Some(LineEvent::Overflow)
                } else {
                    None
                }
            }
        }
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads `input` until end of stream or until the receiving side hangs up, forwarding
/// every complete line.
pub fn forward_lines<R: Read>(mut input: R, tx: Sender<LineEvent>) {
    let mut line_buffer = LineBuffer::<LINE_CAPACITY>::new();
    let mut chunk = [0u8; 64];
    loop {
        let n = match input.read(&mut chunk) {
            Ok(0) => {
                log::info!("Console input closed");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                match e.kind() {
                    io::ErrorKind::WouldBlock
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted => {}
                    _ => log::info!("forward_lines: read from console failed: {e}"),
                }
                thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        for &byte in &chunk[..n] {
            if let Some(event) = line_buffer.push(byte) {
                if tx.send(event).is_err() {
                    return;
                }
            }
        }
    }
}

/// Starts the console reader on its own thread. The control task only ever sees
/// whole lines through the channel.
pub fn spawn_stdin_reader(tx: Sender<LineEvent>) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("console".into())
        .spawn(move || forward_lines(io::stdin(), tx))
}

/// Writes reply lines to the console.
pub fn write_replies(lines: &[String]) {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in lines {
        if let Err(e) = writeln!(out, "{}", line) {
            log::error!("Failed to write reply: {}", e);
            return;
        }
    }
    let _ = out.flush();
}
