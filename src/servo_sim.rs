use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::servo::ServoDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseWrite {
    pub channel: u8,
    pub pulse_us: u16,
}

#[derive(Default)]
struct Recorded {
    attached: Vec<u8>,
    writes: Vec<PulseWrite>,
}

/// Shared view of everything a [`SimulatedServos`] driver received.
#[derive(Clone, Default)]
pub struct WriteLog {
    inner: Arc<Mutex<Recorded>>,
}

impl WriteLog {
    pub fn attached(&self) -> Vec<u8> {
        self.lock().attached.clone()
    }

    pub fn writes(&self) -> Vec<PulseWrite> {
        self.lock().writes.clone()
    }

    /// Returns and forgets the writes recorded so far.
    pub fn take_writes(&self) -> Vec<PulseWrite> {
        std::mem::take(&mut self.lock().writes)
    }

    /// Most recent pulse written to `channel`, if any.
    pub fn last_pulse(&self, channel: u8) -> Option<u16> {
        self.lock()
            .writes
            .iter()
            .rev()
            .find(|w| w.channel == channel)
            .map(|w| w.pulse_us)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Driver for host runs: records every command and optionally logs it.
pub struct SimulatedServos {
    log: WriteLog,
    trace: bool,
}

impl SimulatedServos {
    pub fn new() -> Self {
        Self {
            log: WriteLog::default(),
            trace: false,
        }
    }

    /// Also emit every write at trace level.
    pub fn with_trace(mut self) -> Self {
        self.trace = true;
        self
    }

    pub fn log(&self) -> WriteLog {
        self.log.clone()
    }
}

impl Default for SimulatedServos {
    fn default() -> Self {
        Self::new()
    }
}

impl ServoDriver for SimulatedServos {
    fn attach(&mut self, channel: u8) -> Result<()> {
        log::info!("Servo channel {} attached", channel);
        self.log.lock().attached.push(channel);
        Ok(())
    }

    fn write_pulse(&mut self, channel: u8, pulse_us: u16) -> Result<()> {
        if self.trace {
            log::trace!("ch{} <- {} us", channel, pulse_us);
        }
        self.log.lock().writes.push(PulseWrite { channel, pulse_us });
        Ok(())
    }
}
