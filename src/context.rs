use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::command::{parse_line, CommandError};
use crate::config::{AppConfig, Variant};
use crate::locomotion::GaitController;
use crate::servo::{ServoBank, ServoDriver};
use crate::timing::PeriodGate;
use crate::transport::LineEvent;
use crate::tuning::TuningController;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

pub enum Program {
    Locomotion(GaitController),
    Tuning(TuningController),
}

/// Counts executed cycles and reports the achieved rate once a minute.
struct LoopStats {
    cycles: u64,
    skipped: u64,
    since: Option<Instant>,
}

impl LoopStats {
    fn record(&mut self, now: Instant, skipped: u64) {
        self.cycles += 1;
        self.skipped += skipped;
        let since = *self.since.get_or_insert(now);
        let elapsed = now.saturating_duration_since(since);
        if elapsed >= STATS_INTERVAL {
            log::info!(
                "Control task update per second: {:.1} ({} early wakeups)",
                self.cycles as f64 / elapsed.as_secs_f64(),
                self.skipped
            );
            self.cycles = 0;
            self.skipped = 0;
            self.since = Some(now);
        }
    }
}

/// Everything the control task owns: the actuators, the update gate and the running
/// program. Nothing else holds a reference to it.
pub struct ControlContext<'a> {
    bank: ServoBank<'a>,
    gate: PeriodGate,
    program: Program,
    stats: LoopStats,
    replies: Vec<String>,
}

impl<'a> ControlContext<'a> {
    /// Validates the configuration, attaches every enabled actuator and prepares the
    /// configured program.
    pub fn new(config: &AppConfig, driver: Box<dyn ServoDriver + 'a>) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let mut bank = ServoBank::new(driver, config.servo.clone(), config.sides.clone());
        bank.attach_all().context("failed to attach servos")?;

        let program = match config.variant {
            Variant::Locomotion => {
                let gait = GaitController::new(config);
                gait.wave().table().log_summary();
                Program::Locomotion(gait)
            }
            Variant::Tuning => Program::Tuning(TuningController::new(config)),
        };

        Ok(Self {
            bank,
            gate: PeriodGate::new(Duration::from_millis(config.timing.update_period_ms)),
            program,
            stats: LoopStats {
                cycles: 0,
                skipped: 0,
                since: None,
            },
            replies: Vec::new(),
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn handle_line(&mut self, event: LineEvent, now: Instant) {
        match (&mut self.program, event) {
            (Program::Tuning(tuning), LineEvent::Line(line)) => {
                log::info!("Command: {}", line);
                tuning.submit(parse_line(&line), now);
                if tuning.pending_len() > 0 {
                    log::debug!("{} command(s) waiting for the running ramp", tuning.pending_len());
                }
                self.replies.extend(tuning.take_replies());
            }
            (_, LineEvent::Overflow) => {
                log::warn!("Console line dropped: too long");
                self.replies.push(format!("ERR {}", CommandError::LineTooLong));
            }
            (Program::Locomotion(_), LineEvent::Line(line)) => {
                log::warn!("Ignoring command in locomotion mode: {}", line);
            }
        }
    }

    /// Runs one control cycle if the update period has elapsed. Returns whether it ran.
    /// A failed actuator write is logged and the loop carries on.
    pub fn step(&mut self, now: Instant) -> bool {
        if !self.gate.try_begin(now) {
            return false;
        }

        let result = match &mut self.program {
            Program::Locomotion(gait) => gait.cycle(now, &mut self.bank),
            Program::Tuning(tuning) => {
                let result = tuning.cycle(now, &mut self.bank);
                self.replies.extend(tuning.take_replies());
                result
            }
        };
        if let Err(e) = result {
            log::error!("Failed to cycle: {}", e);
        }

        let skipped = self.gate.take_skipped();
        self.stats.record(now, skipped);
        true
    }

    pub fn until_next(&self, now: Instant) -> Duration {
        self.gate.until_next(now)
    }

    pub fn take_replies(&mut self) -> Vec<String> {
        std::mem::take(&mut self.replies)
    }
}
