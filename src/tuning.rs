use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::command::{help_lines, ActuatorId, Command, CommandError};
use crate::config::{AppConfig, ServoCalibration, MAX_TUNING_RAMP_SECS};
use crate::servo::ServoBank;
use crate::side::{AngleSet, PerSide, Side, STATIONS_PER_SIDE};
use crate::timing::TargetRamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningState {
    Init,
    Holding,
    Ramping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RampScope {
    All,
    Single(ActuatorId),
}

struct ActiveRamp {
    ramp: TargetRamp,
    scope: RampScope,
}

/// Interactive calibration program: holds every actuator at a target angle and moves
/// to new targets with eased ramps on command.
///
/// Commands that change state are applied one at a time. While a ramp runs they wait
/// in arrival order and are applied once it completes; `GET`, `HELP` and rejections are
/// answered straight away.
pub struct TuningController {
    calibration: ServoCalibration,
    side_enabled: PerSide<bool>,
    targets: AngleSet,
    ramp_secs: f32,
    active: Option<ActiveRamp>,
    pending: VecDeque<Command>,
    replies: Vec<String>,
    initialized: bool,
}

impl TuningController {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            calibration: config.servo.clone(),
            side_enabled: PerSide::from_fn(|side| config.side_enabled(side)),
            targets: PerSide::splat([0.0; STATIONS_PER_SIDE]),
            ramp_secs: config.timing.tuning_ramp_secs,
            active: None,
            pending: VecDeque::new(),
            replies: Vec::new(),
            initialized: false,
        }
    }

    pub fn state(&self) -> TuningState {
        if self.active.is_some() {
            TuningState::Ramping
        } else if !self.initialized {
            TuningState::Init
        } else {
            TuningState::Holding
        }
    }

    pub fn targets(&self) -> &AngleSet {
        &self.targets
    }

    pub fn ramp_secs(&self) -> f32 {
        self.ramp_secs
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Reply lines produced since the last call.
    pub fn take_replies(&mut self) -> Vec<String> {
        std::mem::take(&mut self.replies)
    }

    pub fn submit(&mut self, command: Command, now: Instant) {
        match command {
            Command::Invalid(e) => self.reject(e),
            Command::Get => {
                let status = self.status_lines();
                self.replies.extend(status);
            }
            Command::Help => self.replies.extend(help_lines()),
            Command::SetSingle(id, _) if !self.side_enabled[id.side] => {
                self.reject(CommandError::SideDisabled(id.side))
            }
            Command::SetRamp(secs) if !(0.0..=MAX_TUNING_RAMP_SECS).contains(&secs) => {
                self.reject(CommandError::RampOutOfRange(secs))
            }
            command if command.is_mutating() && self.active.is_some() => {
                log::debug!("Ramp in progress, queued {:?}", command);
                self.pending.push_back(command);
            }
            command => self.apply(command, now),
        }
    }

    /// One control cycle: write the current angles, finish the ramp if it is done and
    /// start whatever was queued behind it.
    pub fn cycle(&mut self, now: Instant, bank: &mut ServoBank<'_>) -> Result<()> {
        if !self.initialized {
            log::info!("Tuning console ready, holding targets");
            self.initialized = true;
        }

        let angles = match &self.active {
            Some(active) => active.ramp.sample(now),
            None => self.targets,
        };
        let written = bank.write_all(&angles);

        let finished = self
            .active
            .as_ref()
            .map_or(false, |active| active.ramp.is_complete(now));
        if finished {
            if let Some(active) = self.active.take() {
                match active.scope {
                    RampScope::All => log::info!("Ramp of all actuators complete"),
                    RampScope::Single(id) => log::info!("Ramp of {} complete", id),
                }
            }
            self.replies.push("OK".to_string());
            let status = self.status_lines();
            self.replies.extend(status);

            while self.active.is_none() {
                match self.pending.pop_front() {
                    Some(command) => self.apply(command, now),
                    None => break,
                }
            }
        }

        written
    }

    fn apply(&mut self, command: Command, now: Instant) {
        match command {
            Command::SetAll(degrees) => {
                let degrees = self.calibration.clamp_angle(degrees);
                let mut targets = self.targets;
                for side in Side::ALL {
                    if self.side_enabled[side] {
                        targets[side] = [degrees; STATIONS_PER_SIDE];
                    }
                }
                log::info!("SET ALL {:.2}", degrees);
                self.start_ramp(targets, RampScope::All, now);
            }
            Command::SetSingle(id, degrees) => {
                let degrees = self.calibration.clamp_angle(degrees);
                let mut targets = self.targets;
                targets[id.side][id.station] = degrees;
                log::info!("SET {} {:.2}", id, degrees);
                self.start_ramp(targets, RampScope::Single(id), now);
            }
            Command::SetRamp(secs) => {
                self.ramp_secs = secs;
                log::info!("Ramp duration set to {:.2} s", secs);
                self.replies.push("OK".to_string());
                self.replies.push(format!("RAMP {:.2}", secs));
            }
            other => self.submit(other, now),
        }
    }

    fn start_ramp(&mut self, targets: AngleSet, scope: RampScope, now: Instant) {
        let duration = Duration::from_secs_f32(self.ramp_secs);
        let ramp = TargetRamp::new(self.targets, targets, now, duration);
        self.targets = targets;
        self.active = Some(ActiveRamp { ramp, scope });
    }

    fn reject(&mut self, error: CommandError) {
        log::warn!("Command rejected: {}", error);
        self.replies.push(format!("ERR {}", error));
    }

    pub fn status_lines(&self) -> Vec<String> {
        let mut lines = vec![format!("RAMP {:.2}", self.ramp_secs)];
        for side in Side::ALL {
            if self.side_enabled[side] {
                let angles: Vec<String> =
                    self.targets[side].iter().map(|a| format!("{:.2}", a)).collect();
                lines.push(format!("{}: {}", side.letter(), angles.join(", ")));
            } else {
                lines.push(format!("{}: disabled", side.letter()));
            }
        }
        let cal = &self.calibration;
        let range = match cal.mechanical_range_deg {
            Some(range) => format!("{:.2}", range),
            None => "none".to_string(),
        };
        lines.push(format!(
            "CAL center={} scale={:.2} safe={}..{} range={}",
            cal.center_us,
            cal.us_per_degree,
            cal.safe_min_us(),
            cal.safe_max_us(),
            range
        ));
        lines
    }
}
