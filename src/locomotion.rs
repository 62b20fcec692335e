use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::AppConfig;
use crate::servo::ServoBank;
use crate::side::Side;
use crate::timing::{Drive, LocomotionPhase, SoftStart};
use crate::wave::{trough_positions, TravelingWave};

const PROFILE_SAMPLES: usize = 67;

/// Open-loop swimming program: calibration hold, linear soft start, then the
/// traveling wave at full amplitude for the rest of the run.
pub struct GaitController {
    wave: TravelingWave,
    soft_start: SoftStart,
    next_trough_report: f64, // motion time of the next debug report
}

impl GaitController {
    pub fn new(config: &AppConfig) -> Self {
        let timing = &config.timing;
        Self {
            wave: TravelingWave::new(&config.geometry, &config.wave),
            soft_start: SoftStart::new(
                Duration::from_millis(timing.calibration_hold_ms),
                Duration::from_millis(timing.ramp_in_ms),
            ),
            next_trough_report: 0.0,
        }
    }

    pub fn phase(&self) -> LocomotionPhase {
        self.soft_start.phase()
    }

    pub fn wave(&self) -> &TravelingWave {
        &self.wave
    }

    pub fn cycle(&mut self, now: Instant, bank: &mut ServoBank<'_>) -> Result<()> {
        match self.soft_start.advance(now) {
            Drive::Neutral => bank.write_neutral(),
            Drive::Wave { motion_time, ramp } => {
                let wave_time = self.wave.wrap_time(motion_time);
                let angles = self.wave.all_angles(wave_time, ramp);
                self.report_troughs(motion_time, wave_time);
                bank.write_all(&angles)
            }
        }
    }

    /// Once per wave period, log where the troughs of each side's wave sit along the body.
    fn report_troughs(&mut self, motion_time: f64, wave_time: f32) {
        if motion_time < self.next_trough_report || !log::log_enabled!(log::Level::Debug) {
            return;
        }
        self.next_trough_report = motion_time + f64::from(self.wave.period_secs());
        for side in Side::ALL {
            let profile = self.wave.sample_profile(side, wave_time, PROFILE_SAMPLES);
            let troughs: Vec<String> = trough_positions(&profile)
                .iter()
                .map(|x| format!("{:.0}", x))
                .collect();
            log::debug!("t={:.2} s side {} troughs at [{}] mm", motion_time, side, troughs.join(", "));
        }
    }
}
