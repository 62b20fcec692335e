use std::f32::consts::PI;
use std::time::{Duration, Instant};

use crate::side::{AngleSet, STATIONS_PER_SIDE};

// ===== Update gate =====
// At most one cycle per period. A late cycle runs once and the period restarts from it:
// no catch-up, no compensation for missed cycles.

pub struct PeriodGate {
    period: Duration,
    last: Option<Instant>,
    skipped: u64,
}

impl PeriodGate {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: None,
            skipped: 0,
        }
    }

    /// True if a cycle may run at `now`; the cycle is then recorded as the last one.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.period => {
                self.skipped += 1;
                false
            }
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Time left until the next cycle is admitted.
    pub fn until_next(&self, now: Instant) -> Duration {
        match self.last {
            Some(last) => self.period.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Number of checks that fell inside the period since the last call.
    pub fn take_skipped(&mut self) -> u64 {
        std::mem::take(&mut self.skipped)
    }
}

// ===== Locomotion soft start =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocomotionPhase {
    Init,
    Calibrating,
    RampingIn,
    Steady,
}

/// What the actuators should do on a given cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drive {
    Neutral,
    /// `motion_time` is unbounded seconds since the hold ended; callers fold it into
    /// a wave period before evaluating the sine.
    Wave { motion_time: f64, ramp: f32 },
}

/// Linear ramp multiplier, 0 at motion onset and 1 from `ramp_secs` on.
pub fn ramp_multiplier(motion_time: f32, ramp_secs: f32) -> f32 {
    if ramp_secs <= 0.0 {
        return 1.0;
    }
    (motion_time / ramp_secs).max(0.0).min(1.0)
}

pub struct SoftStart {
    calibration: Duration,
    ramp_in: Duration,
    start: Option<Instant>,
    phase: LocomotionPhase,
}

impl SoftStart {
    pub fn new(calibration: Duration, ramp_in: Duration) -> Self {
        Self {
            calibration,
            ramp_in,
            start: None,
            phase: LocomotionPhase::Init,
        }
    }

    pub fn phase(&self) -> LocomotionPhase {
        self.phase
    }

    /// Advances the phase for a cycle at `now`. The first call records the start time.
    pub fn advance(&mut self, now: Instant) -> Drive {
        let start = *self.start.get_or_insert_with(|| {
            log::info!(
                "Calibration hold for {:.1} s, all actuators at neutral",
                self.calibration.as_secs_f32()
            );
            now
        });
        let elapsed = now.saturating_duration_since(start);

        if elapsed < self.calibration {
            self.enter(LocomotionPhase::Calibrating);
            return Drive::Neutral;
        }

        let motion_time = (elapsed - self.calibration).as_secs_f64();
        let ramp = ramp_multiplier(motion_time as f32, self.ramp_in.as_secs_f32());
        if ramp < 1.0 {
            self.enter(LocomotionPhase::RampingIn);
        } else {
            self.enter(LocomotionPhase::Steady);
        }
        Drive::Wave { motion_time, ramp }
    }

    fn enter(&mut self, phase: LocomotionPhase) {
        if self.phase == phase {
            return;
        }
        match phase {
            LocomotionPhase::RampingIn => log::info!(
                "Calibration done, ramping in over {:.1} s",
                self.ramp_in.as_secs_f32()
            ),
            LocomotionPhase::Steady => log::info!("Wave at full amplitude"),
            _ => {}
        }
        self.phase = phase;
    }
}

// ===== Target ramps =====

/// Cosine ease: 0.5 - 0.5·cos(π·α), symmetric about α = 0.5.
pub fn eased_progress(alpha: f32) -> f32 {
    let alpha = alpha.max(0.0).min(1.0);
    0.5 - 0.5 * f32::cos(PI * alpha)
}

pub fn interpolate(from: f32, to: f32, alpha: f32) -> f32 {
    if alpha >= 1.0 {
        return to;
    }
    from + (to - from) * eased_progress(alpha)
}

/// Point-to-point move of every actuator from one angle set to another.
/// Actuators whose start and end agree are held still.
#[derive(Debug, Clone)]
pub struct TargetRamp {
    from: AngleSet,
    to: AngleSet,
    started: Instant,
    duration: Duration,
}

impl TargetRamp {
    pub fn new(from: AngleSet, to: AngleSet, started: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            started,
            duration,
        }
    }

    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        self.progress(now) >= 1.0
    }

    pub fn sample(&self, now: Instant) -> AngleSet {
        let alpha = self.progress(now);
        self.from.map(|side, from| {
            let to = &self.to[side];
            let mut out = [0.0; STATIONS_PER_SIDE];
            for i in 0..STATIONS_PER_SIDE {
                out[i] = interpolate(from[i], to[i], alpha);
            }
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::side::PerSide;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn gate_skips_inside_period() {
        let t0 = Instant::now();
        let mut gate = PeriodGate::new(ms(20));
        assert!(gate.try_begin(t0));
        assert!(!gate.try_begin(t0 + ms(5)));
        assert!(!gate.try_begin(t0 + ms(19)));
        assert!(gate.try_begin(t0 + ms(20)));
        assert_eq!(gate.take_skipped(), 2);
        assert_eq!(gate.take_skipped(), 0);
    }

    #[test]
    fn gate_does_not_catch_up() {
        let t0 = Instant::now();
        let mut gate = PeriodGate::new(ms(20));
        assert!(gate.try_begin(t0));
        // a long stall admits one cycle, then the period restarts from it
        assert!(gate.try_begin(t0 + ms(100)));
        assert!(!gate.try_begin(t0 + ms(110)));
        assert_eq!(gate.until_next(t0 + ms(110)), ms(10));
        assert!(gate.try_begin(t0 + ms(120)));
    }

    #[test]
    fn ramp_multiplier_is_linear() {
        assert_eq!(ramp_multiplier(0.0, 2.0), 0.0);
        assert!((ramp_multiplier(0.5, 2.0) - 0.25).abs() < 1e-6);
        assert!((ramp_multiplier(1.0, 2.0) - 0.5).abs() < 1e-6);
        assert_eq!(ramp_multiplier(2.0, 2.0), 1.0);
        assert_eq!(ramp_multiplier(50.0, 2.0), 1.0);
        assert_eq!(ramp_multiplier(0.0, 0.0), 1.0);
    }

    #[test]
    fn soft_start_walks_through_phases() {
        let t0 = Instant::now();
        let mut soft = SoftStart::new(ms(3000), ms(2000));
        assert_eq!(soft.phase(), LocomotionPhase::Init);

        assert_eq!(soft.advance(t0), Drive::Neutral);
        assert_eq!(soft.phase(), LocomotionPhase::Calibrating);
        assert_eq!(soft.advance(t0 + ms(2999)), Drive::Neutral);

        match soft.advance(t0 + ms(3000)) {
            Drive::Wave { motion_time, ramp } => {
                assert_eq!(motion_time, 0.0);
                assert_eq!(ramp, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(soft.phase(), LocomotionPhase::RampingIn);

        match soft.advance(t0 + ms(4000)) {
            Drive::Wave { ramp, .. } => assert!((ramp - 0.5).abs() < 1e-4),
            other => panic!("unexpected {other:?}"),
        }

        match soft.advance(t0 + ms(5000)) {
            Drive::Wave { motion_time, ramp } => {
                assert!((motion_time - 2.0).abs() < 1e-4);
                assert_eq!(ramp, 1.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(soft.phase(), LocomotionPhase::Steady);
    }

    #[test]
    fn eased_progress_is_symmetric() {
        assert_eq!(eased_progress(0.0), 0.0);
        assert!((eased_progress(1.0) - 1.0).abs() < 1e-6);
        assert!((eased_progress(0.5) - 0.5).abs() < 1e-6);
        for step in 0..=50 {
            let a = step as f32 / 100.0;
            let sum = eased_progress(a) + eased_progress(1.0 - a);
            assert!((sum - 1.0).abs() < 1e-5, "alpha={a}");
        }
    }

    #[test]
    fn interpolate_hits_endpoints() {
        assert_eq!(interpolate(-12.5, 40.0, 0.0), -12.5);
        assert_eq!(interpolate(-12.5, 40.0, 1.0), 40.0);
        assert_eq!(interpolate(0.1, 0.3, 1.0), 0.3);
    }

    #[test]
    fn target_ramp_follows_duration() {
        let t0 = Instant::now();
        let from = PerSide::splat([0.0; STATIONS_PER_SIDE]);
        let mut to = from;
        to.left[1] = 60.0;
        let ramp = TargetRamp::new(from, to, t0, ms(3500));

        assert_eq!(ramp.sample(t0).left[1], 0.0);
        assert!(!ramp.is_complete(t0 + ms(3499)));
        let mid = ramp.sample(t0 + ms(1750));
        assert!((mid.left[1] - 30.0).abs() < 1e-3);
        assert_eq!(mid.left[0], 0.0);
        assert!(ramp.is_complete(t0 + ms(3500)));
        assert_eq!(ramp.sample(t0 + ms(3500)), to);
    }

    #[test]
    fn zero_duration_ramp_is_instant() {
        let t0 = Instant::now();
        let from = PerSide::splat([0.0; STATIONS_PER_SIDE]);
        let to = PerSide::splat([15.0; STATIONS_PER_SIDE]);
        let ramp = TargetRamp::new(from, to, t0, Duration::ZERO);
        assert!(ramp.is_complete(t0));
        assert_eq!(ramp.sample(t0), to);
    }
}
