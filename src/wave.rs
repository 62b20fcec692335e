use std::f32::consts::PI;

use crate::config::{BodyGeometry, WaveConfig};
use crate::geometry::{envelope, phase_offset, StationTable};
use crate::side::{AngleSet, PerSide, Side, STATIONS_PER_SIDE};

/// Deflection of one actuation point:
/// amplitude · envelope · ramp · sin(ω·t − phase + shift)
pub fn station_angle(
    amplitude_deg: f32,
    envelope: f32,
    ramp: f32,
    angular_frequency: f32,
    motion_time: f32,
    phase_offset: f32,
    side_shift: f32,
) -> f32 {
    amplitude_deg * envelope * ramp * f32::sin(angular_frequency * motion_time - phase_offset + side_shift)
}

/// Phase added to a side: the left side is the reference, the right side is
/// shifted by π unless both sides are mirrored.
pub fn side_shift(side: Side, mirror_sides: bool) -> f32 {
    match side {
        Side::Left => 0.0,
        Side::Right if mirror_sides => 0.0,
        Side::Right => PI,
    }
}

/// Stateless traveling-wave evaluator built from the precomputed station table.
#[derive(Debug, Clone)]
pub struct TravelingWave {
    table: StationTable,
    geometry: BodyGeometry,
    wave: WaveConfig,
    angular_frequency: f32,
}

impl TravelingWave {
    pub fn new(geometry: &BodyGeometry, wave: &WaveConfig) -> Self {
        Self {
            table: StationTable::compute(geometry, wave),
            geometry: geometry.clone(),
            wave: wave.clone(),
            angular_frequency: wave.angular_frequency(),
        }
    }

    pub fn table(&self) -> &StationTable {
        &self.table
    }

    pub fn period_secs(&self) -> f32 {
        self.wave.period_secs()
    }

    /// Folds motion time into `[0, period)`. Done in f64: f32 seconds lose sub-cycle
    /// resolution after about a day of running.
    pub fn wrap_time(&self, motion_time: f64) -> f32 {
        motion_time.rem_euclid(f64::from(self.period_secs())) as f32
    }

    /// Angles for one side at `motion_time` seconds after the calibration hold.
    pub fn angles(&self, side: Side, motion_time: f32, ramp: f32) -> [f32; STATIONS_PER_SIDE] {
        let shift = side_shift(side, self.wave.mirror_sides);
        self.table.stations().map(|station| {
            station_angle(
                self.wave.amplitude_deg,
                station.envelope,
                ramp,
                self.angular_frequency,
                motion_time,
                station.phase_offset,
                shift,
            )
        })
    }

    pub fn all_angles(&self, motion_time: f32, ramp: f32) -> AngleSet {
        PerSide::from_fn(|side| self.angles(side, motion_time, ramp))
    }

    /// Evaluates the continuous wave at any point along the span, not just at stations.
    pub fn profile_at(&self, side: Side, position_mm: f32, motion_time: f32, ramp: f32) -> f32 {
        let span = self.geometry.span_mm;
        station_angle(
            self.wave.amplitude_deg,
            envelope(position_mm / span, self.wave.envelope_floor, self.wave.envelope_power),
            ramp,
            self.angular_frequency,
            motion_time,
            phase_offset(position_mm, span, self.wave.wavelength_ratio),
            side_shift(side, self.wave.mirror_sides),
        )
    }

    /// Samples `samples` evenly spaced points from the rear (0) to the front (span).
    pub fn sample_profile(&self, side: Side, motion_time: f32, samples: usize) -> Vec<(f32, f32)> {
        let last = samples.saturating_sub(1).max(1) as f32;
        (0..samples)
            .map(|i| {
                let x = self.geometry.span_mm * i as f32 / last;
                (x, self.profile_at(side, x, motion_time, 1.0))
            })
            .collect()
    }
}

/// Positions of strict local minima in a sampled profile. End points never count.
pub fn trough_positions(profile: &[(f32, f32)]) -> Vec<f32> {
    profile
        .windows(3)
        .filter(|w| w[1].1 < w[0].1 && w[1].1 < w[2].1)
        .map(|w| w[1].0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn wave_with(mirror: bool) -> TravelingWave {
        let mut config = AppConfig::default();
        config.wave.mirror_sides = mirror;
        TravelingWave::new(&config.geometry, &config.wave)
    }

    #[test]
    fn output_is_periodic_in_time() {
        let wave = wave_with(true);
        let period = wave.period_secs();
        for step in 0..40 {
            let t = step as f32 * 0.37;
            let now = wave.angles(Side::Left, t, 1.0);
            let later = wave.angles(Side::Left, t + period, 1.0);
            for (a, b) in now.iter().zip(later.iter()) {
                assert!((a - b).abs() < 1e-2, "t={t}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn wrapped_time_keeps_phase_after_a_week() {
        let wave = wave_with(true);
        let week = 7.0 * 86_400.0;
        let wrapped = wave.wrap_time(week + 1.3);
        assert!((wrapped - 1.3).abs() < 1e-4, "{wrapped}");
        let expected = wave.angles(Side::Left, 1.3, 1.0);
        let angles = wave.angles(Side::Left, wrapped, 1.0);
        for (a, b) in expected.iter().zip(angles.iter()) {
            assert!((a - b).abs() < 1e-2, "{a} vs {b}");
        }
        assert_eq!(wave.wrap_time(-1.0), 3.0);
    }

    #[test]
    fn anti_phase_right_side_is_negated() {
        let wave = wave_with(false);
        for step in 0..25 {
            let t = step as f32 * 0.13;
            let left = wave.angles(Side::Left, t, 1.0);
            let right = wave.angles(Side::Right, t, 1.0);
            for (l, r) in left.iter().zip(right.iter()) {
                assert!((l + r).abs() < 1e-3, "t={t}: {l} vs {r}");
            }
        }
    }

    #[test]
    fn mirrored_sides_match() {
        let wave = wave_with(true);
        let angles = wave.all_angles(1.7, 0.5);
        assert_eq!(angles.left, angles.right);
    }

    #[test]
    fn output_is_linear_in_ramp() {
        let wave = wave_with(true);
        let full = wave.angles(Side::Left, 0.9, 1.0);
        let half = wave.angles(Side::Left, 0.9, 0.5);
        let none = wave.angles(Side::Left, 0.9, 0.0);
        for i in 0..STATIONS_PER_SIDE {
            assert!((full[i] * 0.5 - half[i]).abs() < 1e-4);
            assert_eq!(none[i], 0.0);
        }
    }

    #[test]
    fn amplitude_never_exceeds_envelope() {
        let wave = wave_with(true);
        let stations = *wave.table().stations();
        for step in 0..200 {
            let angles = wave.angles(Side::Left, step as f32 * 0.05, 1.0);
            for (angle, station) in angles.iter().zip(stations.iter()) {
                assert!(angle.abs() <= 30.0 * station.envelope + 1e-3);
            }
        }
    }

    #[test]
    fn crest_travels_rear_to_front() {
        // A crest seen at a rear point must show up later at a point further forward.
        let wave = wave_with(true);
        let omega = 2.0 * PI * 0.25;
        let crest_time = |x: f32| {
            let phase = phase_offset(x, 330.0, 2.0 / 3.0);
            (PI / 2.0 + phase) / omega
        };
        assert!(crest_time(200.0) > crest_time(50.0));
        let at_crest = wave.profile_at(Side::Left, 50.0, crest_time(50.0), 1.0);
        let expected = 30.0 * envelope(50.0 / 330.0, 0.3, 1.5);
        assert!((at_crest - expected).abs() < 1e-3);
    }

    #[test]
    fn profile_matches_stations() {
        let wave = wave_with(false);
        let angles = wave.angles(Side::Right, 2.3, 1.0);
        for (angle, station) in angles.iter().zip(wave.table().stations().iter()) {
            let sampled = wave.profile_at(Side::Right, station.position_mm, 2.3, 1.0);
            assert!((angle - sampled).abs() < 1e-4);
        }
    }

    #[test]
    fn finds_troughs() {
        let profile: Vec<(f32, f32)> = (0..9)
            .map(|i| (i as f32, [0.0, -1.0, 0.0, 1.0, 0.0, -2.0, 0.0, 1.0, -5.0][i]))
            .collect();
        assert_eq!(trough_positions(&profile), vec![1.0, 5.0]);
    }

    #[test]
    fn one_and_a_half_wavelengths_show_a_trough() {
        let wave = wave_with(true);
        let profile = wave.sample_profile(Side::Left, 0.0, 331);
        assert_eq!(profile.len(), 331);
        assert!(!trough_positions(&profile).is_empty());
    }
}
