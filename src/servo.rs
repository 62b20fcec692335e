use anyhow::Result;

use crate::config::{ServoCalibration, SideConfig};
use crate::side::{AngleSet, PerSide, Side, STATIONS_PER_SIDE};

/// Hardware that turns a pulse width into a servo signal and keeps it going.
pub trait ServoDriver: Send {
    fn attach(&mut self, channel: u8) -> Result<()>;
    fn write_pulse(&mut self, channel: u8, pulse_us: u16) -> Result<()>;
}

impl ServoCalibration {
    /// Angle (degrees) plus trim (µs) to a pulse width that always lies in the safe band.
    ///
    /// The angle is first limited to the mechanical range when one is configured. The
    /// band bounds are applied lower then upper, so a misconfigured (inverted) band
    /// yields its upper bound instead of panicking.
    pub fn angle_to_pulse(&self, angle_deg: f32, trim_us: i16) -> u16 {
        let angle = match self.half_range_deg() {
            Some(half) => angle_deg.max(-half).min(half),
            None => angle_deg,
        };
        // f64 holds any finite f32 angle times the scale without overflow
        let offset = f64::from(angle) * f64::from(self.us_per_degree);
        let pulse = (f64::from(self.center_us) + offset + f64::from(trim_us)).round();
        let pulse = pulse
            .max(f64::from(self.safe_min_us()))
            .min(f64::from(self.safe_max_us()));
        pulse as u16
    }

    /// Limits a requested angle to the mechanical range, if any.
    pub fn clamp_angle(&self, angle_deg: f32) -> f32 {
        match self.half_range_deg() {
            Some(half) => angle_deg.max(-half).min(half),
            None => angle_deg,
        }
    }
}

/// All actuators of the rig behind one driver: applies trims and clamping, skips
/// disabled sides.
pub struct ServoBank<'a> {
    driver: Box<dyn ServoDriver + 'a>,
    calibration: ServoCalibration,
    sides: PerSide<SideConfig>,
}

impl<'a> ServoBank<'a> {
    pub fn new(
        driver: Box<dyn ServoDriver + 'a>,
        calibration: ServoCalibration,
        sides: PerSide<SideConfig>,
    ) -> Self {
        Self {
            driver,
            calibration,
            sides,
        }
    }

    pub fn attach_all(&mut self) -> Result<()> {
        for side in Side::ALL {
            if !self.sides[side].enabled {
                log::info!("Side {} disabled, not attaching", side);
                continue;
            }
            for channel in self.sides[side].channels {
                self.driver.attach(channel)?;
            }
        }
        Ok(())
    }

    pub fn pulse_for(&self, side: Side, station: usize, angle_deg: f32) -> u16 {
        self.calibration
            .angle_to_pulse(angle_deg, self.sides[side].trims_us[station])
    }

    /// Writes one side. Every channel is attempted even if one fails; the first error
    /// is returned.
    pub fn write_side(&mut self, side: Side, angles: &[f32; STATIONS_PER_SIDE]) -> Result<()> {
        if !self.sides[side].enabled {
            return Ok(());
        }
        let mut result = Ok(());
        for (station, &angle) in angles.iter().enumerate() {
            let pulse = self.pulse_for(side, station, angle);
            let channel = self.sides[side].channels[station];
            if let Err(e) = self.driver.write_pulse(channel, pulse) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    pub fn write_all(&mut self, angles: &AngleSet) -> Result<()> {
        let left = self.write_side(Side::Left, &angles.left);
        let right = self.write_side(Side::Right, &angles.right);
        left.and(right)
    }

    pub fn write_neutral(&mut self) -> Result<()> {
        self.write_all(&PerSide::splat([0.0; STATIONS_PER_SIDE]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::servo_sim::SimulatedServos;

    fn calibration() -> ServoCalibration {
        AppConfig::default().servo
    }

    #[test]
    fn center_and_scale() {
        let cal = calibration();
        assert_eq!(cal.angle_to_pulse(0.0, 0), 1500);
        assert_eq!(cal.angle_to_pulse(45.0, 0), 2000);
        assert_eq!(cal.angle_to_pulse(-45.0, 0), 1000);
        assert_eq!(cal.angle_to_pulse(0.0, -20), 1480);
    }

    #[test]
    fn output_stays_in_safe_band() {
        let cal = calibration();
        for &angle in &[-10000.0_f32, -181.0, -90.0, -1.0, 0.0, 1.0, 90.0, 181.0, 10000.0] {
            for &trim in &[i16::MIN, -300, 0, 300, i16::MAX] {
                let pulse = cal.angle_to_pulse(angle, trim) as i32;
                assert!(
                    (cal.safe_min_us()..=cal.safe_max_us()).contains(&pulse),
                    "angle={angle} trim={trim} -> {pulse}"
                );
            }
        }
        assert_eq!(cal.angle_to_pulse(10000.0, 0), 2450);
        assert_eq!(cal.angle_to_pulse(-10000.0, 0), 550);
    }

    #[test]
    fn band_applies_without_mechanical_range() {
        let mut cal = calibration();
        cal.mechanical_range_deg = None;
        assert_eq!(cal.angle_to_pulse(10000.0, 0), 2450);
        assert_eq!(cal.clamp_angle(500.0), 500.0);
    }

    #[test]
    fn huge_angles_saturate_toward_their_sign() {
        let mut cal = calibration();
        cal.mechanical_range_deg = None;
        for &trim in &[i16::MIN, 0, i16::MAX] {
            assert_eq!(cal.angle_to_pulse(1.0e9, trim), 2450);
            assert_eq!(cal.angle_to_pulse(f32::MAX, trim), 2450);
            assert_eq!(cal.angle_to_pulse(f32::INFINITY, trim), 2450);
            assert_eq!(cal.angle_to_pulse(-1.0e9, trim), 550);
            assert_eq!(cal.angle_to_pulse(f32::MIN, trim), 550);
            assert_eq!(cal.angle_to_pulse(f32::NEG_INFINITY, trim), 550);
        }
    }

    #[test]
    fn nan_angle_does_not_escape_band() {
        let cal = calibration();
        let pulse = cal.angle_to_pulse(f32::NAN, 0) as i32;
        assert!((cal.safe_min_us()..=cal.safe_max_us()).contains(&pulse));
    }

    #[test]
    fn inverted_band_does_not_panic() {
        let mut cal = calibration();
        cal.min_us = 1400;
        cal.max_us = 1600;
        cal.margin_us = 150;
        assert_eq!(cal.angle_to_pulse(30.0, 0), 1450);
    }

    #[test]
    fn disabled_side_is_never_written() {
        let mut config = AppConfig::default();
        config.sides.right.enabled = false;
        let driver = SimulatedServos::new();
        let log = driver.log();
        let mut bank = ServoBank::new(Box::new(driver), config.servo.clone(), config.sides.clone());
        bank.attach_all().unwrap();
        bank.write_all(&PerSide::splat([10.0; STATIONS_PER_SIDE])).unwrap();
        let writes = log.writes();
        assert_eq!(writes.len(), STATIONS_PER_SIDE);
        assert!(writes.iter().all(|w| config.sides.left.channels.contains(&w.channel)));
        assert_eq!(log.attached(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn trims_apply_per_station() {
        let mut config = AppConfig::default();
        config.sides.left.trims_us = [10, -10, 0, 25];
        let driver = SimulatedServos::new();
        let log = driver.log();
        let mut bank = ServoBank::new(Box::new(driver), config.servo.clone(), config.sides.clone());
        bank.write_neutral().unwrap();
        let left: Vec<u16> = log
            .writes()
            .iter()
            .filter(|w| w.channel < 4)
            .map(|w| w.pulse_us)
            .collect();
        assert_eq!(left, vec![1510, 1490, 1500, 1525]);
    }
}
