use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::side::{PerSide, Side, STATIONS_PER_SIDE};

/// Which control program runs on top of the shared pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    Locomotion, // traveling wave with calibration hold and soft start
    Tuning,     // hold targets, ramp to new ones on command
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyGeometry {
    pub span_mm: f32,
    pub station_positions_mm: [f32; STATIONS_PER_SIDE], // rear to front
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveConfig {
    pub wavelength_ratio: f32, // wavelength as a multiple of the body span
    pub frequency_hz: f32,
    pub amplitude_deg: f32,
    pub envelope_power: f32,
    pub envelope_floor: f32, // minimum envelope at the rear, [0, 1)
    pub mirror_sides: bool,  // false = right side shifted by pi (turning)
}

impl WaveConfig {
    pub fn angular_frequency(&self) -> f32 {
        2.0 * std::f32::consts::PI * self.frequency_hz
    }

    pub fn period_secs(&self) -> f32 {
        1.0 / self.frequency_hz
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServoCalibration {
    pub center_us: u16,
    pub us_per_degree: f32,
    pub min_us: u16,
    pub max_us: u16,
    pub margin_us: u16,
    #[serde(default)]
    pub mechanical_range_deg: Option<f32>,
}

impl ServoCalibration {
    pub fn safe_min_us(&self) -> i32 {
        self.min_us as i32 + self.margin_us as i32
    }

    pub fn safe_max_us(&self) -> i32 {
        self.max_us as i32 - self.margin_us as i32
    }

    /// Largest angle magnitude accepted before conversion, if a mechanical range is set.
    pub fn half_range_deg(&self) -> Option<f32> {
        self.mechanical_range_deg.map(|range| range / 2.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingConfig {
    pub update_period_ms: u64,
    pub calibration_hold_ms: u64,
    pub ramp_in_ms: u64,
    pub tuning_ramp_secs: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideConfig {
    pub enabled: bool,
    pub channels: [u8; STATIONS_PER_SIDE],
    pub trims_us: [i16; STATIONS_PER_SIDE],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub variant: Variant,
    pub geometry: BodyGeometry,
    pub wave: WaveConfig,
    pub servo: ServoCalibration,
    pub timing: TimingConfig,
    pub sides: PerSide<SideConfig>,
}

/// Longest `RAMP` argument accepted by the tuning console, seconds.
pub const MAX_TUNING_RAMP_SECS: f32 = 10.0;

impl Default for AppConfig {
    fn default() -> Self {
        let span_mm = 330.0;
        Self {
            variant: Variant::Locomotion,
            geometry: BodyGeometry {
                span_mm,
                // stations centred in four equal segments of the span
                station_positions_mm: [41.25, 123.75, 206.25, 288.75],
            },
            wave: WaveConfig {
                wavelength_ratio: 2.0 / 3.0,
                frequency_hz: 0.25,
                amplitude_deg: 30.0,
                envelope_power: 1.5,
                envelope_floor: 0.3,
                mirror_sides: true,
            },
            servo: ServoCalibration {
                center_us: 1500,
                us_per_degree: (2500.0 - 500.0) / 180.0,
                min_us: 500,
                max_us: 2500,
                margin_us: 50,
                mechanical_range_deg: Some(180.0),
            },
            timing: TimingConfig {
                update_period_ms: 20,
                calibration_hold_ms: 3000,
                ramp_in_ms: 2000,
                tuning_ramp_secs: 1.5,
            },
            sides: PerSide {
                left: SideConfig {
                    enabled: true,
                    channels: [0, 1, 2, 3],
                    trims_us: [0; STATIONS_PER_SIDE],
                },
                right: SideConfig {
                    enabled: true,
                    channels: [4, 5, 6, 7],
                    trims_us: [0; STATIONS_PER_SIDE],
                },
            },
        }
    }
}

impl AppConfig {
    pub fn side_enabled(&self, side: Side) -> bool {
        self.sides[side].enabled
    }

    /// Checks every static invariant. Run once at startup, before any actuator is attached.
    pub fn validate(&self) -> Result<()> {
        let geometry = &self.geometry;
        ensure!(
            geometry.span_mm > 0.0,
            "body span must be positive, got {} mm",
            geometry.span_mm
        );
        let mut previous = f32::NEG_INFINITY;
        for (i, &position) in geometry.station_positions_mm.iter().enumerate() {
            ensure!(
                (0.0..=geometry.span_mm).contains(&position),
                "station {} at {} mm is outside the body span [0, {}]",
                i + 1,
                position,
                geometry.span_mm
            );
            ensure!(
                position > previous,
                "station positions must increase rear to front (station {} at {} mm)",
                i + 1,
                position
            );
            previous = position;
        }

        let wave = &self.wave;
        ensure!(wave.wavelength_ratio > 0.0, "wavelength ratio must be positive");
        ensure!(wave.frequency_hz > 0.0, "wave frequency must be positive");
        ensure!(wave.envelope_power > 0.0, "envelope power must be positive");
        ensure!(
            (0.0..1.0).contains(&wave.envelope_floor),
            "envelope floor must lie in [0, 1), got {}",
            wave.envelope_floor
        );
        // envelope = floor + (1 - floor)·x^power, zero only at x = 0 with no floor
        ensure!(
            wave.envelope_floor > 0.0 || geometry.station_positions_mm[0] > 0.0,
            "station 1 at the rear edge needs a positive envelope floor"
        );

        let servo = &self.servo;
        ensure!(
            servo.safe_min_us() <= servo.safe_max_us(),
            "safe pulse band is empty: {}..{} us",
            servo.safe_min_us(),
            servo.safe_max_us()
        );
        ensure!(
            (servo.safe_min_us()..=servo.safe_max_us()).contains(&(servo.center_us as i32)),
            "center pulse {} us lies outside the safe band",
            servo.center_us
        );
        if let Some(range) = servo.mechanical_range_deg {
            ensure!(range > 0.0, "mechanical range must be positive");
        }

        let timing = &self.timing;
        ensure!(timing.update_period_ms > 0, "update period must be positive");
        ensure!(
            (0.0..=MAX_TUNING_RAMP_SECS).contains(&timing.tuning_ramp_secs),
            "tuning ramp must lie in [0, {}] s",
            MAX_TUNING_RAMP_SECS
        );

        ensure!(self.sides.left.enabled, "left side cannot be disabled");
        if self.sides.right.enabled {
            for channel in self.sides.left.channels {
                ensure!(
                    !self.sides.right.channels.contains(&channel),
                    "channel {} bound to both sides",
                    channel
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn inverted_safe_band_is_rejected() {
        let mut config = AppConfig::default();
        config.servo.min_us = 1400;
        config.servo.max_us = 1600;
        config.servo.margin_us = 150;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("safe pulse band"));
    }

    #[test]
    fn stations_must_be_ordered_rear_to_front() {
        let mut config = AppConfig::default();
        config.geometry.station_positions_mm = [10.0, 200.0, 100.0, 300.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn envelope_floor_of_one_is_rejected() {
        let mut config = AppConfig::default();
        config.wave.envelope_floor = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_envelope_at_rear_edge_is_rejected() {
        let mut config = AppConfig::default();
        config.wave.envelope_floor = 0.0;
        config.validate().unwrap();

        config.geometry.station_positions_mm[0] = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("positive envelope floor"));

        config.wave.envelope_floor = 0.1;
        config.validate().unwrap();
    }

    #[test]
    fn config_survives_json() {
        let config = AppConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
