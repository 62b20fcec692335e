use std::f32::consts::PI;

use serde::Serialize;

use crate::config::{BodyGeometry, WaveConfig};
use crate::side::STATIONS_PER_SIDE;

/// Per-station values derived once from geometry and wave shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Station {
    pub position_mm: f32,
    pub normalized: f32,   // position / span, [0, 1]
    pub phase_offset: f32, // radians; subtracted by the evaluator so the wave runs rear to front
    pub envelope: f32,     // amplitude multiplier, [floor, 1]
}

/// Spatial phase lag of a point on the body: 2π · x / λ with λ = ratio · span.
pub fn phase_offset(position_mm: f32, span_mm: f32, wavelength_ratio: f32) -> f32 {
    2.0 * PI * position_mm / (wavelength_ratio * span_mm)
}

/// Amplitude envelope: floor + (1 - floor) · x^power, concentrating motion at the front.
pub fn envelope(normalized: f32, floor: f32, power: f32) -> f32 {
    floor + (1.0 - floor) * normalized.clamp(0.0, 1.0).powf(power)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationTable {
    stations: [Station; STATIONS_PER_SIDE],
}

impl StationTable {
    /// Expects a validated configuration. Calling it again with the same inputs yields
    /// the same table.
    pub fn compute(geometry: &BodyGeometry, wave: &WaveConfig) -> Self {
        let stations = geometry.station_positions_mm.map(|position_mm| {
            let normalized = position_mm / geometry.span_mm;
            Station {
                position_mm,
                normalized,
                phase_offset: phase_offset(position_mm, geometry.span_mm, wave.wavelength_ratio),
                envelope: envelope(normalized, wave.envelope_floor, wave.envelope_power),
            }
        });
        Self { stations }
    }

    pub fn stations(&self) -> &[Station; STATIONS_PER_SIDE] {
        &self.stations
    }

    pub fn log_summary(&self) {
        for (i, station) in self.stations.iter().enumerate() {
            log::info!(
                "Station {}: x={:.1} mm, phase={:.3} rad, envelope={:.3}",
                i + 1,
                station.position_mm,
                station.phase_offset,
                station.envelope
            );
        }
    }
}
