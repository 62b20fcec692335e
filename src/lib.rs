//! Open-loop traveling-wave motion generator for a finned servo rig.
//!
//! Four actuation stations per side run a sinusoid whose phase lags with position
//! along the body, so the wave travels rear to front. Angles become servo pulse
//! widths with per-actuator trims, always clamped to a safe band. A tuning program
//! replaces the wave with operator-set targets reached through eased ramps.

pub mod command;
pub mod config;
pub mod context;
pub mod geometry;
pub mod locomotion;
pub mod servo;
#[cfg(target_os = "espidf")]
pub mod servo_ledc;
pub mod servo_sim;
pub mod side;
pub mod timing;
pub mod transport;
pub mod tuning;
pub mod wave;
