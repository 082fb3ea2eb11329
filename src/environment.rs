// src/environment.rs
//
// Simulated telemetry feed. Every field is a fixed sinusoid of elapsed
// time; the constants are shared with previously recorded runs and must
// not drift.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvironmentSnapshot {
    /// m
    pub altitude: f64,
    /// m/s
    pub velocity: f64,
    /// m/s
    pub wind_speed: f64,
    /// degrees
    pub wind_direction: f64,
    /// hPa
    pub pressure: f64,
    /// °C
    pub temperature: f64,
    /// degrees
    pub pitch: f64,
    /// degrees
    pub yaw: f64,
}

impl EnvironmentSnapshot {
    /// Telemetry at `timestamp` seconds since the start of the route
    pub fn at(timestamp: f64) -> Self {
        let t = timestamp;
        Self {
            altitude: 100.0 + 5.0 * (t / 10.0).sin(),
            velocity: 20.0 + 2.0 * (t / 5.0).cos(),
            wind_speed: 8.0 + 3.0 * (t / 7.0).sin(),
            wind_direction: 45.0 + 30.0 * (t / 12.0).sin(),
            pressure: 1013.0 - 10.0 * (t / 8.0).cos(),
            temperature: 25.0 + 10.0 * (t / 9.0).sin(),
            pitch: 5.0 * (t / 11.0).sin(),
            yaw: 10.0 * (t / 13.0).sin(),
        }
    }
}
