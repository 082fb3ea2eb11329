// src/correction.rs
//
// Correction synthesis: fuses the similarity score, smoothed flow, horizon
// tilt and telemetry snapshot into a deviation status and four correction
// recommendations (yaw, roll, pitch, wind). Pure; no state between frames.

use crate::environment::EnvironmentSnapshot;
use crate::motion::MotionSummary;
use serde::Serialize;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Similarity (%) thresholds, strict `>`, checked top-down
const NORMAL_ABOVE: f64 = 30.0;
const MODERATE_ABOVE: f64 = 25.0;
const SIGNIFICANT_ABOVE: f64 = 20.0;

const ROLL_GAIN: f64 = 0.7;
const WIND_GAIN: f64 = 0.3;

const NOMINAL_ALTITUDE: f64 = 100.0;
const NOMINAL_VELOCITY: f64 = 15.0;
const NOMINAL_TEMPERATURE: f64 = 20.0;
const PITCH_LIMIT: f64 = 10.0;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviationStatus {
    Normal,
    Moderate,
    Significant,
    Critical,
}

impl DeviationStatus {
    pub fn classify(similarity: f64) -> Self {
        if similarity > NORMAL_ABOVE {
            DeviationStatus::Normal
        } else if similarity > MODERATE_ABOVE {
            DeviationStatus::Moderate
        } else if similarity > SIGNIFICANT_ABOVE {
            DeviationStatus::Significant
        } else {
            DeviationStatus::Critical
        }
    }
}

/// Eight-point compass, clockwise from north
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompassDirection {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassDirection {
    pub const ALL: [CompassDirection; 8] = [
        CompassDirection::N,
        CompassDirection::NE,
        CompassDirection::E,
        CompassDirection::SE,
        CompassDirection::S,
        CompassDirection::SW,
        CompassDirection::W,
        CompassDirection::NW,
    ];

    /// Nearest compass point to `angle` degrees, any range
    pub fn from_angle(angle: f64) -> Self {
        let wrapped = angle.rem_euclid(360.0);
        let index = ((wrapped + 22.5) / 45.0).floor() as usize % 8;
        Self::ALL[index]
    }

    pub fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    /// Spherical decomposition, angles in degrees
    pub fn from_speed_pitch_yaw(speed: f64, pitch: f64, yaw: f64) -> Self {
        let (p, y) = (pitch.to_radians(), yaw.to_radians());
        Self {
            x: speed * p.cos() * y.cos(),
            y: speed * p.cos() * y.sin(),
            z: speed * p.sin(),
        }
    }

    /// Horizontal wind, no vertical component
    pub fn from_wind(speed: f64, direction: f64) -> Self {
        let d = direction.to_radians();
        Self {
            x: speed * d.cos(),
            y: speed * d.sin(),
            z: 0.0,
        }
    }
}

/// Correction recommendation for one sampled timestamp
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionReport {
    pub timestamp: f64,
    pub similarity: f64,
    pub status: DeviationStatus,
    pub yaw_correction: f64,
    pub yaw_direction: CompassDirection,
    pub roll_correction: f64,
    pub pitch_correction: f64,
    pub wind_correction: f64,

    // Diagnostics echoed into the report
    pub flow_angle: f64,
    pub flow_magnitude: f64,
    pub flow_std_x: f64,
    pub flow_std_y: f64,
    pub horizon_angle: f64,
    pub environment: EnvironmentSnapshot,
    /// Display only
    pub velocity_vector: Vector3,
    /// Display only
    pub wind_vector: Vector3,
}

// ============================================================================
// SYNTHESIS
// ============================================================================

pub fn pitch_correction(altitude: f64, velocity: f64, temperature: f64) -> f64 {
    let base = (altitude - NOMINAL_ALTITUDE) * 0.01 + (velocity - NOMINAL_VELOCITY) * 0.05;
    let temperature_factor = (temperature - NOMINAL_TEMPERATURE) * 0.002;
    (base + temperature_factor).clamp(-PITCH_LIMIT, PITCH_LIMIT)
}

pub fn synthesize(
    similarity: f64,
    motion: &MotionSummary,
    environment: &EnvironmentSnapshot,
    timestamp: f64,
    horizon_angle: f64,
) -> CorrectionReport {
    let env = environment;

    // Without a flow measurement there is no heading to correct
    let yaw_correction = if motion.measured {
        -motion.angle * (1.0 - similarity / 100.0)
    } else {
        0.0
    };

    CorrectionReport {
        timestamp,
        similarity,
        status: DeviationStatus::classify(similarity),
        yaw_correction,
        yaw_direction: CompassDirection::from_angle(motion.angle),
        roll_correction: -horizon_angle * ROLL_GAIN,
        pitch_correction: pitch_correction(env.altitude, env.velocity, env.temperature),
        wind_correction: env.wind_speed * WIND_GAIN * motion.angle.to_radians().sin(),
        flow_angle: motion.angle,
        flow_magnitude: motion.magnitude,
        flow_std_x: motion.std_x,
        flow_std_y: motion.std_y,
        horizon_angle,
        environment: *env,
        velocity_vector: Vector3::from_speed_pitch_yaw(env.velocity, env.pitch, env.yaw),
        wind_vector: Vector3::from_wind(env.wind_speed, env.wind_direction),
    }
}
