/// Threshold based change detection between consecutive readings
use crate::models::{AlertDecision, AlertKind, SensorReading, UserState};

/// Composite accelerometer change above which the bike counts as moved
pub const MOTION_THRESHOLD: f64 = 0.15;

/// Temperature change (°C) above which the engine counts as started
pub const TEMPERATURE_THRESHOLD: f64 = 5.0;

/// Compare a new reading against the previously stored state
///
/// The first reading for a user never alerts. Motion is checked first and
/// wins outright; temperature is only looked at when motion stayed under its
/// threshold. Both comparisons are strict.
pub fn classify(previous: Option<&UserState>, current: &SensorReading) -> AlertDecision {
    let Some(previous) = previous else {
        return AlertDecision::NoAlert;
    };

    let delta_accel = (previous.accelerometer - current.accelerometer_composite()).abs();
    if delta_accel > MOTION_THRESHOLD {
        return AlertDecision::Alert(AlertKind::MotionDetected);
    }

    let delta_temp = (previous.temperature - current.temperature).abs();
    if delta_temp > TEMPERATURE_THRESHOLD {
        return AlertDecision::Alert(AlertKind::EngineStarted);
    }

    AlertDecision::NoAlert
}
