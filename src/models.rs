//! Data types flowing through the alert pipeline

/// Event type reported when a device finished a scenario and sent back a result
pub const SCENARIO_RESULT_EVENT: &str = "scenarioResult";

/// Result code of a scenario that ran successfully on the device
pub const SUCCESS_RESULT_CODE: &str = "success";

/// One decoded BLE notification payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f64,
    pub acceleration_x: f64,
    pub acceleration_y: f64,
    pub acceleration_z: f64,
}

impl SensorReading {
    /// Algebraic sum of the three axes, used as a single motion proxy.
    ///
    /// This is deliberately not the vector magnitude: opposite axes can cancel.
    pub fn accelerometer_composite(&self) -> f64 {
        self.acceleration_x + self.acceleration_y + self.acceleration_z
    }
}

/// Last known values recorded for a user
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserState {
    pub accelerometer: f64,
    pub temperature: f64,
}

impl From<&SensorReading> for UserState {
    fn from(reading: &SensorReading) -> Self {
        UserState {
            accelerometer: reading.accelerometer_composite(),
            temperature: reading.temperature,
        }
    }
}

/// Kinds of alert a reading can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    MotionDetected,
    EngineStarted,
}

impl AlertKind {
    /// Text sent back to the user
    pub fn message(&self) -> &'static str {
        match self {
            AlertKind::MotionDetected => "The bike has moved.",
            AlertKind::EngineStarted => "The bike's engine has been started.",
        }
    }
}

/// Result of comparing a reading against the previous state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    NoAlert,
    Alert(AlertKind),
}

/// Inbound scenario event, already authenticated and parsed upstream
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub event_type: String,
    pub result_code: Option<String>,
    pub user_id: String,
    pub reply_token: String,
    pub payload: Vec<u8>,
}
