/// BLE notification payload decoding
use crate::error::ProcessError;
use crate::models::SensorReading;

// Payload layout constants
const PAYLOAD_LEN: usize = 8; // Four little-endian i16 fields
const TEMPERATURE_SCALE: f64 = 100.0; // 0.01 °C resolution
const ACCELERATION_SCALE: f64 = 1000.0; // 0.001 g resolution

/// Decode a scenario notification payload into a sensor reading
///
/// The payload is a fixed little-endian layout:
/// - Bytes 0-1: Temperature (signed 16-bit, 0.01°C resolution)
/// - Bytes 2-3: Acceleration X (signed 16-bit, 0.001 g resolution)
/// - Bytes 4-5: Acceleration Y (signed 16-bit, 0.001 g resolution)
/// - Bytes 6-7: Acceleration Z (signed 16-bit, 0.001 g resolution)
///
/// Trailing bytes beyond the first 8 are ignored.
///
/// # Arguments
/// * `data` - Raw payload bytes from the notification
///
/// # Returns
/// The decoded reading, or `MalformedPayload` if fewer than 8 bytes were supplied
pub fn decode_payload(data: &[u8]) -> Result<SensorReading, ProcessError> {
    if data.len() < PAYLOAD_LEN {
        return Err(ProcessError::MalformedPayload { len: data.len() });
    }

    let field = |offset: usize| i16::from_le_bytes([data[offset], data[offset + 1]]) as f64;

    Ok(SensorReading {
        temperature: field(0) / TEMPERATURE_SCALE,
        acceleration_x: field(2) / ACCELERATION_SCALE,
        acceleration_y: field(4) / ACCELERATION_SCALE,
        acceleration_z: field(6) / ACCELERATION_SCALE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn decodes_little_endian_fields() {
        // 1000, 150, -56, 0
        let payload = [0xE8, 0x03, 0x96, 0x00, 0xC8, 0xFF, 0x00, 0x00];
        let reading = decode_payload(&payload).unwrap();

        assert!(approx(reading.temperature, 10.0));
        assert!(approx(reading.acceleration_x, 0.15));
        assert!(approx(reading.acceleration_y, -0.056));
        assert!(approx(reading.acceleration_z, 0.0));
        assert!(approx(reading.accelerometer_composite(), 0.094));
    }

    #[test]
    fn decodes_negative_temperature() {
        // -1250 => -12.5 °C
        let payload = [0x1E, 0xFB, 0, 0, 0, 0, 0xE8, 0x03];
        let reading = decode_payload(&payload).unwrap();

        assert!(approx(reading.temperature, -12.5));
        assert!(approx(reading.acceleration_z, 1.0));
    }

    #[test]
    fn ignores_trailing_bytes() {
        let payload = [0xE8, 0x03, 0, 0, 0, 0, 0, 0, 0xAA, 0xBB];
        let reading = decode_payload(&payload).unwrap();
        assert!(approx(reading.temperature, 10.0));
    }

    #[test]
    fn rejects_short_payload() {
        assert_eq!(
            decode_payload(&[0x01, 0x02, 0x03]),
            Err(ProcessError::MalformedPayload { len: 3 })
        );
        assert_eq!(
            decode_payload(&[]),
            Err(ProcessError::MalformedPayload { len: 0 })
        );
    }
}
