use serde::{Deserialize, Serialize};

use crate::{domain::Gear, error::ProtocolError};

/// One complete engine reading pushed by the simulator.
///
/// Field names match the simulator's JSON exactly. Gear and clutch are kept
/// as reported, the simulator is not bound by the client's gearbox range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub rpm: f64,
    pub throttle_position: f64,
    pub timestamp: i64,
    pub power: f64,
    pub torque: f64,
    pub speed: f64,
    pub engine_temp: f64,
    pub afr_current: f64,
    pub afr_target: f64,
    pub fuel_injection_ms: f64,
    pub ignition_advance: f64,
    pub gear: i64,
    pub clutch_position: f64,
}

impl TelemetrySnapshot {
    /// Engine at rest, before the first reading arrives.
    pub fn idle() -> Self {
        Self {
            rpm: 0.0,
            throttle_position: 0.0,
            timestamp: 0,
            power: 0.0,
            torque: 0.0,
            speed: 0.0,
            engine_temp: 90.0,
            afr_current: 14.7,
            afr_target: 14.7,
            fuel_injection_ms: 0.0,
            ignition_advance: 0.0,
            gear: 0,
            clutch_position: 1.0,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::MalformedTelemetry)
    }
}

impl Default for TelemetrySnapshot {
    fn default() -> Self {
        Self::idle()
    }
}

/// Rider input sent to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlInput {
    pub throttle_position: f64,
    pub clutch_position: f64,
    pub gear: Gear,
}

impl ControlInput {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "rpm": 4200.5,
            "throttle_position": 35.0,
            "timestamp": 1_700_000_000_000_i64,
            "power": 41.2,
            "torque": 52.0,
            "speed": 63.4,
            "engine_temp": 92.1,
            "afr_current": 13.9,
            "afr_target": 13.2,
            "fuel_injection_ms": 4.1,
            "ignition_advance": 18.0,
            "gear": 3,
            "clutch_position": 0.0
        })
    }

    #[test]
    fn decodes_simulator_payload() {
        let snapshot = TelemetrySnapshot::decode(&sample_json().to_string()).expect("decode");
        assert_eq!(snapshot.rpm, 4200.5);
        assert_eq!(snapshot.gear, 3);
        assert_eq!(snapshot.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn ignores_unknown_fields() {
        let mut value = sample_json();
        value["oil_pressure"] = serde_json::json!(3.2);
        assert!(TelemetrySnapshot::decode(&value.to_string()).is_ok());
    }

    #[test]
    fn rejects_missing_or_mistyped_fields() {
        let mut missing = sample_json();
        missing.as_object_mut().expect("object").remove("rpm");
        assert!(TelemetrySnapshot::decode(&missing.to_string()).is_err());

        let mut mistyped = sample_json();
        mistyped["speed"] = serde_json::json!("fast");
        assert!(TelemetrySnapshot::decode(&mistyped.to_string()).is_err());

        assert!(TelemetrySnapshot::decode("not json").is_err());
    }

    #[test]
    fn control_input_uses_wire_field_names() {
        let input = ControlInput {
            throttle_position: 50.0,
            clutch_position: 1.0,
            gear: Gear::new(2).expect("gear"),
        };
        let value: serde_json::Value =
            serde_json::from_str(&input.encode().expect("encode")).expect("json");
        assert_eq!(
            value,
            serde_json::json!({
                "throttle_position": 50.0,
                "clutch_position": 1.0,
                "gear": 2
            })
        );
    }
}
