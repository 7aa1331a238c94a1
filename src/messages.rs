//! Motion message primitives.
//!
//! These mirror the stamped twist / joint jog / joint state messages understood by the
//! servo, in a form the bridge can relay without knowing anything about keyboards.

use std::time::{SystemTime, UNIX_EPOCH};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Linear or angular velocity along the x, y and z axes of the command frame.
///
/// Serializes as the bare `[x, y, z]` array nalgebra produces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vector3D(pub Vector3<f64>);

impl Vector3D {
    /// No motion.
    pub fn zero() -> Self {
        Self(Vector3::zeros())
    }

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self(Vector3::new(x, y, z))
    }
}

impl From<[f64; 3]> for Vector3D {
    fn from(axes: [f64; 3]) -> Self {
        Self(Vector3::from(axes))
    }
}

/// Wall-clock stamp split the way the middleware expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Time {
    pub sec: i64,
    pub nanosec: u32,
}

impl Time {
    pub fn now() -> Self {
        // A clock set before the epoch stamps zero rather than failing the command.
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            sec: since_epoch.as_secs() as i64,
            nanosec: since_epoch.subsec_nanos(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

impl Header {
    /// Header stamped with the current time.
    pub fn now(frame_id: &str) -> Self {
        Self {
            stamp: Time::now(),
            frame_id: frame_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3D,
    pub angular: Vector3D,
}

/// Cartesian velocity command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwistStamped {
    pub header: Header,
    pub twist: Twist,
}

impl TwistStamped {
    /// Linear-only twist in `frame_id`; angular velocity is always zero.
    pub fn linear(frame_id: &str, linear: Vector3D) -> Self {
        Self {
            header: Header::now(frame_id),
            twist: Twist {
                linear,
                angular: Vector3D::zero(),
            },
        }
    }
}

/// Per-joint velocity command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointJog {
    pub header: Header,
    pub joint_names: Vec<String>,
    pub displacements: Vec<f64>,
    pub velocities: Vec<f64>,
    pub duration: f64,
}

impl JointJog {
    pub fn velocities(frame_id: &str, joint_names: &[String], velocities: Vec<f64>) -> Self {
        Self {
            header: Header::now(frame_id),
            joint_names: joint_names.to_vec(),
            displacements: Vec::new(),
            velocities,
            duration: 0.0,
        }
    }
}

/// Joint state sample, used only to discover the joint ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointState {
    pub header: Header,
    pub name: Vec<String>,
    #[serde(default)]
    pub position: Vec<f64>,
    #[serde(default)]
    pub velocity: Vec<f64>,
    #[serde(default)]
    pub effort: Vec<f64>,
}

/// A typed outgoing message payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum MotionMessage {
    TwistStamped(TwistStamped),
    JointJog(JointJog),
}

/// Command types a servo can be switched to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    JointJog,
    Twist,
    Pose,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twist_message_is_tagged_and_has_zero_angular() {
        let msg = MotionMessage::TwistStamped(TwistStamped::linear(
            "base_link",
            Vector3D::new(1.0, 0.0, 0.0),
        ));
        let json = serde_json::to_value(&msg).expect("serialize");

        assert_eq!(json["type"], "twist_stamped");
        assert_eq!(json["payload"]["header"]["frame_id"], "base_link");
        assert_eq!(
            json["payload"]["twist"]["linear"],
            serde_json::json!([1.0, 0.0, 0.0])
        );
        assert_eq!(
            json["payload"]["twist"]["angular"],
            serde_json::json!([0.0, 0.0, 0.0])
        );
    }

    #[test]
    fn joint_state_tolerates_missing_samples() {
        let raw = r#"{"header":{"stamp":{"sec":1,"nanosec":2},"frame_id":""},"name":["j0","j1"]}"#;
        let state: JointState = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(state.name, vec!["j0", "j1"]);
        assert!(state.position.is_empty());
    }
}
