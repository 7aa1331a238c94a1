//! Construction-time configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TeleopsError, TeleopsResult};
use crate::factory::ServoRuntime;
use crate::{
    DEFAULT_ACTIVATION_TIMEOUT, DEFAULT_BRIDGE_SOCKET, DEFAULT_JOG_TOPIC_NAME,
    DEFAULT_JOINT_STATES_TOPIC_NAME, DEFAULT_TWIST_TOPIC_NAME,
};

/// Teleoperation session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeleopsConfig {
    /// Frame the velocities are expressed in; empty means the servo's default frame.
    pub frame_name: String,

    pub twist_topic: String,

    pub jog_topic: String,

    /// Topic read once to discover the joint ordering
    pub joint_states_topic: String,

    /// Enables digit-key joint jogging
    pub enable_jog: bool,

    /// Explicit joint ordering; when non-empty the joint states topic is not read.
    pub joints: Vec<String>,

    pub runtime: ServoRuntime,

    /// Servo was already started out-of-band
    pub servo_started: bool,

    /// Start the servo before reading any key
    pub start_servo: bool,

    /// Bounded wait for activation calls
    pub activation_timeout: Duration,

    /// Local socket name of the bridge process
    pub bridge_socket: String,
}

impl Default for TeleopsConfig {
    fn default() -> Self {
        Self {
            frame_name: String::new(),
            twist_topic: DEFAULT_TWIST_TOPIC_NAME.to_string(),
            jog_topic: DEFAULT_JOG_TOPIC_NAME.to_string(),
            joint_states_topic: DEFAULT_JOINT_STATES_TOPIC_NAME.to_string(),
            enable_jog: false,
            joints: Vec::new(),
            runtime: ServoRuntime::default(),
            servo_started: false,
            start_servo: false,
            activation_timeout: DEFAULT_ACTIVATION_TIMEOUT,
            bridge_socket: DEFAULT_BRIDGE_SOCKET.to_string(),
        }
    }
}

impl TeleopsConfig {
    pub fn validate(&self) -> TeleopsResult<()> {
        if self.activation_timeout.is_zero() {
            return Err(TeleopsError::Config(
                "activation timeout must be greater than zero".to_string(),
            ));
        }
        for (name, topic) in [
            ("twist topic", &self.twist_topic),
            ("jog topic", &self.jog_topic),
            ("joint states topic", &self.joint_states_topic),
        ] {
            if topic.trim().is_empty() {
                return Err(TeleopsError::Config(format!("{name} must not be empty")));
            }
        }
        if self.bridge_socket.trim().is_empty() {
            return Err(TeleopsError::Config(
                "bridge socket must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
