//! Composition of motion sinks per servo runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activation::{CommandTypeSink, ServoStartSink};
use crate::config::TeleopsConfig;
use crate::error::TeleopsError;
use crate::sink::{TopicMotionSink, Transport};
use crate::{ActivationTrigger, CommandTypeSwitch, MotionSink};

/// Servo runtime the commands are sent to; decides which activation step is installed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServoRuntime {
    /// Plain topics; nothing to activate.
    #[default]
    Generic,
    /// Servo must be started once through its trigger service.
    Humble,
    /// Servo must be switched to the command type being sent.
    Jazzy,
}

impl FromStr for ServoRuntime {
    type Err = TeleopsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "none" => Ok(Self::Generic),
            "humble" => Ok(Self::Humble),
            "jazzy" => Ok(Self::Jazzy),
            other => Err(TeleopsError::Config(format!(
                "unknown servo runtime '{other}' (expected generic, humble or jazzy)"
            ))),
        }
    }
}

impl fmt::Display for ServoRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generic => "generic",
            Self::Humble => "humble",
            Self::Jazzy => "jazzy",
        };
        f.write_str(name)
    }
}

/// Factory methods for [`MotionSink`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct TeleopsClientFactory;

impl TeleopsClientFactory {
    /// Base sink publishing to the configured topics, without any activation policy.
    pub fn create_client<T: Transport>(
        &self,
        config: &TeleopsConfig,
        joints: Vec<String>,
        transport: T,
    ) -> TopicMotionSink<T> {
        TopicMotionSink::new(
            transport,
            config.frame_name.clone(),
            joints,
            config.twist_topic.clone(),
            config.jog_topic.clone(),
        )
    }

    /// Wraps `base` with the activation step `runtime` needs.
    ///
    /// `servo_started` only matters for [`ServoRuntime::Humble`], where it marks the servo as
    /// started out-of-band.
    pub fn wrap_for_runtime<S, A>(
        &self,
        runtime: ServoRuntime,
        base: S,
        servo: A,
        servo_started: bool,
        timeout: std::time::Duration,
    ) -> Box<dyn MotionSink>
    where
        S: MotionSink + 'static,
        A: ActivationTrigger + CommandTypeSwitch + 'static,
    {
        debug!(%runtime, servo_started, "composing motion sink");
        match runtime {
            ServoRuntime::Generic => Box::new(base),
            ServoRuntime::Humble if servo_started => {
                Box::new(ServoStartSink::pre_activated(base, servo, timeout))
            }
            ServoRuntime::Humble => Box::new(ServoStartSink::new(base, servo, timeout)),
            ServoRuntime::Jazzy => Box::new(CommandTypeSink::new(base, servo, timeout)),
        }
    }

    /// Base sink plus the activation policy selected by `config.runtime`.
    pub fn create_client_for_servo<T, A>(
        &self,
        config: &TeleopsConfig,
        joints: Vec<String>,
        transport: T,
        servo: A,
    ) -> Box<dyn MotionSink>
    where
        T: Transport + 'static,
        A: ActivationTrigger + CommandTypeSwitch + 'static,
    {
        let base = self.create_client(config, joints, transport);
        self.wrap_for_runtime(
            config.runtime,
            base,
            servo,
            config.servo_started,
            config.activation_timeout,
        )
    }
}
