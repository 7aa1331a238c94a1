//! Keyboard teleoperation of robotic arms.
//!
//! This crate defines:
//! - [`Dispatcher`]: turns raw key codes into Cartesian or per-joint velocity commands.
//! - [`MotionSink`]: the contract every velocity command consumer implements.
//! - [`ServoStartSink`] / [`CommandTypeSink`]: decorators that activate a motion servo lazily,
//!   before the first command reaches it.
//! - [`TeleopsClientFactory`]: picks the decorator matching the servo runtime.
//!
//! The concrete transport is a local-socket bridge (see [`bridge`]); anything implementing
//! [`Transport`] can stand in for it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod activation;
pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod factory;
pub mod keymap;
pub mod messages;
pub mod sink;

pub use activation::{Activation, ActivationState, CommandTypeSink, ServoStartSink};
pub use config::TeleopsConfig;
pub use dispatcher::{Dispatcher, KeyOutcome};
pub use error::{ActivationError, TeleopsError, TeleopsResult};
pub use factory::{ServoRuntime, TeleopsClientFactory};
pub use keymap::{AxisKeyMap, JointKeyMap};
pub use messages::{CommandType, MotionMessage, Vector3D};
pub use sink::{TopicMotionSink, Transport};

/// Default twist topic of the servo node.
///
/// Generally the servo subscribes to this topic and processes any incoming messages.
pub const DEFAULT_TWIST_TOPIC_NAME: &str = "/servo_node/delta_twist_cmds";

/// Default joint jog topic of the servo node.
pub const DEFAULT_JOG_TOPIC_NAME: &str = "/servo_node/delta_joint_cmds";

/// Topic joint state broadcasters publish to; used to discover the joint ordering.
pub const DEFAULT_JOINT_STATES_TOPIC_NAME: &str = "/joint_states";

/// Trigger service that starts servo processing (older servo runtimes).
pub const START_SERVO_SERVICE: &str = "/servo_node/start_servo";

/// Service that selects which command type the servo accepts (newer servo runtimes).
pub const SWITCH_COMMAND_TYPE_SERVICE: &str = "/servo_node/switch_command_type";

/// How long an activation call may block the key loop.
pub const DEFAULT_ACTIVATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default bridge socket name.
///
/// On Unix we use a filesystem-backed socket in `/tmp` so the bridge process can be
/// discovered without configuration.
#[cfg(unix)]
pub const DEFAULT_BRIDGE_SOCKET: &str = "/tmp/teleops_bridge.sock";

/// Default bridge socket name (non-Unix platforms).
#[cfg(not(unix))]
pub const DEFAULT_BRIDGE_SOCKET: &str = "teleops_bridge";

/// Consumer of velocity commands.
///
/// Both motion calls are fire-and-forget: no acknowledgement comes back, but each call
/// delivers exactly one stamped message in the configured frame.
#[async_trait]
pub trait MotionSink: Send {
    /// Move in Cartesian space with the given linear velocity.
    async fn move_cartesian(&mut self, velocity: Vector3D) -> TeleopsResult<()>;

    /// Move joints; one velocity per configured joint, in joint-ordering order.
    ///
    /// For example `[0, -1, 0, 0, 0, 0]` moves only the second joint of a 6 DOF arm
    /// backwards.
    async fn move_joints(&mut self, velocities: Vec<f64>) -> TeleopsResult<()>;

    /// Releases transport resources. Further motion calls fail.
    async fn close(&mut self) -> TeleopsResult<()>;
}

#[async_trait]
impl<S: MotionSink + ?Sized> MotionSink for Box<S> {
    async fn move_cartesian(&mut self, velocity: Vector3D) -> TeleopsResult<()> {
        (**self).move_cartesian(velocity).await
    }

    async fn move_joints(&mut self, velocities: Vec<f64>) -> TeleopsResult<()> {
        (**self).move_joints(velocities).await
    }

    async fn close(&mut self) -> TeleopsResult<()> {
        (**self).close().await
    }
}

/// One-shot servo enable step.
///
/// The contract is "make the servo active"; the remote call itself is not assumed to be
/// idempotent, so callers only repeat it after a failure.
#[async_trait]
pub trait ActivationTrigger: Send + Sync {
    async fn activate(&self) -> Result<(), ActivationError>;
}

#[async_trait]
impl<T: ActivationTrigger + ?Sized> ActivationTrigger for Arc<T> {
    async fn activate(&self) -> Result<(), ActivationError> {
        (**self).activate().await
    }
}

/// Selects the command type a servo accepts.
#[async_trait]
pub trait CommandTypeSwitch: Send + Sync {
    async fn switch_command_type(&self, command_type: CommandType) -> Result<(), ActivationError>;
}

#[async_trait]
impl<T: CommandTypeSwitch + ?Sized> CommandTypeSwitch for Arc<T> {
    async fn switch_command_type(&self, command_type: CommandType) -> Result<(), ActivationError> {
        (**self).switch_command_type(command_type).await
    }
}
