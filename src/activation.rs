//! Lazy servo activation.
//!
//! Some servo runtimes ignore velocity commands until they are explicitly started, others
//! need the accepted command type switched first, and some need nothing at all. The
//! decorators here wrap any [`MotionSink`] and run the required step right before the first
//! command goes out:
//!
//! ```text
//! NotActivated --first move--> Activating --ok--> Activated
//!       ^                           |
//!       |__________ failure ________|
//! ```
//!
//! A failed activation fails that motion call only; the next call tries again.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{ActivationError, TeleopsResult};
use crate::messages::{CommandType, Vector3D};
use crate::{ActivationTrigger, CommandTypeSwitch, MotionSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    NotActivated,
    Activating,
    Activated,
}

/// Activation state machine with a bounded wait.
///
/// Owned by exactly one decorator; never shared.
#[derive(Debug)]
pub struct Activation {
    state: ActivationState,
    timeout: Duration,
}

impl Activation {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: ActivationState::NotActivated,
            timeout,
        }
    }

    /// Starts in [`ActivationState::Activated`], for servos activated out-of-band.
    pub fn activated(timeout: Duration) -> Self {
        Self {
            state: ActivationState::Activated,
            timeout,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    /// Forgets a previous activation so the next [`Activation::ensure`] runs the step again.
    pub fn reset(&mut self) {
        self.state = ActivationState::NotActivated;
    }

    /// Runs `activate` unless already activated, waiting at most the configured timeout.
    ///
    /// A state left in `Activating` by a cancelled call counts as not activated.
    pub async fn ensure<F, Fut>(&mut self, activate: F) -> TeleopsResult<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), ActivationError>>,
    {
        if self.state == ActivationState::Activated {
            return Ok(());
        }

        self.state = ActivationState::Activating;
        debug!(timeout = ?self.timeout, "activating servo");

        let outcome = match tokio::time::timeout(self.timeout, activate()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ActivationError::Timeout(self.timeout)),
        };

        match outcome {
            Ok(()) => {
                self.state = ActivationState::Activated;
                info!("servo activated");
                Ok(())
            }
            Err(e) => {
                self.state = ActivationState::NotActivated;
                warn!(error = %e, "servo activation failed");
                Err(e.into())
            }
        }
    }
}

/// Decorator for servos that must be started once before accepting commands.
pub struct ServoStartSink<S, T> {
    inner: S,
    trigger: T,
    activation: Activation,
}

impl<S: MotionSink, T: ActivationTrigger> ServoStartSink<S, T> {
    pub fn new(inner: S, trigger: T, timeout: Duration) -> Self {
        Self {
            inner,
            trigger,
            activation: Activation::new(timeout),
        }
    }

    /// Wraps a sink whose servo was already started elsewhere; `trigger` is never called.
    pub fn pre_activated(inner: S, trigger: T, timeout: Duration) -> Self {
        Self {
            inner,
            trigger,
            activation: Activation::activated(timeout),
        }
    }

    pub fn state(&self) -> ActivationState {
        self.activation.state()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn ensure_started(&mut self) -> TeleopsResult<()> {
        let trigger = &self.trigger;
        self.activation.ensure(|| trigger.activate()).await
    }
}

#[async_trait]
impl<S: MotionSink, T: ActivationTrigger> MotionSink for ServoStartSink<S, T> {
    async fn move_cartesian(&mut self, velocity: Vector3D) -> TeleopsResult<()> {
        self.ensure_started().await?;
        self.inner.move_cartesian(velocity).await
    }

    async fn move_joints(&mut self, velocities: Vec<f64>) -> TeleopsResult<()> {
        self.ensure_started().await?;
        self.inner.move_joints(velocities).await
    }

    async fn close(&mut self) -> TeleopsResult<()> {
        self.inner.close().await
    }
}

/// Decorator for servos that accept one command type at a time.
///
/// The servo is switched lazily to the type the outgoing command needs. Staying in one
/// mode switches exactly once; changing between Cartesian and joint moves switches again.
pub struct CommandTypeSink<S, W> {
    inner: S,
    switch: W,
    activation: Activation,
    command_type: Option<CommandType>,
}

impl<S: MotionSink, W: CommandTypeSwitch> CommandTypeSink<S, W> {
    pub fn new(inner: S, switch: W, timeout: Duration) -> Self {
        Self {
            inner,
            switch,
            activation: Activation::new(timeout),
            command_type: None,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.activation.state()
    }

    /// Command type the servo last confirmed.
    pub fn command_type(&self) -> Option<CommandType> {
        self.command_type
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn ensure_command_type(&mut self, required: CommandType) -> TeleopsResult<()> {
        if self.command_type != Some(required) {
            self.activation.reset();
        }
        let switch = &self.switch;
        self.activation
            .ensure(|| switch.switch_command_type(required))
            .await?;
        self.command_type = Some(required);
        Ok(())
    }
}

#[async_trait]
impl<S: MotionSink, W: CommandTypeSwitch> MotionSink for CommandTypeSink<S, W> {
    async fn move_cartesian(&mut self, velocity: Vector3D) -> TeleopsResult<()> {
        self.ensure_command_type(CommandType::Twist).await?;
        self.inner.move_cartesian(velocity).await
    }

    async fn move_joints(&mut self, velocities: Vec<f64>) -> TeleopsResult<()> {
        self.ensure_command_type(CommandType::JointJog).await?;
        self.inner.move_joints(velocities).await
    }

    async fn close(&mut self) -> TeleopsResult<()> {
        self.inner.close().await
    }
}
