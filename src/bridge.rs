//! Local-socket client for the middleware bridge.
//!
//! The bridge is a separate process relaying between this crate and the robot middleware.
//! Frames are newline-delimited JSON:
//!
//! ```text
//! -> {"op":"publish","topic":"/servo_node/delta_twist_cmds","message":{"type":"twist_stamped","payload":{..}}}
//! -> {"op":"call","service":"/servo_node/start_servo","request":{"kind":"trigger"}}
//! <- {"success":true,"message":""}
//! -> {"op":"subscribe","topic":"/joint_states"}
//! <- {"event":"joint_state","header":{..},"name":["j0","j1"]}
//! ```
//!
//! Publishing shares one persistent connection. Service calls and subscriptions open their
//! own, so an abandoned call never blocks later traffic.

use std::io::{BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use interprocess::local_socket::LocalSocketStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ActivationError, TeleopsError, TeleopsResult};
use crate::messages::{CommandType, JointState, MotionMessage};
use crate::sink::Transport;
use crate::{
    ActivationTrigger, CommandTypeSwitch, START_SERVO_SERVICE, SWITCH_COMMAND_TYPE_SERVICE,
};

/// Frame sent to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BridgeRequest {
    Publish {
        topic: String,
        message: MotionMessage,
    },
    Call {
        service: String,
        request: ServiceRequest,
    },
    Subscribe {
        topic: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceRequest {
    Trigger,
    SwitchCommandType { command_type: CommandType },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Frame pushed by the bridge on a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BridgeEvent {
    JointState(JointState),
}

fn write_frame<W: Write, T: Serialize>(writer: &mut W, frame: &T) -> TeleopsResult<()> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}

fn read_frame<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> TeleopsResult<Option<T>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}

async fn blocking<T, F>(f: F) -> TeleopsResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> TeleopsResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TeleopsError::Io(std::io::Error::other(e)))?
}

/// Opens a dedicated connection, sends `request` and reads one answer frame.
async fn exchange<T>(socket: &str, request: BridgeRequest) -> TeleopsResult<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let socket = socket.to_string();
    blocking(move || {
        let stream = LocalSocketStream::connect(socket.as_str())?;
        let mut reader = BufReader::new(stream);
        write_frame(reader.get_mut(), &request)?;
        read_frame(&mut reader)?.ok_or_else(|| {
            TeleopsError::Protocol("bridge closed the connection before answering".to_string())
        })
    })
    .await
}

/// [`Transport`] publishing over a persistent bridge connection.
pub struct IpcTransport {
    socket: String,
    stream: Arc<Mutex<Option<LocalSocketStream>>>,
}

impl IpcTransport {
    pub fn connect(socket: &str) -> TeleopsResult<Self> {
        let stream = LocalSocketStream::connect(socket)?;
        info!(socket, "connected to bridge");
        Ok(Self {
            socket: socket.to_string(),
            stream: Arc::new(Mutex::new(Some(stream))),
        })
    }
}

impl std::fmt::Debug for IpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let connected = self.stream.lock().map(|s| s.is_some()).unwrap_or(false);
        f.debug_struct("IpcTransport")
            .field("socket", &self.socket)
            .field("connected", &connected)
            .finish()
    }
}

impl Drop for IpcTransport {
    fn drop(&mut self) {
        if let Ok(mut stream) = self.stream.lock() {
            if stream.take().is_some() {
                debug!(socket = %self.socket, "bridge connection released");
            }
        }
    }
}

#[async_trait]
impl Transport for IpcTransport {
    async fn publish(&self, topic: &str, message: MotionMessage) -> TeleopsResult<()> {
        let frame = BridgeRequest::Publish {
            topic: topic.to_string(),
            message,
        };
        let stream = Arc::clone(&self.stream);
        blocking(move || {
            let mut guard = stream.lock().map_err(|_| {
                TeleopsError::Io(std::io::Error::other("bridge connection lock poisoned"))
            })?;
            let stream = guard.as_mut().ok_or_else(|| {
                TeleopsError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "bridge connection closed",
                ))
            })?;
            write_frame(stream, &frame)
        })
        .await
    }

    async fn close(&self) -> TeleopsResult<()> {
        let released = self
            .stream
            .lock()
            .map(|mut s| s.take().is_some())
            .unwrap_or(false);
        if released {
            info!(socket = %self.socket, "bridge connection closed");
        }
        Ok(())
    }
}

/// Client for the servo node services, reached through the bridge.
#[derive(Debug, Clone)]
pub struct ServoClient {
    socket: String,
}

impl ServoClient {
    pub fn new(socket: impl Into<String>) -> Self {
        Self {
            socket: socket.into(),
        }
    }

    pub async fn call(
        &self,
        service: &str,
        request: ServiceRequest,
    ) -> TeleopsResult<ServiceResponse> {
        let frame = BridgeRequest::Call {
            service: service.to_string(),
            request,
        };
        let response: ServiceResponse = exchange(&self.socket, frame).await?;
        debug!(service, ?response, "servo node response");
        Ok(response)
    }
}

fn check_response(
    service: &str,
    response: TeleopsResult<ServiceResponse>,
) -> Result<(), ActivationError> {
    match response {
        Ok(response) if response.success => Ok(()),
        Ok(response) => Err(ActivationError::Rejected(format!(
            "{service}: {}",
            response.message
        ))),
        Err(e) => Err(ActivationError::Unavailable(format!("{service}: {e}"))),
    }
}

#[async_trait]
impl ActivationTrigger for ServoClient {
    async fn activate(&self) -> Result<(), ActivationError> {
        info!("starting servo node");
        let response = self.call(START_SERVO_SERVICE, ServiceRequest::Trigger).await;
        check_response(START_SERVO_SERVICE, response)
    }
}

#[async_trait]
impl CommandTypeSwitch for ServoClient {
    async fn switch_command_type(&self, command_type: CommandType) -> Result<(), ActivationError> {
        info!(?command_type, "switching servo command type");
        let response = self
            .call(
                SWITCH_COMMAND_TYPE_SERVICE,
                ServiceRequest::SwitchCommandType { command_type },
            )
            .await;
        check_response(SWITCH_COMMAND_TYPE_SERVICE, response)
    }
}

/// Joint names of the first joint state published to `topic`.
///
/// Waits until a message arrives; the bridge closing the subscription first is an error.
pub async fn read_joints(socket: &str, topic: &str) -> TeleopsResult<Vec<String>> {
    info!(
        topic,
        "waiting for joints to be published (use --joints to list them explicitly)"
    );
    let request = BridgeRequest::Subscribe {
        topic: topic.to_string(),
    };
    let event: BridgeEvent = exchange(socket, request).await?;
    let BridgeEvent::JointState(state) = event;
    debug!(joints = ?state.name, "joint ordering received");
    Ok(state.name)
}
