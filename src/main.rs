//! teleops binary entry point.
//!
//! Usage: teleops [--enable-jog] [--runtime humble] [--frame base_link] ...
//!
//! Reads single key presses and publishes velocity commands through the bridge process.

mod terminal;

use std::time::Duration;

use clap::Parser;
use teleops::bridge::{read_joints, IpcTransport, ServoClient};
use teleops::{
    Activation, ActivationTrigger, Dispatcher, ServoRuntime, TeleopsClientFactory, TeleopsConfig,
    TeleopsResult,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::terminal::{spawn_key_reader, CrlfStderr, RawModeGuard};

/// Teleoperate a robotic arm from the keyboard.
#[derive(Parser, Debug)]
#[command(name = "teleops", version)]
#[command(about = "Send Cartesian and joint jog velocity commands to a motion servo")]
struct Args {
    /// Frame the movements are performed in (servo default when omitted)
    #[arg(long, env = "TELEOPS_FRAME")]
    frame: Option<String>,

    /// Topic for Cartesian (twist) commands
    #[arg(long, env = "TELEOPS_TWIST_TOPIC", default_value = teleops::DEFAULT_TWIST_TOPIC_NAME)]
    twist_topic: String,

    /// Topic for joint jog commands
    #[arg(long, env = "TELEOPS_JOG_TOPIC", default_value = teleops::DEFAULT_JOG_TOPIC_NAME)]
    jog_topic: String,

    /// Topic read once to discover the joint names
    #[arg(
        long,
        env = "TELEOPS_JOINT_STATES_TOPIC",
        default_value = teleops::DEFAULT_JOINT_STATES_TOPIC_NAME
    )]
    joint_states_topic: String,

    /// Enable joint jogging with numeric keys
    #[arg(long)]
    enable_jog: bool,

    /// Joint names in jog order (comma separated); skips reading the joint states topic
    #[arg(long, value_delimiter = ',')]
    joints: Vec<String>,

    /// Servo runtime: generic, humble or jazzy
    #[arg(long, env = "TELEOPS_RUNTIME", default_value = "generic")]
    runtime: ServoRuntime,

    /// The servo was already started (humble)
    #[arg(long)]
    servo_started: bool,

    /// Start the servo before accepting keys
    #[arg(long)]
    start_servo: bool,

    /// How long to wait for servo activation, in seconds
    #[arg(long, env = "TELEOPS_ACTIVATION_TIMEOUT_SECS", default_value_t = 60)]
    activation_timeout_secs: u64,

    /// Local socket of the bridge process
    #[arg(long, env = "TELEOPS_BRIDGE_SOCKET", default_value = teleops::DEFAULT_BRIDGE_SOCKET)]
    bridge_socket: String,

    /// Print debug logs
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn into_config(self) -> TeleopsResult<TeleopsConfig> {
        let config = TeleopsConfig {
            frame_name: self.frame.unwrap_or_default(),
            twist_topic: self.twist_topic,
            jog_topic: self.jog_topic,
            joint_states_topic: self.joint_states_topic,
            enable_jog: self.enable_jog,
            joints: self.joints,
            runtime: self.runtime,
            servo_started: self.servo_started,
            start_servo: self.start_servo,
            activation_timeout: Duration::from_secs(self.activation_timeout_secs),
            bridge_socket: self.bridge_socket,
        };
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("teleops={default_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(|| CrlfStderr)
        .init();
}

async fn resolve_joints(config: &TeleopsConfig) -> TeleopsResult<Vec<String>> {
    if !config.joints.is_empty() {
        return Ok(config.joints.clone());
    }
    if !config.enable_jog {
        return Ok(Vec::new());
    }
    read_joints(&config.bridge_socket, &config.joint_states_topic).await
}

async fn run(args: Args) -> TeleopsResult<()> {
    let mut config = args.into_config()?;
    debug!(?config, "input arguments");

    let joints = resolve_joints(&config).await?;
    let servo = ServoClient::new(&config.bridge_socket);
    if config.start_servo {
        Activation::new(config.activation_timeout)
            .ensure(|| servo.activate())
            .await?;
        config.servo_started = true;
    }

    let transport = IpcTransport::connect(&config.bridge_socket)?;
    let sink =
        TeleopsClientFactory.create_client_for_servo(&config, joints.clone(), transport, servo);
    let mut dispatcher = Dispatcher::new(sink, joints);

    println!("\n{}", dispatcher.key_legend());

    let raw_mode = match RawModeGuard::enable() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Console setup error. Switching to non interactive console: {e}");
            None
        }
    };
    info!(runtime = %config.runtime, "accepting keys");

    let keys = spawn_key_reader(raw_mode.is_some());
    let outcome = dispatcher.run(keys).await;
    let closed = dispatcher.close().await;
    drop(raw_mode);
    outcome.and(closed)
}

fn main() -> TeleopsResult<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(args));
    // A bridge call abandoned after its timeout may still be blocked on a read.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_into_config() {
        let args = Args::try_parse_from([
            "teleops",
            "--frame",
            "tool0",
            "--runtime",
            "jazzy",
            "--joints",
            "j0,j1,j2",
            "--activation-timeout-secs",
            "5",
        ])
        .unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(config.frame_name, "tool0");
        assert_eq!(config.runtime, ServoRuntime::Jazzy);
        assert_eq!(config.joints, vec!["j0", "j1", "j2"]);
        assert_eq!(config.activation_timeout, Duration::from_secs(5));
        assert_eq!(config.twist_topic, teleops::DEFAULT_TWIST_TOPIC_NAME);
    }

    #[test]
    fn test_invalid_args_are_rejected() {
        assert!(Args::try_parse_from(["teleops", "--runtime", "iron"]).is_err());
        assert!(Args::try_parse_from(["teleops", "--activation-timeout-secs", "soon"]).is_err());

        let args = Args::try_parse_from(["teleops", "--activation-timeout-secs", "0"]).unwrap();
        assert!(args.into_config().is_err());
    }

    #[test]
    fn test_env_fallbacks() {
        let command = Args::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .and_then(|env| env.to_str())
                .map(str::to_string)
        };

        assert_eq!(env_of("frame").as_deref(), Some("TELEOPS_FRAME"));
        assert_eq!(env_of("runtime").as_deref(), Some("TELEOPS_RUNTIME"));
        assert_eq!(
            env_of("activation_timeout_secs").as_deref(),
            Some("TELEOPS_ACTIVATION_TIMEOUT_SECS")
        );
        assert_eq!(env_of("bridge_socket").as_deref(), Some("TELEOPS_BRIDGE_SOCKET"));
        assert_eq!(env_of("enable_jog"), None);
    }
}
