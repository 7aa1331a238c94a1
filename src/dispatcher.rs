//! Key stream to motion command dispatch.

use std::fmt::Write as _;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::TeleopsResult;
use crate::keymap::{AxisKeyMap, JointKeyMap, MAX_JOINT_KEY_INDEX};
use crate::messages::Vector3D;
use crate::MotionSink;

/// Flips the direction of subsequent joint jogs.
pub const REVERSE_KEY: u8 = b'r';

/// What a single key press resulted in.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    /// Unmapped, out of range, or a line feed; nothing was sent.
    Ignored,
    Reversed { reversed: bool },
    Cartesian(Vector3D),
    Joint { joint: usize, velocities: Vec<f64> },
}

/// Routes raw key codes to a [`MotionSink`].
///
/// Keys are handled strictly one after another; a key that needs servo activation blocks the
/// next one until activation completes or fails.
pub struct Dispatcher<S> {
    sink: S,
    axes: AxisKeyMap,
    joints: Option<JointKeyMap>,
    joint_names: Vec<String>,
    reversed: bool,
}

impl<S: MotionSink> Dispatcher<S> {
    /// `joint_names` fixes the jog ordering; an empty list disables jogging.
    pub fn new(sink: S, joint_names: Vec<String>) -> Self {
        let joints = (!joint_names.is_empty()).then(|| JointKeyMap::new(joint_names.len()));
        Self {
            sink,
            axes: AxisKeyMap::new(),
            joints,
            joint_names,
            reversed: false,
        }
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn jog_enabled(&self) -> bool {
        self.joints.is_some()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn handle_key(&mut self, key: u8) -> TeleopsResult<KeyOutcome> {
        debug!(key, "new key request");

        if key == b'\n' {
            return Ok(KeyOutcome::Ignored);
        }

        if key == REVERSE_KEY {
            self.reversed = !self.reversed;
            debug!(reversed = self.reversed, "jog direction toggled");
            return Ok(KeyOutcome::Reversed {
                reversed: self.reversed,
            });
        }

        if let Some(velocity) = self.axes.lookup(key) {
            self.sink.move_cartesian(velocity).await?;
            return Ok(KeyOutcome::Cartesian(velocity));
        }

        let jog = self.joints.as_ref().and_then(|map| {
            let joint = JointKeyMap::joint_for_key(key)?;
            Some((joint, map.lookup(joint, self.reversed)?))
        });
        if let Some((joint, velocities)) = jog {
            self.sink.move_joints(velocities.clone()).await?;
            return Ok(KeyOutcome::Joint { joint, velocities });
        }

        Ok(KeyOutcome::Ignored)
    }

    /// Consumes keys until the stream ends.
    ///
    /// Activation failures are reported and the loop keeps going, so the next motion key
    /// retries activation. Any other error ends the loop.
    pub async fn run(&mut self, mut keys: mpsc::Receiver<u8>) -> TeleopsResult<()> {
        while let Some(key) = keys.recv().await {
            match self.handle_key(key).await {
                Ok(_) => {}
                Err(e) if e.is_activation_failure() => {
                    error!(error = %e, "servo is not active, press a motion key to retry");
                }
                Err(e) => return Err(e),
            }
        }
        debug!("key stream ended");
        Ok(())
    }

    /// Releases the sink. Call on every exit path, including after a failed run.
    pub async fn close(mut self) -> TeleopsResult<()> {
        self.sink.close().await
    }

    /// Operator help for the configured key bindings.
    pub fn key_legend(&self) -> String {
        let mut legend = String::from(
            "Use following keys to send move commands in Cartesian space:\n\n\
             Keys w, s - move along x axis\n\
             Keys a, d - move along y axis\n\
             Keys q, e - move along z axis\n\n",
        );

        match &self.joints {
            None => legend.push_str("Jog commands are disabled (see --enable-jog option)\n"),
            Some(map) => {
                legend.push_str("Use numeric keys to jog (rotate) joints in the following order:\n\n");
                for (i, name) in self
                    .joint_names
                    .iter()
                    .enumerate()
                    .take(MAX_JOINT_KEY_INDEX + 1)
                {
                    let _ = writeln!(legend, "{i} - {name}");
                }
                let _ = writeln!(
                    legend,
                    "\nPress '{}' to reverse jog direction.",
                    REVERSE_KEY as char
                );
                if map.overflows() {
                    let ignored = &self.joint_names[map.unreachable()];
                    if ignored.is_empty() {
                        let _ = writeln!(
                            legend,
                            "Total number of joints is greater than {MAX_JOINT_KEY_INDEX}: \
                             every digit key is bound"
                        );
                    } else {
                        let _ = writeln!(
                            legend,
                            "Total number of joints is greater than {MAX_JOINT_KEY_INDEX} so \
                             these joints are ignored: {}",
                            ignored.join(", ")
                        );
                    }
                }
            }
        }

        legend.push_str("\nAdditional keys:\n\nCtrl-C - quit\n");
        legend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Default)]
    struct RecordingSink {
        cartesian: Vec<Vector3D>,
        joints: Vec<Vec<f64>>,
    }

    #[async_trait]
    impl MotionSink for RecordingSink {
        async fn move_cartesian(&mut self, velocity: Vector3D) -> TeleopsResult<()> {
            self.cartesian.push(velocity);
            Ok(())
        }

        async fn move_joints(&mut self, velocities: Vec<f64>) -> TeleopsResult<()> {
            self.joints.push(velocities);
            Ok(())
        }

        async fn close(&mut self) -> TeleopsResult<()> {
            Ok(())
        }
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("joint_{i}")).collect()
    }

    #[tokio::test]
    async fn reversing_twice_restores_direction() {
        let mut dispatcher = Dispatcher::new(RecordingSink::default(), names(2));

        dispatcher.handle_key(b'0').await.expect("key");
        dispatcher.handle_key(b'r').await.expect("key");
        dispatcher.handle_key(b'r').await.expect("key");
        dispatcher.handle_key(b'0').await.expect("key");

        assert!(!dispatcher.is_reversed());
        assert_eq!(dispatcher.sink().joints, vec![vec![1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[tokio::test]
    async fn reversal_does_not_touch_cartesian_moves() {
        let mut dispatcher = Dispatcher::new(RecordingSink::default(), names(1));

        let outcome = dispatcher.handle_key(b'r').await.expect("key");
        assert_eq!(outcome, KeyOutcome::Reversed { reversed: true });
        dispatcher.handle_key(b's').await.expect("key");

        assert_eq!(dispatcher.sink().cartesian, vec![Vector3D::new(-1.0, 0.0, 0.0)]);
    }

    #[tokio::test]
    async fn line_feeds_and_unknown_keys_send_nothing() {
        let mut dispatcher = Dispatcher::new(RecordingSink::default(), names(3));

        for key in [b'\n', b'x', b'Z', b' ', b'5'] {
            assert_eq!(dispatcher.handle_key(key).await.expect("key"), KeyOutcome::Ignored);
        }
        assert!(dispatcher.sink().cartesian.is_empty());
        assert!(dispatcher.sink().joints.is_empty());
    }

    #[tokio::test]
    async fn digits_are_ignored_when_jog_is_disabled() {
        let mut dispatcher = Dispatcher::new(RecordingSink::default(), Vec::new());

        assert!(!dispatcher.jog_enabled());
        assert_eq!(dispatcher.handle_key(b'0').await.expect("key"), KeyOutcome::Ignored);
        assert!(dispatcher.sink().joints.is_empty());
    }

    #[tokio::test]
    async fn run_drains_key_stream() {
        let (tx, rx) = mpsc::channel(8);
        for key in *b"w1r1\n" {
            tx.send(key).await.expect("send");
        }
        drop(tx);

        let mut dispatcher = Dispatcher::new(RecordingSink::default(), names(2));
        dispatcher.run(rx).await.expect("run");

        assert_eq!(dispatcher.sink().cartesian.len(), 1);
        assert_eq!(dispatcher.sink().joints, vec![vec![0.0, 1.0], vec![0.0, -1.0]]);
    }

    #[test]
    fn legend_lists_joints_and_overflow() {
        let dispatcher = Dispatcher::new(RecordingSink::default(), names(11));
        let legend = dispatcher.key_legend();

        assert!(legend.contains("0 - joint_0"));
        assert!(legend.contains("9 - joint_9"));
        assert!(!legend.contains("10 - joint_10"));
        assert!(legend.contains("these joints are ignored: joint_10"));

        let ten = Dispatcher::new(RecordingSink::default(), names(10)).key_legend();
        assert!(ten.contains("9 - joint_9"));
        assert!(ten.contains("every digit key is bound"));
        assert!(!ten.contains("ignored"));

        let disabled = Dispatcher::new(RecordingSink::default(), Vec::new()).key_legend();
        assert!(disabled.contains("Jog commands are disabled"));
    }
}
