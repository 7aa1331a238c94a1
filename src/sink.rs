//! Base motion sink: stamps velocities and publishes them to topics.

use async_trait::async_trait;
use tracing::info;

use crate::error::{TeleopsError, TeleopsResult};
use crate::messages::{JointJog, MotionMessage, TwistStamped, Vector3D};
use crate::MotionSink;

/// Publish side of the middleware.
///
/// Implementations are expected to serialize concurrent publishes themselves; the sink never
/// issues two at once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, topic: &str, message: MotionMessage) -> TeleopsResult<()>;

    async fn close(&self) -> TeleopsResult<()>;
}

/// [`MotionSink`] that turns velocities into stamped messages on two topics.
pub struct TopicMotionSink<T> {
    transport: T,
    frame_name: String,
    joints: Vec<String>,
    twist_topic: String,
    jog_topic: String,
}

impl<T: Transport> TopicMotionSink<T> {
    /// `frame_name` is attached to every message; `joints` fixes the joint ordering.
    pub fn new(
        transport: T,
        frame_name: impl Into<String>,
        joints: Vec<String>,
        twist_topic: impl Into<String>,
        jog_topic: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            frame_name: frame_name.into(),
            joints,
            twist_topic: twist_topic.into(),
            jog_topic: jog_topic.into(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T> std::fmt::Debug for TopicMotionSink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicMotionSink")
            .field("frame_name", &self.frame_name)
            .field("joints", &self.joints)
            .field("twist_topic", &self.twist_topic)
            .field("jog_topic", &self.jog_topic)
            .finish()
    }
}

#[async_trait]
impl<T: Transport> MotionSink for TopicMotionSink<T> {
    async fn move_cartesian(&mut self, velocity: Vector3D) -> TeleopsResult<()> {
        let message = TwistStamped::linear(&self.frame_name, velocity);
        info!(topic = %self.twist_topic, ?message, "publishing twist");
        self.transport
            .publish(&self.twist_topic, MotionMessage::TwistStamped(message))
            .await
    }

    async fn move_joints(&mut self, velocities: Vec<f64>) -> TeleopsResult<()> {
        if velocities.len() != self.joints.len() {
            return Err(TeleopsError::VectorLengthMismatch {
                expected: self.joints.len(),
                actual: velocities.len(),
            });
        }
        let message = JointJog::velocities(&self.frame_name, &self.joints, velocities);
        info!(topic = %self.jog_topic, ?message, "publishing joint jog");
        self.transport
            .publish(&self.jog_topic, MotionMessage::JointJog(message))
            .await
    }

    async fn close(&mut self) -> TeleopsResult<()> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingTransport {
        published: Mutex<Vec<(String, MotionMessage)>>,
        closed: Mutex<bool>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn publish(&self, topic: &str, message: MotionMessage) -> TeleopsResult<()> {
            self.published
                .lock()
                .expect("lock")
                .push((topic.to_string(), message));
            Ok(())
        }

        async fn close(&self) -> TeleopsResult<()> {
            *self.closed.lock().expect("lock") = true;
            Ok(())
        }
    }

    fn sink(joints: &[&str]) -> TopicMotionSink<RecordingTransport> {
        TopicMotionSink::new(
            RecordingTransport::default(),
            "tool0",
            joints.iter().map(|j| j.to_string()).collect(),
            "/twist",
            "/jog",
        )
    }

    #[tokio::test]
    async fn cartesian_move_publishes_stamped_twist() {
        let mut sink = sink(&[]);
        sink.move_cartesian(Vector3D::new(0.0, -1.0, 0.0))
            .await
            .expect("publish");

        let published = sink.transport().published.lock().expect("lock");
        assert_eq!(published.len(), 1);
        let (topic, message) = &published[0];
        assert_eq!(topic, "/twist");
        let MotionMessage::TwistStamped(twist) = message else {
            panic!("expected twist, got {message:?}");
        };
        assert_eq!(twist.header.frame_id, "tool0");
        assert_eq!(twist.twist.linear, Vector3D::new(0.0, -1.0, 0.0));
        assert_eq!(twist.twist.angular, Vector3D::zero());
    }

    #[tokio::test]
    async fn joint_move_carries_joint_names() {
        let mut sink = sink(&["j0", "j1", "j2"]);
        sink.move_joints(vec![0.0, 1.0, 0.0]).await.expect("publish");

        let published = sink.transport().published.lock().expect("lock");
        let (topic, MotionMessage::JointJog(jog)) = &published[0] else {
            panic!("expected joint jog");
        };
        assert_eq!(topic, "/jog");
        assert_eq!(jog.joint_names, vec!["j0", "j1", "j2"]);
        assert_eq!(jog.velocities, vec![0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn joint_move_with_wrong_length_is_not_published() {
        let mut sink = sink(&["j0", "j1", "j2"]);
        let err = sink
            .move_joints(vec![1.0, 0.0])
            .await
            .expect_err("length mismatch");

        assert!(matches!(
            err,
            TeleopsError::VectorLengthMismatch {
                expected: 3,
                actual: 2
            }
        ));
        assert!(sink.transport().published.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn close_releases_transport() {
        let mut sink = sink(&[]);
        sink.close().await.expect("close");
        assert!(*sink.transport().closed.lock().expect("lock"));
    }
}
