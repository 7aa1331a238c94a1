//! Key to velocity lookups.
//!
//! Both maps are immutable values; the reversal flag lives in the
//! [`Dispatcher`](crate::Dispatcher) and is passed in per lookup.

use tracing::warn;

use crate::messages::Vector3D;

/// Highest joint index a single digit key can address.
pub const MAX_JOINT_KEY_INDEX: usize = 9;

const AXIS_BINDINGS: [(u8, [f64; 3]); 6] = [
    (b'w', [1.0, 0.0, 0.0]),
    (b's', [-1.0, 0.0, 0.0]),
    (b'a', [0.0, 1.0, 0.0]),
    (b'd', [0.0, -1.0, 0.0]),
    (b'q', [0.0, 0.0, 1.0]),
    (b'e', [0.0, 0.0, -1.0]),
];

/// Fixed mapping from letter keys to unit Cartesian velocities.
#[derive(Debug, Clone, Copy)]
pub struct AxisKeyMap {
    bindings: &'static [(u8, [f64; 3])],
}

impl Default for AxisKeyMap {
    fn default() -> Self {
        Self {
            bindings: &AXIS_BINDINGS,
        }
    }
}

impl AxisKeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, key: u8) -> Option<Vector3D> {
        self.bindings
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, axes)| Vector3D::from(*axes))
    }
}

/// Mapping from a joint index to a unit velocity on that joint.
///
/// Velocity rows are built once at construction; a lookup only picks the forward or
/// backward row.
#[derive(Debug, Clone)]
pub struct JointKeyMap {
    forward: Vec<Vec<f64>>,
    backward: Vec<Vec<f64>>,
}

impl JointKeyMap {
    pub fn new(joint_count: usize) -> Self {
        let row = |i: usize, v: f64| {
            let mut velocities = vec![0.0; joint_count];
            velocities[i] = v;
            velocities
        };
        let map = Self {
            forward: (0..joint_count).map(|i| row(i, 1.0)).collect(),
            backward: (0..joint_count).map(|i| row(i, -1.0)).collect(),
        };
        if map.overflows() {
            let unreachable = map.unreachable();
            if unreachable.is_empty() {
                warn!(joint_count, "digit keys 0-{MAX_JOINT_KEY_INDEX} are all in use");
            } else {
                warn!(
                    joint_count,
                    ?unreachable,
                    "only keys 0-{MAX_JOINT_KEY_INDEX} address joints, the remaining joints \
                     cannot be jogged from the keyboard"
                );
            }
        }
        map
    }

    pub fn joint_count(&self) -> usize {
        self.forward.len()
    }

    /// True when more joints are configured than single digit keys can comfortably address.
    pub fn overflows(&self) -> bool {
        self.joint_count() > MAX_JOINT_KEY_INDEX
    }

    /// Indices no digit key can ever reach.
    pub fn unreachable(&self) -> std::ops::Range<usize> {
        (MAX_JOINT_KEY_INDEX + 1).min(self.joint_count())..self.joint_count()
    }

    pub fn lookup(&self, joint: usize, reversed: bool) -> Option<Vec<f64>> {
        let rows = if reversed {
            &self.backward
        } else {
            &self.forward
        };
        rows.get(joint).cloned()
    }

    /// Joint index addressed by a digit key.
    pub fn joint_for_key(key: u8) -> Option<usize> {
        key.is_ascii_digit().then(|| usize::from(key - b'0'))
    }
}
