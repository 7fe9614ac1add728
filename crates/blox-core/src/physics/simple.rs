//! Headless reference backend
//!
//! Stores bodies and joints in plain maps and integrates poses from
//! velocities only. Joints are bookkeeping records, not solved constraints;
//! this backend exists so the core (and its tests) can run without a real
//! engine attached.

use std::collections::HashMap;

use glam::Quat;

use crate::math::Pose;

use super::{BodyId, BodyState, JointDescriptor, JointId, PhysicsBackend};

#[derive(Debug, Clone)]
struct BodyRecord {
    pose: Pose,
    state: BodyState,
    kinematic: bool,
}

/// In-memory physics backend with velocity-only integration
#[derive(Debug, Default)]
pub struct SimplePhysics {
    bodies: HashMap<u64, BodyRecord>,
    joints: HashMap<u64, JointDescriptor>,
    next_body: u64,
    next_joint: u64,
}

impl SimplePhysics {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live bodies
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of live joints
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Whether a body is currently kinematic
    pub fn is_kinematic(&self, body: BodyId) -> bool {
        self.bodies.get(&body.0).is_some_and(|b| b.kinematic)
    }
}

impl PhysicsBackend for SimplePhysics {
    fn create_body(&mut self, pose: Pose) -> BodyId {
        let id = self.next_body;
        self.next_body += 1;
        self.bodies.insert(
            id,
            BodyRecord {
                pose,
                state: BodyState::default(),
                kinematic: false,
            },
        );
        BodyId(id)
    }

    fn destroy_body(&mut self, body: BodyId) {
        self.bodies.remove(&body.0);
    }

    fn body_pose(&self, body: BodyId) -> Option<Pose> {
        self.bodies.get(&body.0).map(|b| b.pose)
    }

    fn set_body_pose(&mut self, body: BodyId, pose: Pose) {
        if let Some(record) = self.bodies.get_mut(&body.0) {
            record.pose = pose;
        }
    }

    fn body_state(&self, body: BodyId) -> Option<BodyState> {
        self.bodies.get(&body.0).map(|b| b.state)
    }

    fn set_body_state(&mut self, body: BodyId, state: BodyState) {
        if let Some(record) = self.bodies.get_mut(&body.0) {
            record.state = state;
        }
    }

    fn set_kinematic(&mut self, body: BodyId, kinematic: bool) {
        if let Some(record) = self.bodies.get_mut(&body.0) {
            record.kinematic = kinematic;
        }
    }

    fn create_joint(&mut self, descriptor: JointDescriptor) -> JointId {
        let id = self.next_joint;
        self.next_joint += 1;
        self.joints.insert(id, descriptor);
        JointId(id)
    }

    fn destroy_joint(&mut self, joint: JointId) {
        self.joints.remove(&joint.0);
    }

    fn joint_descriptor(&self, joint: JointId) -> Option<&JointDescriptor> {
        self.joints.get(&joint.0)
    }

    fn step(&mut self, dt: f32) {
        for record in self.bodies.values_mut() {
            if record.kinematic {
                continue;
            }
            record.pose.position += record.state.linear_velocity * dt;
            let w = record.state.angular_velocity;
            if w.length_squared() > 0.0 {
                record.pose.rotation =
                    (Quat::from_scaled_axis(w * dt) * record.pose.rotation).normalize();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec3;

    #[test]
    fn test_step_integrates_linear_velocity() {
        let mut physics = SimplePhysics::new();
        let body = physics.create_body(Pose::IDENTITY);
        physics.set_body_state(
            body,
            BodyState {
                linear_velocity: Vec3::new(2.0, 0.0, 0.0),
                ..BodyState::default()
            },
        );
        physics.step(0.5);
        let pose = physics.body_pose(body).unwrap();
        assert_relative_eq!(pose.position.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_kinematic_body_does_not_move() {
        let mut physics = SimplePhysics::new();
        let body = physics.create_body(Pose::IDENTITY);
        physics.set_body_state(
            body,
            BodyState {
                linear_velocity: Vec3::Y,
                ..BodyState::default()
            },
        );
        physics.set_kinematic(body, true);
        physics.step(1.0);
        assert_eq!(physics.body_pose(body).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn test_destroyed_body_is_absent() {
        let mut physics = SimplePhysics::new();
        let body = physics.create_body(Pose::IDENTITY);
        physics.destroy_body(body);
        assert!(physics.body_pose(body).is_none());
        assert!(physics.body_state(body).is_none());
    }
}
