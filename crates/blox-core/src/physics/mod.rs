//! Physics collaborator boundary
//!
//! The core never integrates bodies or detects collisions itself. It talks
//! to the physics engine through [`PhysicsBackend`]: it creates/destroys
//! rigid bodies, reads and writes a small velocity/damping state, and
//! configures joints through immutable [`JointDescriptor`] records. This
//! keeps split and migration logic testable without a real engine.

mod simple;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::math::Pose;

pub use simple::SimplePhysics;

/// Opaque rigid body id issued by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

/// Opaque joint id issued by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub u64);

/// The physics state the core reads and writes on a body
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyState {
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub linear_damping: f32,
    pub angular_damping: f32,
}

/// Hinge rotation limits in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HingeLimits {
    pub min: f32,
    pub max: f32,
}

/// Hinge spring pulling toward a target angle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HingeSpring {
    pub spring: f32,
    pub damper: f32,
    pub target_angle: f32,
}

/// Hinge motor driving toward a target angular velocity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HingeMotor {
    pub target_velocity: f32,
    pub force: f32,
    pub free_spin: bool,
}

/// Tuning parameters of a hinge (bearing) joint
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HingeParams {
    pub limits: Option<HingeLimits>,
    pub spring: Option<HingeSpring>,
    pub motor: Option<HingeMotor>,
}

/// Soft linear travel limit of a slider joint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearLimit {
    pub limit: f32,
    pub bounciness: f32,
    pub contact_distance: f32,
}

/// Spring applied when the linear limit is exceeded
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitSpring {
    pub spring: f32,
    pub damper: f32,
}

/// Positional drive along the slider axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Drive {
    pub position_spring: f32,
    pub position_damper: f32,
    pub maximum_force: f32,
}

/// Constraint projection mode for joint error correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionMode {
    None,
    PositionAndRotation,
}

/// Tuning parameters of a slider (damper) joint.
///
/// Copied field for field on migration; the geometric fields of the
/// descriptor are recomputed instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SliderParams {
    pub limit: LinearLimit,
    pub limit_spring: LimitSpring,
    pub drive: Drive,
    pub projection_mode: ProjectionMode,
    pub projection_distance: f32,
    pub projection_angle: f32,
    pub configured_in_world_space: bool,
    pub swap_bodies: bool,
    pub break_force: f32,
    pub break_torque: f32,
}

/// Joint tuning, by joint kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JointParams {
    Hinge(HingeParams),
    Slider(SliderParams),
}

/// Immutable description of one joint between two bodies.
///
/// Anchors and axes are local to the respective body frames; the backend
/// receives the full record at creation and is never reconfigured in place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointDescriptor {
    pub body: BodyId,
    pub connected_body: BodyId,
    pub anchor: Vec3,
    pub connected_anchor: Vec3,
    pub axis: Vec3,
    pub secondary_axis: Vec3,
    pub params: JointParams,
}

impl JointDescriptor {
    /// World-space position of the near anchor given the near body pose
    pub fn world_anchor(&self, body_pose: &Pose) -> Vec3 {
        body_pose.transform_point(self.anchor)
    }

    /// World-space position of the far anchor given the far body pose
    pub fn world_connected_anchor(&self, connected_pose: &Pose) -> Vec3 {
        connected_pose.transform_point(self.connected_anchor)
    }
}

/// The boundary the core drives the physics engine through.
///
/// Lookups return `Option` so a body or joint destroyed behind the core's
/// back is detectable and can be skipped instead of corrupting state.
pub trait PhysicsBackend {
    /// Create a rigid body at the given pose
    fn create_body(&mut self, pose: Pose) -> BodyId;

    /// Destroy a body. Unknown ids are ignored.
    fn destroy_body(&mut self, body: BodyId);

    /// Current pose of a body
    fn body_pose(&self, body: BodyId) -> Option<Pose>;

    /// Teleport a body
    fn set_body_pose(&mut self, body: BodyId, pose: Pose);

    /// Velocity and damping of a body
    fn body_state(&self, body: BodyId) -> Option<BodyState>;

    /// Overwrite velocity and damping of a body
    fn set_body_state(&mut self, body: BodyId, state: BodyState);

    /// Kinematic bodies ignore forces and integration
    fn set_kinematic(&mut self, body: BodyId, kinematic: bool);

    /// Create a joint from an immutable descriptor
    fn create_joint(&mut self, descriptor: JointDescriptor) -> JointId;

    /// Destroy a joint. Unknown ids are ignored.
    fn destroy_joint(&mut self, joint: JointId);

    /// The descriptor a live joint was created from
    fn joint_descriptor(&self, joint: JointId) -> Option<&JointDescriptor>;

    /// Advance the simulation by `dt` seconds
    fn step(&mut self, dt: f32);
}
