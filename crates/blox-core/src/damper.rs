//! Damper constraint links
//!
//! A damper is a sliding spring constraint between a start block's assembly
//! and a synthetic terminal block that owns its own single-block assembly.
//! The slide axis and the connected anchor derive from the direction the
//! damper was spawned along, not from current block positions: the rest
//! length projection must stay consistent across migrations, so the spawn
//! direction is stored on the link and reused verbatim.

use glam::Vec3;

use crate::arena::Handle;
use crate::block::BlockId;
use crate::config::DamperConfig;
use crate::math::{Pose, perpendicular_axis};
use crate::physics::{
    BodyId, Drive, JointDescriptor, JointId, JointParams, LimitSpring, LinearLimit, SliderParams,
};

/// Handle to a damper link
pub type DamperId = Handle<Damper>;

/// Sliding spring constraint link
#[derive(Debug, Clone)]
pub struct Damper {
    /// The block the damper was spawned onto
    pub start: BlockId,
    /// The synthetic terminal block, owned by its own assembly
    pub end: BlockId,
    /// The damper's own physical block on the start side
    pub block: BlockId,
    pub joint: Option<JointId>,
    /// World-space direction the damper was spawned along
    pub spawn_direction: Vec3,
    /// Rest length, fixed at spawn from the config record
    pub current_length: f32,
    pub config: DamperConfig,
    pub visual: DamperVisual,
}

/// Passive visual proxy of a damper: a cylinder stretched between the two
/// endpoints, recomputed every simulation step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamperVisual {
    /// Midpoint of the two endpoints
    pub position: Vec3,
    /// Unit direction from start to end
    pub up: Vec3,
    /// Endpoint distance; renderers scale a unit cylinder by [`Self::scale`],
    /// whose y component is half of this
    pub length: f32,
    pub diameter: f32,
}

impl DamperVisual {
    /// Recompute from the two live endpoint positions
    pub fn update(&mut self, start: Vec3, end: Vec3, diameter: f32) {
        self.position = (start + end) / 2.0;
        self.up = (end - start).normalize_or(Vec3::Y);
        self.length = start.distance(end);
        self.diameter = diameter;
    }

    /// Non-uniform scale for a unit cylinder mesh spanning the endpoints.
    /// The cylinder convention is two units tall, so y takes half the
    /// endpoint distance.
    pub fn scale(&self) -> Vec3 {
        Vec3::new(self.diameter, self.length / 2.0, self.diameter)
    }
}

impl Damper {
    /// Slider tuning derived from the config record and rest length
    pub fn params(&self) -> SliderParams {
        SliderParams {
            limit: LinearLimit {
                limit: self.current_length * self.config.max_distance_multiplier,
                bounciness: 0.1,
                contact_distance: 0.01,
            },
            limit_spring: LimitSpring {
                spring: self.config.spring_force,
                damper: self.config.damper,
            },
            drive: Drive {
                position_spring: self.config.spring_force,
                position_damper: self.config.damper,
                maximum_force: self.config.spring_force * 2.0,
            },
            projection_mode: self.config.projection_mode,
            projection_distance: self.config.projection_distance,
            projection_angle: self.config.projection_angle,
            configured_in_world_space: self.config.configured_in_world_space,
            swap_bodies: self.config.swap_bodies,
            break_force: self.config.break_force,
            break_torque: self.config.break_torque,
        }
    }

    /// Half of the damper's total spawn extent (block-to-end distance at rest)
    pub fn half_total_length(&self) -> f32 {
        (self.current_length + 1.0) * 0.5
    }
}

/// Build a slider descriptor between the start and end assembly bodies.
///
/// The anchor is the start block's position in the start body frame. The
/// connected anchor back-projects along the stored spawn direction so that
/// `connected_anchor = start + (-spawn_dir) * (half_total_length - distance)`
/// in world space, keeping the rest-length math stable however far the end
/// body has drifted.
pub fn slider_descriptor(
    start_body: BodyId,
    start_body_pose: &Pose,
    end_body: BodyId,
    end_body_pose: &Pose,
    start_position: Vec3,
    end_position: Vec3,
    spawn_direction: Vec3,
    half_total_length: f32,
    params: SliderParams,
) -> JointDescriptor {
    let axis = start_body_pose
        .inverse_transform_direction(spawn_direction)
        .normalize_or(Vec3::Z);
    let distance = start_position.distance(end_position);
    let desired_anchor = start_position + (-spawn_direction) * (half_total_length - distance);
    JointDescriptor {
        body: start_body,
        connected_body: end_body,
        anchor: start_body_pose.inverse_transform_point(start_position),
        connected_anchor: end_body_pose.inverse_transform_point(desired_anchor),
        axis,
        secondary_axis: perpendicular_axis(axis),
        params: JointParams::Slider(params),
    }
}
