//! Bearing constraint links
//!
//! A bearing is a single-axis rotational constraint between two assemblies,
//! anchored through a start block and an end block. The joint connects the
//! assemblies' rigid bodies, never the blocks themselves; the rotation axis
//! is derived from the start-to-end direction.

use glam::Vec3;

use crate::arena::Handle;
use crate::block::BlockId;
use crate::config::BearingConfig;
use crate::math::{Pose, perpendicular_axis};
use crate::physics::{BodyId, HingeParams, JointDescriptor, JointId, JointParams};

/// Handle to a bearing link
pub type BearingId = Handle<Bearing>;

/// Rotational constraint link.
///
/// Lifecycle: created with only a start connection (`Unattached`); the joint
/// exists once the end connection is set (`Attached`); splits re-create the
/// joint against fresh bodies (`Migrated`), and destruction removes the link
/// from both endpoint blocks.
#[derive(Debug, Clone)]
pub struct Bearing {
    /// The block the bearing was spawned onto
    pub start: BlockId,
    /// The block completing the hinge; `None` while unattached
    pub end: Option<BlockId>,
    /// The bearing's own physical block
    pub block: BlockId,
    /// The live joint, once attached
    pub joint: Option<JointId>,
    pub config: BearingConfig,
}

impl Bearing {
    /// A bearing anchored at `start`, hosted by `block`, not yet attached
    pub fn new(start: BlockId, block: BlockId, config: BearingConfig) -> Self {
        Self {
            start,
            end: None,
            block,
            joint: None,
            config,
        }
    }

    /// Hinge tuning derived from the config record
    pub fn params(&self) -> HingeParams {
        HingeParams {
            limits: self.config.limits,
            spring: self.config.spring,
            motor: self.config.motor,
        }
    }
}

/// Build a hinge descriptor between two assembly bodies.
///
/// The shared world anchor is the end block's position; both local anchors
/// are that point inverse-transformed into the respective body frames, so
/// they coincide in world space at creation time. The axis is the
/// normalized start-to-end direction in the near body frame.
pub fn hinge_descriptor(
    near_body: BodyId,
    near_pose: &Pose,
    far_body: BodyId,
    far_pose: &Pose,
    start_position: Vec3,
    end_position: Vec3,
    params: HingeParams,
) -> JointDescriptor {
    let world_anchor = end_position;
    let direction = (start_position - end_position).normalize_or(Vec3::Z);
    let axis = near_pose.inverse_transform_direction(direction);
    JointDescriptor {
        body: near_body,
        connected_body: far_body,
        anchor: near_pose.inverse_transform_point(world_anchor),
        connected_anchor: far_pose.inverse_transform_point(world_anchor),
        axis,
        secondary_axis: perpendicular_axis(axis),
        params: JointParams::Hinge(params),
    }
}
