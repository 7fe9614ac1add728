//! Blocks and their connection bookkeeping
//!
//! A block is a node in the connection graph: a local pose inside its
//! owning assembly, a fixed list of connection points, the symmetric
//! neighbor set, and the lists of constraint links anchored through it.

use std::collections::BTreeSet;

use glam::{Quat, Vec3};

use crate::arena::Handle;
use crate::assembly::AssemblyId;
use crate::bearing::BearingId;
use crate::chunk::ChunkId;
use crate::constants::{DEFAULT_BLOCK_HALF_EXTENT, DEFAULT_CHECK_RADIUS};
use crate::damper::DamperId;
use crate::math::Pose;

/// Handle to a block
pub type BlockId = Handle<Block>;

/// A snap point on a block. `forward` of the pose is the outward normal
/// new blocks spawn along.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConnectionPoint {
    pub local_pose: Pose,
}

impl ConnectionPoint {
    /// Connection point at a local pose
    pub fn new(local_pose: Pose) -> Self {
        Self { local_pose }
    }

    /// The six face-centered connection points of a cube block, normals
    /// pointing outward
    pub fn cube_faces(half_extent: f32) -> Vec<ConnectionPoint> {
        let normals = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        normals
            .into_iter()
            .map(|n| {
                ConnectionPoint::new(Pose::new(
                    n * half_extent,
                    Quat::from_rotation_arc(Vec3::Z, n),
                ))
            })
            .collect()
    }
}

/// Role a block plays in the constraint system, resolved at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockKind {
    #[default]
    Standard,
    /// The physical body of a bearing; the link id is the bearing it hosts
    Bearing(BearingId),
    /// The physical body of a damper, spawned on the start side
    Damper(DamperId),
    /// The synthetic terminal block of a damper
    DamperEnd(DamperId),
}

/// A connectable unit owned by exactly one assembly
#[derive(Debug, Clone)]
pub struct Block {
    /// Pose relative to the owning assembly's body
    pub local_pose: Pose,
    pub connection_points: Vec<ConnectionPoint>,
    /// Symmetric adjacency: if A lists B, B lists A
    pub neighbors: BTreeSet<BlockId>,
    /// Bearings anchored through this block
    pub bearings: Vec<BearingId>,
    /// Dampers anchored through this block
    pub dampers: Vec<DamperId>,
    pub assembly: AssemblyId,
    pub chunk: Option<ChunkId>,
    pub can_be_deleted: bool,
    pub check_radius: f32,
    pub kind: BlockKind,
}

impl Block {
    /// A block with no connection points
    pub fn new(assembly: AssemblyId, local_pose: Pose) -> Self {
        Self {
            local_pose,
            connection_points: Vec::new(),
            neighbors: BTreeSet::new(),
            bearings: Vec::new(),
            dampers: Vec::new(),
            assembly,
            chunk: None,
            can_be_deleted: true,
            check_radius: DEFAULT_CHECK_RADIUS,
            kind: BlockKind::Standard,
        }
    }

    /// A standard cube block with face connection points
    pub fn cube(assembly: AssemblyId, local_pose: Pose) -> Self {
        let mut block = Self::new(assembly, local_pose);
        block.connection_points = ConnectionPoint::cube_faces(DEFAULT_BLOCK_HALF_EXTENT);
        block
    }

    /// Index of the connection point closest to `world_point`, given this
    /// block's world pose. `None` when the block has no connection points.
    pub fn closest_connection_point(&self, world_pose: &Pose, world_point: Vec3) -> Option<usize> {
        let mut closest = None;
        let mut min_dist = f32::MAX;
        for (i, point) in self.connection_points.iter().enumerate() {
            let pos = world_pose.transform_point(point.local_pose.position);
            let d = pos.distance_squared(world_point);
            if d < min_dist {
                min_dist = d;
                closest = Some(i);
            }
        }
        closest
    }

    /// World pose of one connection point
    pub fn connection_point_world(&self, world_pose: &Pose, index: usize) -> Option<Pose> {
        self.connection_points
            .get(index)
            .map(|p| world_pose.mul(&p.local_pose))
    }
}
