//! Proximity discovery and block removal

use glam::Vec3;

use crate::assembly::AssemblyId;
use crate::bearing::BearingId;
use crate::block::{BlockId, BlockKind};
use crate::damper::DamperId;
use crate::physics::PhysicsBackend;

use super::World;

impl<P: PhysicsBackend> World<P> {
    /// Scan for blocks of the same assembly whose connection points sit
    /// within this block's check radius and record symmetric graph edges.
    ///
    /// A candidate matches when the distance from one of our connection
    /// points to the candidate's closest connection point is within the
    /// radius, so face-to-face neighbors connect without their centers
    /// having to touch.
    pub fn discover_connections(&mut self, block: BlockId) {
        let Some(b) = self.blocks.get(block) else {
            return;
        };
        let assembly = b.assembly;
        let radius_sq = b.check_radius * b.check_radius;
        let Some((_, body_pose)) = self.assembly_frame(assembly) else {
            return;
        };
        let pose = body_pose.mul(&b.local_pose);
        let query_points: Vec<Vec3> = b
            .connection_points
            .iter()
            .map(|p| pose.transform_point(p.local_pose.position))
            .collect();

        let mut found: Vec<BlockId> = Vec::new();
        for (other_id, other) in self.blocks.iter() {
            if other_id == block || other.assembly != assembly {
                continue;
            }
            let other_pose = body_pose.mul(&other.local_pose);
            let within = query_points.iter().any(|&q| {
                other.connection_points.iter().any(|p| {
                    other_pose
                        .transform_point(p.local_pose.position)
                        .distance_squared(q)
                        <= radius_sq
                })
            });
            if within {
                found.push(other_id);
            }
        }

        for other in found {
            self.link_blocks(block, other);
        }
    }

    /// Record a symmetric connection edge between two blocks
    pub(crate) fn link_blocks(&mut self, a: BlockId, b: BlockId) {
        if a == b {
            return;
        }
        if let Some(block) = self.blocks.get_mut(a) {
            block.neighbors.insert(b);
        }
        if let Some(block) = self.blocks.get_mut(b) {
            block.neighbors.insert(a);
        }
    }

    /// Index of the connection point of `block` closest to a world-space
    /// point
    pub fn closest_connection_point(&self, block: BlockId, world_point: Vec3) -> Option<usize> {
        let pose = self.block_world_pose(block)?;
        self.blocks
            .get(block)?
            .closest_connection_point(&pose, world_point)
    }

    /// Delete a block from the world. Constraint links attached to or
    /// hosted by the block are destroyed first, then the block itself is
    /// removed and connectivity re-validated. Returns `false` when the
    /// block is missing or flagged undeletable.
    pub fn delete_block(&mut self, block: BlockId) -> bool {
        let Some(b) = self.blocks.get(block) else {
            return false;
        };
        if !b.can_be_deleted {
            return false;
        }
        let mut bearings: Vec<BearingId> = b.bearings.clone();
        let mut dampers: Vec<DamperId> = b.dampers.clone();
        match b.kind {
            BlockKind::Bearing(id) => bearings.push(id),
            BlockKind::Damper(id) | BlockKind::DamperEnd(id) => dampers.push(id),
            BlockKind::Standard => {}
        }
        for id in bearings {
            self.destroy_bearing(id);
        }
        for id in dampers {
            self.destroy_damper(id);
        }
        // A link teardown above may already have consumed the block.
        self.remove_block_internal(block);
        true
    }

    /// Remove a block without touching its constraint links: strip its
    /// edges, detach it from assembly and chunk, then resolve any split
    /// it caused. Neighbors that end up in other assemblies get those
    /// assemblies re-validated.
    pub(crate) fn remove_block_internal(&mut self, block: BlockId) {
        let Some(b) = self.blocks.get(block) else {
            return;
        };
        let assembly = b.assembly;
        let neighbors: Vec<BlockId> = b.neighbors.iter().copied().collect();
        let mut neighbor_assemblies: Vec<AssemblyId> = Vec::new();
        for &n in &neighbors {
            if let Some(nb) = self.blocks.get_mut(n) {
                nb.neighbors.remove(&block);
                neighbor_assemblies.push(nb.assembly);
            }
        }
        for a in neighbor_assemblies {
            self.queue_validation(a);
        }
        self.remove_from_chunk(block);
        self.unregister_block(assembly, block, &neighbors);
        self.blocks.remove(block);
        if self.assemblies.get(assembly).is_some_and(|a| a.is_empty()) {
            self.queue_validation(assembly);
        }
    }

    /// Destroy a bearing link: unhook it from its endpoint blocks, drop
    /// the hinge joint and remove the hosting bearing block
    pub fn destroy_bearing(&mut self, id: BearingId) {
        let Some(bearing) = self.bearings.remove(id) else {
            return;
        };
        for endpoint in [Some(bearing.start), bearing.end].into_iter().flatten() {
            if let Some(b) = self.blocks.get_mut(endpoint) {
                b.bearings.retain(|&x| x != id);
            }
        }
        if let Some(joint) = bearing.joint {
            self.physics.destroy_joint(joint);
        }
        // Clear the role first so removal does not re-enter this link.
        if let Some(b) = self.blocks.get_mut(bearing.block) {
            b.kind = BlockKind::Standard;
        }
        self.remove_block_internal(bearing.block);
    }

    /// Destroy a damper link: unhook it from its endpoint blocks, drop
    /// the slider joint and remove both the hosting damper block and the
    /// synthetic terminal block
    pub fn destroy_damper(&mut self, id: DamperId) {
        let Some(damper) = self.dampers.remove(id) else {
            return;
        };
        for endpoint in [damper.start, damper.end, damper.block] {
            if let Some(b) = self.blocks.get_mut(endpoint) {
                b.dampers.retain(|&x| x != id);
                if matches!(b.kind, BlockKind::Damper(x) | BlockKind::DamperEnd(x) if x == id) {
                    b.kind = BlockKind::Standard;
                }
            }
        }
        if let Some(joint) = damper.joint {
            self.physics.destroy_joint(joint);
        }
        self.remove_block_internal(damper.end);
        self.remove_block_internal(damper.block);
    }
}
