//! Assembly validation, split resolution and constraint migration

use std::collections::BTreeSet;

use crate::arena::Arena;
use crate::assembly::AssemblyId;
use crate::bearing::{BearingId, hinge_descriptor};
use crate::block::{Block, BlockId};
use crate::connectivity;
use crate::damper::{DamperId, slider_descriptor};
use crate::physics::{JointParams, PhysicsBackend};

use super::World;

/// Failure while moving a joint to a freshly split assembly. The old
/// joint is kept in place so the constraint never silently vanishes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MigrationError {
    #[error("no live rigid body for block {0:?}")]
    MissingBody(BlockId),
    #[error("no live source joint to duplicate")]
    NoSourceJoint,
}

impl<P: PhysicsBackend> World<P> {
    /// Full connectivity check of one assembly. An empty assembly is torn
    /// down; a disconnected one keeps its first-discovered component and
    /// moves every other component to a fresh sibling assembly.
    pub fn validate(&mut self, assembly: AssemblyId) {
        let Some(a) = self.assemblies.get(assembly) else {
            return;
        };
        if a.suspend_validation {
            return;
        }
        if a.blocks.is_empty() {
            self.teardown_assembly(assembly);
            return;
        }
        let members = a.blocks.clone();
        let groups = connectivity::components(&self.blocks, &members);
        if groups.len() <= 1 {
            return;
        }
        tracing::debug!(components = groups.len(), "assembly split detected");
        for group in groups.into_iter().skip(1) {
            self.split_off(assembly, group);
        }
    }

    /// Destroy an assembly, its rigid body and any leftover chunks
    pub(crate) fn teardown_assembly(&mut self, assembly: AssemblyId) {
        let Some(a) = self.assemblies.remove(assembly) else {
            return;
        };
        for chunk in a.chunks {
            self.chunks.remove(chunk);
        }
        self.physics.destroy_body(a.body);
    }

    /// Move `group` out of `source` into a fresh sibling assembly whose
    /// body spawns at the source body's pose and inherits its velocities
    /// and damping. Constraint links left spanning the two assemblies are
    /// migrated afterwards.
    pub(crate) fn split_off(
        &mut self,
        source: AssemblyId,
        group: BTreeSet<BlockId>,
    ) -> Option<AssemblyId> {
        if group.is_empty() {
            return None;
        }
        let source_body = self.assemblies.get(source)?.body;
        let Some(pose) = self.physics.body_pose(source_body) else {
            tracing::warn!(?source, "cannot split assembly with no live body");
            return None;
        };
        let state = self.physics.body_state(source_body).unwrap_or_default();
        let body = self.physics.create_body(pose);
        self.physics.set_body_state(body, state);
        let sibling = self.assemblies.insert(crate::assembly::Assembly::new(body));

        // Spawning the sibling body at the source pose keeps every local
        // pose valid, so re-homing is pure bookkeeping.
        for &block in &group {
            if let Some(src) = self.assemblies.get_mut(source) {
                src.blocks.remove(&block);
            }
            self.remove_from_chunk(block);
            if let Some(b) = self.blocks.get_mut(block) {
                b.assembly = sibling;
            }
            if let Some(a) = self.assemblies.get_mut(sibling) {
                a.blocks.insert(block);
            }
            self.assign_to_chunk(sibling, block);
        }

        // Links whose far endpoint stayed behind now span two bodies and
        // need their joints rebuilt against the sibling.
        let mut bearings: BTreeSet<BearingId> = BTreeSet::new();
        let mut dampers: BTreeSet<DamperId> = BTreeSet::new();
        for &block in &group {
            let Some(b) = self.blocks.get(block) else {
                continue;
            };
            for &id in &b.bearings {
                let Some(link) = self.bearings.get(id) else {
                    continue;
                };
                let far = if link.start == block { link.end } else { Some(link.start) };
                if far.is_some_and(|f| !group.contains(&f)) {
                    bearings.insert(id);
                }
            }
            for &id in &b.dampers {
                let Some(link) = self.dampers.get(id) else {
                    continue;
                };
                let far = if link.start == block { link.end } else { link.start };
                if !group.contains(&far) {
                    dampers.insert(id);
                }
            }
        }
        for id in bearings {
            if let Err(err) = self.migrate_bearing(id) {
                tracing::warn!(?id, %err, "bearing migration aborted, keeping old joint");
            }
        }
        for id in dampers {
            if let Err(err) = self.migrate_damper(id) {
                tracing::warn!(?id, %err, "damper migration aborted, keeping old joint");
            }
        }

        if self.assemblies.get(source).is_some_and(|a| a.is_empty()) {
            self.teardown_assembly(source);
        }
        Some(sibling)
    }

    /// Rebuild a bearing's hinge joint against the bodies its endpoint
    /// blocks currently live on. Tuning parameters are copied from the
    /// live joint; geometry is recomputed from current world transforms.
    /// Create-then-destroy: the old joint is only removed once the new
    /// one exists.
    pub(crate) fn migrate_bearing(&mut self, id: BearingId) -> Result<(), MigrationError> {
        let Some(bearing) = self.bearings.get(id) else {
            return Ok(());
        };
        let Some(end) = bearing.end else {
            return Ok(());
        };
        let start = bearing.start;
        let old_joint = bearing.joint.ok_or(MigrationError::NoSourceJoint)?;
        let params = match self.physics.joint_descriptor(old_joint).map(|d| d.params) {
            Some(JointParams::Hinge(p)) => p,
            _ => return Err(MigrationError::NoSourceJoint),
        };
        let (near_body, near_pose) = self
            .assembly_frame_of_block(start)
            .ok_or(MigrationError::MissingBody(start))?;
        let (far_body, far_pose) = self
            .assembly_frame_of_block(end)
            .ok_or(MigrationError::MissingBody(end))?;
        let start_pos = self
            .block_world_position(start)
            .ok_or(MigrationError::MissingBody(start))?;
        let end_pos = self
            .block_world_position(end)
            .ok_or(MigrationError::MissingBody(end))?;

        let desc = hinge_descriptor(
            near_body, &near_pose, far_body, &far_pose, start_pos, end_pos, params,
        );
        let new_joint = self.physics.create_joint(desc);
        self.physics.destroy_joint(old_joint);
        if let Some(b) = self.bearings.get_mut(id) {
            b.joint = Some(new_joint);
        }
        Ok(())
    }

    /// Rebuild a damper's slider joint after a split. Geometry derives
    /// from the stored spawn direction so the anchor back-projection
    /// matches the original construction exactly.
    pub(crate) fn migrate_damper(&mut self, id: DamperId) -> Result<(), MigrationError> {
        let Some(damper) = self.dampers.get(id) else {
            return Ok(());
        };
        let start = damper.start;
        let end = damper.end;
        let spawn_direction = damper.spawn_direction;
        let half_total_length = damper.half_total_length();
        let old_joint = damper.joint.ok_or(MigrationError::NoSourceJoint)?;
        let params = match self.physics.joint_descriptor(old_joint).map(|d| d.params) {
            Some(JointParams::Slider(p)) => p,
            _ => return Err(MigrationError::NoSourceJoint),
        };
        let (start_body, start_pose) = self
            .assembly_frame_of_block(start)
            .ok_or(MigrationError::MissingBody(start))?;
        let (end_body, end_pose) = self
            .assembly_frame_of_block(end)
            .ok_or(MigrationError::MissingBody(end))?;
        let start_pos = self
            .block_world_position(start)
            .ok_or(MigrationError::MissingBody(start))?;
        let end_pos = self
            .block_world_position(end)
            .ok_or(MigrationError::MissingBody(end))?;

        let desc = slider_descriptor(
            start_body,
            &start_pose,
            end_body,
            &end_pose,
            start_pos,
            end_pos,
            spawn_direction,
            half_total_length,
            params,
        );
        let new_joint = self.physics.create_joint(desc);
        self.physics.destroy_joint(old_joint);
        if let Some(d) = self.dampers.get_mut(id) {
            d.joint = Some(new_joint);
        }
        Ok(())
    }

    /// Synchronous local split after a block removal: flood out from the
    /// removed block's former neighbors, and if they fall into more than
    /// one group the largest group keeps the assembly while the rest
    /// split off immediately
    pub(crate) fn unregister_block(
        &mut self,
        assembly: AssemblyId,
        removed: BlockId,
        former_neighbors: &[BlockId],
    ) {
        let Some(a) = self.assemblies.get_mut(assembly) else {
            return;
        };
        a.blocks.remove(&removed);
        let seeds: Vec<BlockId> = former_neighbors
            .iter()
            .copied()
            .filter(|&n| self.blocks.get(n).is_some_and(|b| b.assembly == assembly))
            .collect();
        if seeds.len() < 2 {
            return;
        }
        let Some(a) = self.assemblies.get(assembly) else {
            return;
        };
        let mut groups = local_sub_groups(&self.blocks, &a.blocks, &seeds);
        if groups.len() <= 1 {
            return;
        }
        // Stable sort: on equal sizes the earliest-seeded group wins.
        groups.sort_by(|x, y| y.len().cmp(&x.len()));
        tracing::debug!(groups = groups.len(), "block removal split assembly");
        for group in groups.into_iter().skip(1) {
            self.split_off(assembly, group);
        }
    }
}

/// Flood `members` from each seed in turn, plus a catch-all pass over
/// members no seed reached, yielding disjoint groups
fn local_sub_groups(
    blocks: &Arena<Block>,
    members: &BTreeSet<BlockId>,
    seeds: &[BlockId],
) -> Vec<BTreeSet<BlockId>> {
    let mut visited: BTreeSet<BlockId> = BTreeSet::new();
    let mut groups = Vec::new();
    let flood = |seed: BlockId, visited: &mut BTreeSet<BlockId>| -> BTreeSet<BlockId> {
        let mut group = BTreeSet::new();
        let mut stack = vec![seed];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            group.insert(current);
            if let Some(b) = blocks.get(current) {
                for &n in &b.neighbors {
                    if members.contains(&n) && !visited.contains(&n) {
                        stack.push(n);
                    }
                }
            }
        }
        group
    };
    for &seed in seeds {
        if !visited.contains(&seed) && members.contains(&seed) {
            groups.push(flood(seed, &mut visited));
        }
    }
    // Members untouched by any seed stay together as one group.
    let orphans: BTreeSet<BlockId> = members.difference(&visited).copied().collect();
    if !orphans.is_empty() {
        groups.push(orphans);
    }
    groups
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::math::Pose;
    use crate::physics::{BodyState, SimplePhysics};
    use crate::world::World;

    fn world() -> World<SimplePhysics> {
        World::new(SimplePhysics::new())
    }

    fn spawn_line(
        w: &mut World<SimplePhysics>,
        n: usize,
    ) -> (AssemblyId, Vec<BlockId>) {
        let assembly = w.create_assembly(Pose::IDENTITY);
        let blocks: Vec<BlockId> = (0..n)
            .map(|i| {
                let pose = Pose::from_position(Vec3::new(i as f32 * 1.1, 0.0, 0.0));
                w.spawn_block(assembly, pose).unwrap()
            })
            .collect();
        (assembly, blocks)
    }

    fn live_assemblies(w: &World<SimplePhysics>) -> Vec<(AssemblyId, usize)> {
        w.assemblies().map(|(id, a)| (id, a.block_count())).collect()
    }

    #[test]
    fn test_deleting_middle_block_splits_line_in_two() {
        // Scenario A: five in a row, the middle one goes.
        let mut w = world();
        let (assembly, blocks) = spawn_line(&mut w, 5);
        w.delete_block(blocks[2]);

        let assemblies = live_assemblies(&w);
        assert_eq!(assemblies.len(), 2);
        assert!(assemblies.iter().all(|&(_, n)| n == 2));
        // One half kept the original assembly.
        assert!(assemblies.iter().any(|&(id, _)| id == assembly));
        // Each half is internally connected and owns matching chunks.
        for (id, _) in assemblies {
            let a = w.assembly(id).unwrap();
            assert_eq!(a.chunks.len(), 1);
            let members = a.blocks.clone();
            let groups = connectivity::components(&w.blocks, &members);
            assert_eq!(groups.len(), 1);
        }
    }

    #[test]
    fn test_split_preserves_world_poses() {
        let mut w = world();
        let (_, blocks) = spawn_line(&mut w, 5);
        let before: Vec<Vec3> = blocks
            .iter()
            .map(|&b| w.block_world_position(b).unwrap())
            .collect();
        w.delete_block(blocks[2]);
        for (i, &b) in blocks.iter().enumerate() {
            if i == 2 {
                continue;
            }
            let after = w.block_world_position(b).unwrap();
            assert!(after.distance(before[i]) < 1e-5);
        }
    }

    #[test]
    fn test_sibling_inherits_velocity_and_damping() {
        let mut w = world();
        let (assembly, blocks) = spawn_line(&mut w, 5);
        let body = w.assembly(assembly).unwrap().body;
        let state = BodyState {
            linear_velocity: Vec3::new(1.0, 2.0, 3.0),
            angular_velocity: Vec3::new(0.0, 0.5, 0.0),
            linear_damping: 0.0,
            angular_damping: 0.05,
        };
        w.physics_mut().set_body_state(body, state);
        w.delete_block(blocks[2]);

        for (id, _) in w.assemblies() {
            let s = w.physics().body_state(w.assembly(id).unwrap().body).unwrap();
            assert_eq!(s.linear_velocity, state.linear_velocity);
            assert_eq!(s.angular_velocity, state.angular_velocity);
            assert_eq!(s.angular_damping, state.angular_damping);
        }
    }

    #[test]
    fn test_validation_is_idempotent_after_split() {
        let mut w = world();
        let (_, blocks) = spawn_line(&mut w, 5);
        w.delete_block(blocks[2]);
        let before = live_assemblies(&w);
        for (id, _) in before.clone() {
            w.validate(id);
        }
        w.step(0.0);
        assert_eq!(live_assemblies(&w), before);
    }

    #[test]
    fn test_largest_group_keeps_the_assembly() {
        let mut w = world();
        let (assembly, blocks) = spawn_line(&mut w, 6);
        // Removing index 1 leaves groups of size 1 and 4.
        w.delete_block(blocks[1]);
        let a = w.assembly(assembly).unwrap();
        assert_eq!(a.block_count(), 4);
        assert!(a.blocks.contains(&blocks[2]));
        assert!(!a.blocks.contains(&blocks[0]));
    }

    #[test]
    fn test_deferred_validation_resolves_manual_edge_removal() {
        let mut w = world();
        let (assembly, blocks) = spawn_line(&mut w, 4);
        // Sever the middle edge directly, as a constraint teardown would.
        if let Some(b) = w.blocks.get_mut(blocks[1]) {
            b.neighbors.remove(&blocks[2]);
        }
        if let Some(b) = w.blocks.get_mut(blocks[2]) {
            b.neighbors.remove(&blocks[1]);
        }
        w.queue_validation(assembly);
        w.step(0.0);
        let assemblies = live_assemblies(&w);
        assert_eq!(assemblies.len(), 2);
        assert!(assemblies.iter().all(|&(_, n)| n == 2));
    }

    #[test]
    fn test_empty_assembly_is_torn_down() {
        let mut w = world();
        let assembly = w.create_assembly(Pose::IDENTITY);
        let block = w.spawn_block(assembly, Pose::IDENTITY).unwrap();
        let body = w.assembly(assembly).unwrap().body;
        w.delete_block(block);
        w.step(0.0);
        assert!(w.assembly(assembly).is_none());
        assert!(w.physics().body_pose(body).is_none());
    }

    #[test]
    fn test_damper_joint_migrates_across_split() {
        // Scenario C: a chain with a damper hanging off its tail. Cutting
        // the chain moves the damper's start block to a sibling assembly
        // and the slider joint must follow with its tuning intact.
        let mut w = world();
        let (_, blocks) = spawn_line(&mut w, 4);
        let damper_block = w
            .spawn_connected(crate::world::SpawnKind::Damper, blocks[3], Vec3::new(3.9, 0.0, 0.0))
            .unwrap();
        let damper_id = match w.block(damper_block).unwrap().kind {
            crate::block::BlockKind::Damper(id) => id,
            _ => panic!("expected damper role"),
        };
        let old_joint = w.damper(damper_id).unwrap().joint.unwrap();
        let old_desc = *w.physics().joint_descriptor(old_joint).unwrap();
        let old_anchor = {
            let pose = w.assembly_frame_of_block(blocks[3]).unwrap().1;
            old_desc.world_anchor(&pose)
        };

        // Cutting at index 2 leaves {0,1} and {3,damper}, both of size
        // two; the earlier-seeded group keeps the assembly, so the damper
        // side moves to a sibling and the joint must be rebuilt.
        w.delete_block(blocks[2]);

        let d = w.damper(damper_id).unwrap();
        let new_joint = d.joint.unwrap();
        assert_ne!(new_joint, old_joint);
        assert!(w.physics().joint_descriptor(old_joint).is_none());
        let new_desc = *w.physics().joint_descriptor(new_joint).unwrap();
        let (crate::physics::JointParams::Slider(old_p), crate::physics::JointParams::Slider(new_p)) =
            (&old_desc.params, &new_desc.params)
        else {
            panic!("expected slider params");
        };
        assert_eq!(old_p.drive.position_spring, new_p.drive.position_spring);
        assert_eq!(old_p.limit.limit, new_p.limit.limit);

        let new_anchor = {
            let pose = w.assembly_frame_of_block(w.damper(damper_id).unwrap().start).unwrap().1;
            new_desc.world_anchor(&pose)
        };
        assert!(new_anchor.distance(old_anchor) < 1e-4);
    }

    #[test]
    fn test_failed_damper_migration_keeps_old_joint() {
        // Losing the far body mid-migration must abort locally: the link
        // keeps its original joint and the descriptor stays live.
        let mut w = world();
        let (_, blocks) = spawn_line(&mut w, 4);
        let damper_block = w
            .spawn_connected(crate::world::SpawnKind::Damper, blocks[3], Vec3::new(3.9, 0.0, 0.0))
            .unwrap();
        let damper_id = match w.block(damper_block).unwrap().kind {
            crate::block::BlockKind::Damper(id) => id,
            _ => panic!("expected damper role"),
        };
        let old_joint = w.damper(damper_id).unwrap().joint.unwrap();
        let end = w.damper(damper_id).unwrap().end;
        let end_body = w.assembly(w.block(end).unwrap().assembly).unwrap().body;
        w.physics_mut().destroy_body(end_body);

        // The cut moves the damper's start side to a sibling assembly.
        w.delete_block(blocks[2]);

        assert_eq!(w.damper(damper_id).unwrap().joint, Some(old_joint));
        assert!(w.physics().joint_descriptor(old_joint).is_some());
    }

    #[test]
    fn test_migration_without_source_joint_creates_nothing() {
        let mut w = world();
        let (_, blocks) = spawn_line(&mut w, 4);
        let host = w
            .spawn_connected(crate::world::SpawnKind::Bearing, blocks[3], Vec3::new(3.9, 0.0, 0.0))
            .unwrap();
        w.spawn_connected(
            crate::world::SpawnKind::Block,
            host,
            w.block_world_position(host).unwrap() + Vec3::X * 0.5,
        )
        .unwrap();
        let bearing_id = match w.block(host).unwrap().kind {
            crate::block::BlockKind::Bearing(id) => id,
            _ => panic!("expected bearing role"),
        };
        let old_joint = w.bearing(bearing_id).unwrap().joint.unwrap();
        // The backend lost the joint behind the core's back.
        w.physics_mut().destroy_joint(old_joint);

        w.delete_block(blocks[2]);

        // No tuning to duplicate, so nothing is created and the stale id
        // stays recorded.
        assert_eq!(w.bearing(bearing_id).unwrap().joint, Some(old_joint));
        assert_eq!(w.physics().joint_count(), 0);
    }

    #[test]
    fn test_unattached_bearing_survives_split_untouched() {
        let mut w = world();
        let (_, blocks) = spawn_line(&mut w, 4);
        let host = w
            .spawn_connected(crate::world::SpawnKind::Bearing, blocks[3], Vec3::new(3.9, 0.0, 0.0))
            .unwrap();
        let bearing_id = match w.block(host).unwrap().kind {
            crate::block::BlockKind::Bearing(id) => id,
            _ => panic!("expected bearing role"),
        };

        w.delete_block(blocks[2]);

        // The start side moved, but with no end there is no joint to move.
        let b = w.bearing(bearing_id).unwrap();
        assert_eq!(b.start, blocks[3]);
        assert!(b.end.is_none());
        assert!(b.joint.is_none());
        assert_eq!(w.physics().joint_count(), 0);
        assert_ne!(
            w.block(blocks[3]).unwrap().assembly,
            w.block(blocks[0]).unwrap().assembly
        );
    }

    #[test]
    fn test_bearing_joint_migrates_across_split() {
        let mut w = world();
        let (_, blocks) = spawn_line(&mut w, 4);
        // Bearing hosted on the tail block, completed by a block in a
        // fresh assembly on the far side of the hinge.
        let bearing_block = w
            .spawn_connected(crate::world::SpawnKind::Bearing, blocks[3], Vec3::new(3.9, 0.0, 0.0))
            .unwrap();
        let end_block = w
            .spawn_connected(
                crate::world::SpawnKind::Block,
                bearing_block,
                w.block_world_position(bearing_block).unwrap() + Vec3::X * 0.5,
            )
            .unwrap();
        let bearing_id = match w.block(bearing_block).unwrap().kind {
            crate::block::BlockKind::Bearing(id) => id,
            _ => panic!("expected bearing role"),
        };
        assert_eq!(w.bearing(bearing_id).unwrap().end, Some(end_block));
        let old_joint = w.bearing(bearing_id).unwrap().joint.unwrap();

        // Cut the chain so the bearing's start side splits off.
        w.delete_block(blocks[2]);

        let b = w.bearing(bearing_id).unwrap();
        let new_joint = b.joint.unwrap();
        assert_ne!(new_joint, old_joint);
        assert!(w.physics().joint_descriptor(old_joint).is_none());
        let desc = w.physics().joint_descriptor(new_joint).unwrap();
        assert!(matches!(desc.params, JointParams::Hinge(_)));
        // Both frames resolve the shared anchor to the same world point.
        let near_pose = w.assembly_frame_of_block(b.start).unwrap().1;
        let far_pose = w.assembly_frame_of_block(end_block).unwrap().1;
        let a0 = desc.world_anchor(&near_pose);
        let a1 = desc.world_connected_anchor(&far_pose);
        assert!(a0.distance(a1) < 1e-4);
    }
}
