//! Spawning blocks and constraint links into the world

use glam::Vec3;

use crate::assembly::AssemblyId;
use crate::bearing::{Bearing, BearingId, hinge_descriptor};
use crate::block::{Block, BlockId, BlockKind};
use crate::constants::DEFAULT_SPAWN_OFFSET;
use crate::damper::{Damper, DamperId, DamperVisual, slider_descriptor};
use crate::math::Pose;
use crate::physics::PhysicsBackend;

use super::World;

/// What to place when spawning onto an existing block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnKind {
    Block,
    Bearing,
    Damper,
}

/// Failure to spawn a block or link
#[derive(Debug, Clone, thiserror::Error)]
pub enum SpawnError {
    #[error("block not found")]
    UnknownBlock,
    #[error("block has no connection point")]
    NoConnectionPoint,
    #[error("assembly has no live rigid body")]
    MissingBody,
}

impl<P: PhysicsBackend> World<P> {
    /// Spawn a standalone cube block into `assembly` at a world pose,
    /// discovering connections to nearby members
    pub fn spawn_block(
        &mut self,
        assembly: AssemblyId,
        world_pose: Pose,
    ) -> Result<BlockId, SpawnError> {
        self.insert_block(assembly, world_pose, true)
    }

    /// Spawn something onto an existing block near a world-space hit
    /// point: the new element snaps to the closest connection point,
    /// offset outward along the point's normal.
    ///
    /// Spawning a plain block onto an unattached bearing does not grow
    /// the parent assembly; it completes the hinge with a fresh assembly
    /// instead.
    pub fn spawn_connected(
        &mut self,
        kind: SpawnKind,
        parent: BlockId,
        hit_point: Vec3,
    ) -> Result<BlockId, SpawnError> {
        let parent_pose = self
            .block_world_pose(parent)
            .ok_or(SpawnError::UnknownBlock)?;
        let p = self.blocks.get(parent).ok_or(SpawnError::UnknownBlock)?;
        let parent_assembly = p.assembly;
        let parent_kind = p.kind;
        let index = p
            .closest_connection_point(&parent_pose, hit_point)
            .ok_or(SpawnError::NoConnectionPoint)?;
        let point = p
            .connection_point_world(&parent_pose, index)
            .ok_or(SpawnError::NoConnectionPoint)?;
        let spawn_pose = Pose::new(
            point.position + point.forward() * DEFAULT_SPAWN_OFFSET,
            point.rotation,
        );

        if kind == SpawnKind::Block
            && let BlockKind::Bearing(id) = parent_kind
            && self.bearings.get(id).is_some_and(|b| b.end.is_none())
        {
            return self.complete_bearing(id, spawn_pose);
        }

        let block = self.insert_block(parent_assembly, spawn_pose, true)?;
        self.link_blocks(parent, block);
        self.queue_validation(parent_assembly);

        match kind {
            SpawnKind::Block => {}
            SpawnKind::Bearing => {
                let id = self.bearings.insert(Bearing::new(
                    parent,
                    block,
                    self.bearing_config(),
                ));
                if let Some(b) = self.blocks.get_mut(parent) {
                    b.bearings.push(id);
                }
                if let Some(b) = self.blocks.get_mut(block) {
                    b.kind = BlockKind::Bearing(id);
                }
            }
            SpawnKind::Damper => {
                self.init_damper(parent, block, &point)?;
            }
        }
        Ok(block)
    }

    /// Insert a cube block into an assembly at a world pose, stored as a
    /// local pose relative to the assembly body
    pub(crate) fn insert_block(
        &mut self,
        assembly: AssemblyId,
        world_pose: Pose,
        discover: bool,
    ) -> Result<BlockId, SpawnError> {
        let (_, body_pose) = self.assembly_frame(assembly).ok_or(SpawnError::MissingBody)?;
        let local = body_pose.inverse().mul(&world_pose);
        let block = self.blocks.insert(Block::cube(assembly, local));
        if let Some(a) = self.assemblies.get_mut(assembly) {
            a.blocks.insert(block);
        }
        self.assign_to_chunk(assembly, block);
        if discover {
            self.discover_connections(block);
        }
        Ok(block)
    }

    /// Attach an end block to an unattached bearing. The end block owns a
    /// fresh assembly and the hinge joint connects the two assembly
    /// bodies; no connection edge crosses the assembly boundary.
    fn complete_bearing(
        &mut self,
        id: BearingId,
        spawn_pose: Pose,
    ) -> Result<BlockId, SpawnError> {
        let bearing = self.bearings.get(id).ok_or(SpawnError::UnknownBlock)?;
        let start = bearing.start;
        let params = bearing.params();
        let (start_body, start_frame) = self
            .assembly_frame_of_block(start)
            .ok_or(SpawnError::MissingBody)?;
        let start_pos = self
            .block_world_position(start)
            .ok_or(SpawnError::MissingBody)?;

        let assembly = self.create_assembly(Pose::new(spawn_pose.position, start_frame.rotation));
        let end = self.insert_block(assembly, spawn_pose, false)?;
        if let Some(b) = self.blocks.get_mut(end) {
            b.bearings.push(id);
        }
        if let Some(b) = self.bearings.get_mut(id) {
            b.end = Some(end);
        }

        let (end_body, end_frame) = self
            .assembly_frame(assembly)
            .ok_or(SpawnError::MissingBody)?;
        let end_pos = spawn_pose.position;
        let desc = hinge_descriptor(
            start_body,
            &start_frame,
            end_body,
            &end_frame,
            start_pos,
            end_pos,
            params,
        );
        let joint = self.physics.create_joint(desc);
        if let Some(b) = self.bearings.get_mut(id) {
            b.joint = Some(joint);
        }
        tracing::debug!(?id, "bearing attached");
        Ok(end)
    }

    /// Build the damper link for a freshly spawned damper block: a
    /// synthetic terminal block in its own assembly out along the spawn
    /// direction, and a slider joint between the two assembly bodies
    fn init_damper(
        &mut self,
        start: BlockId,
        damper_block: BlockId,
        point: &Pose,
    ) -> Result<DamperId, SpawnError> {
        let config = self.damper_config();
        let spawn_direction = point.forward();
        let current_length = config.default_length;
        let half_total_length = (current_length + 1.0) * 0.5;

        let start_pose = self
            .block_world_pose(start)
            .ok_or(SpawnError::UnknownBlock)?;
        let start_pos = start_pose.position;
        let end_pos = start_pos + spawn_direction * half_total_length;

        let end_assembly = self.create_assembly(Pose::from_position(end_pos));
        let end = self.insert_block(
            end_assembly,
            Pose::new(end_pos, start_pose.rotation),
            false,
        )?;

        let mut damper = Damper {
            start,
            end,
            block: damper_block,
            joint: None,
            spawn_direction,
            current_length,
            config,
            visual: DamperVisual::default(),
        };
        let params = damper.params();
        let (start_body, start_frame) = self
            .assembly_frame_of_block(start)
            .ok_or(SpawnError::MissingBody)?;
        let (end_body, end_frame) = self
            .assembly_frame(end_assembly)
            .ok_or(SpawnError::MissingBody)?;
        let desc = slider_descriptor(
            start_body,
            &start_frame,
            end_body,
            &end_frame,
            start_pos,
            end_pos,
            spawn_direction,
            half_total_length,
            params,
        );
        damper.joint = Some(self.physics.create_joint(desc));
        damper
            .visual
            .update(start_pos, end_pos, config.cylinder_diameter);

        let id = self.dampers.insert(damper);
        if let Some(b) = self.blocks.get_mut(start) {
            b.dampers.push(id);
        }
        if let Some(b) = self.blocks.get_mut(end) {
            b.dampers.push(id);
            b.kind = BlockKind::DamperEnd(id);
        }
        if let Some(b) = self.blocks.get_mut(damper_block) {
            b.kind = BlockKind::Damper(id);
        }
        tracing::debug!(?id, "damper initialized");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::physics::{JointParams, SimplePhysics};

    fn world() -> World<SimplePhysics> {
        World::new(SimplePhysics::new())
    }

    #[test]
    fn test_spawn_connected_snaps_to_closest_face() {
        let mut w = world();
        let assembly = w.create_assembly(Pose::IDENTITY);
        let parent = w.spawn_block(assembly, Pose::IDENTITY).unwrap();
        let child = w
            .spawn_connected(SpawnKind::Block, parent, Vec3::new(0.4, 0.1, 0.0))
            .unwrap();
        let pos = w.block_world_position(child).unwrap();
        assert_relative_eq!(pos.x, 0.75, epsilon = 1e-5);
        assert_relative_eq!(pos.y, 0.0, epsilon = 1e-5);
        assert!(w.block(parent).unwrap().neighbors.contains(&child));
        assert_eq!(w.block(child).unwrap().assembly, assembly);
        assert_eq!(w.pending_validation_count(), 1);
    }

    #[test]
    fn test_spawn_connected_on_missing_block_fails() {
        let mut w = world();
        let assembly = w.create_assembly(Pose::IDENTITY);
        let block = w.spawn_block(assembly, Pose::IDENTITY).unwrap();
        w.delete_block(block);
        assert!(matches!(
            w.spawn_connected(SpawnKind::Block, block, Vec3::ZERO),
            Err(SpawnError::UnknownBlock)
        ));
    }

    #[test]
    fn test_bearing_spawn_leaves_link_unattached() {
        let mut w = world();
        let assembly = w.create_assembly(Pose::IDENTITY);
        let parent = w.spawn_block(assembly, Pose::IDENTITY).unwrap();
        let host = w
            .spawn_connected(SpawnKind::Bearing, parent, Vec3::new(0.6, 0.0, 0.0))
            .unwrap();
        let BlockKind::Bearing(id) = w.block(host).unwrap().kind else {
            panic!("expected bearing role");
        };
        let bearing = w.bearing(id).unwrap();
        assert_eq!(bearing.start, parent);
        assert_eq!(bearing.block, host);
        assert!(bearing.end.is_none());
        assert!(bearing.joint.is_none());
        assert!(w.block(parent).unwrap().bearings.contains(&id));
        // The host block joins the parent assembly like a regular member.
        assert_eq!(w.block(host).unwrap().assembly, assembly);
    }

    #[test]
    fn test_completing_a_bearing_spawns_a_separate_assembly() {
        let mut w = world();
        let assembly = w.create_assembly(Pose::IDENTITY);
        let parent = w.spawn_block(assembly, Pose::IDENTITY).unwrap();
        let host = w
            .spawn_connected(SpawnKind::Bearing, parent, Vec3::new(0.6, 0.0, 0.0))
            .unwrap();
        let end = w
            .spawn_connected(
                SpawnKind::Block,
                host,
                w.block_world_position(host).unwrap() + Vec3::X * 0.5,
            )
            .unwrap();
        let BlockKind::Bearing(id) = w.block(host).unwrap().kind else {
            panic!("expected bearing role");
        };
        let bearing = w.bearing(id).unwrap();
        assert_eq!(bearing.end, Some(end));
        let joint = bearing.joint.unwrap();
        let end_assembly = w.block(end).unwrap().assembly;
        assert_ne!(end_assembly, assembly);
        // No connection edge crosses the assembly boundary.
        assert!(w.block(host).unwrap().neighbors.iter().all(|&n| n != end));
        assert!(w.block(end).unwrap().neighbors.is_empty());
        // The hinge spans the two bodies and anchors at the end block.
        let desc = w.physics().joint_descriptor(joint).unwrap();
        assert!(matches!(desc.params, JointParams::Hinge(_)));
        let near_pose = w.assembly_frame(assembly).unwrap().1;
        let world_anchor = desc.world_anchor(&near_pose);
        let end_pos = w.block_world_position(end).unwrap();
        assert_relative_eq!(world_anchor.distance(end_pos), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_damper_spawn_builds_terminal_block_and_joint() {
        let mut w = world();
        let assembly = w.create_assembly(Pose::IDENTITY);
        let parent = w.spawn_block(assembly, Pose::IDENTITY).unwrap();
        let host = w
            .spawn_connected(SpawnKind::Damper, parent, Vec3::new(0.6, 0.0, 0.0))
            .unwrap();
        let BlockKind::Damper(id) = w.block(host).unwrap().kind else {
            panic!("expected damper role");
        };
        let d = w.damper(id).unwrap();
        assert_eq!(d.start, parent);
        assert_eq!(d.block, host);
        assert_eq!(d.spawn_direction, Vec3::X);
        // Rest length 3 puts the terminal block (3 + 1) / 2 out from the
        // start block, in an assembly of its own.
        let end = d.end;
        let end_pos = w.block_world_position(end).unwrap();
        assert_relative_eq!(end_pos.x, 2.0, epsilon = 1e-5);
        assert_ne!(w.block(end).unwrap().assembly, assembly);
        assert!(matches!(w.block(end).unwrap().kind, BlockKind::DamperEnd(x) if x == id));
        let desc = w.physics().joint_descriptor(d.joint.unwrap()).unwrap();
        let JointParams::Slider(params) = desc.params else {
            panic!("expected slider params");
        };
        assert_relative_eq!(params.limit.limit, 3.0, epsilon = 1e-6);
        // Distance equals half the total length, so the connected anchor
        // back-projects exactly onto the start block.
        let end_frame = w.assembly_frame_of_block(end).unwrap().1;
        let anchor = desc.world_connected_anchor(&end_frame);
        assert_relative_eq!(anchor.distance(Vec3::ZERO), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_deleting_damper_host_removes_terminal_assembly() {
        let mut w = world();
        let assembly = w.create_assembly(Pose::IDENTITY);
        let parent = w.spawn_block(assembly, Pose::IDENTITY).unwrap();
        let host = w
            .spawn_connected(SpawnKind::Damper, parent, Vec3::new(0.6, 0.0, 0.0))
            .unwrap();
        let BlockKind::Damper(id) = w.block(host).unwrap().kind else {
            panic!("expected damper role");
        };
        let d = w.damper(id).unwrap();
        let end = d.end;
        let end_assembly = w.block(end).unwrap().assembly;
        let joint = d.joint.unwrap();

        assert!(w.delete_block(host));
        assert!(w.damper(id).is_none());
        assert!(w.block(end).is_none());
        assert!(w.physics().joint_descriptor(joint).is_none());
        assert!(w.block(parent).unwrap().dampers.is_empty());
        // The emptied terminal assembly is torn down at the step boundary.
        w.step(0.0);
        assert!(w.assembly(end_assembly).is_none());
    }

    #[test]
    fn test_visual_proxy_refreshes_each_step() {
        let mut w = world();
        let assembly = w.create_assembly(Pose::IDENTITY);
        let parent = w.spawn_block(assembly, Pose::IDENTITY).unwrap();
        let host = w
            .spawn_connected(SpawnKind::Damper, parent, Vec3::new(0.6, 0.0, 0.0))
            .unwrap();
        let BlockKind::Damper(id) = w.block(host).unwrap().kind else {
            panic!("expected damper role");
        };
        let end_body = w
            .assembly(w.block(w.damper(id).unwrap().end).unwrap().assembly)
            .unwrap()
            .body;
        // Drift the terminal body outward and step.
        w.physics_mut()
            .set_body_pose(end_body, Pose::from_position(Vec3::new(3.0, 0.0, 0.0)));
        w.step(0.0);
        let visual = w.damper(id).unwrap().visual;
        assert_relative_eq!(visual.length, 3.0, epsilon = 1e-5);
        assert_relative_eq!(visual.position.x, 1.5, epsilon = 1e-5);
    }
}
