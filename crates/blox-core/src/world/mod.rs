//! The sandbox world: arenas, scheduling and assembly management
//!
//! [`World`] owns every arena (blocks, assemblies, chunks, constraint
//! links) and the physics backend, and is the single authority mutating
//! them. Validation never runs inline with a mutation: mutations mark an
//! assembly dirty via [`World::queue_validation`] and the pending set is
//! flushed once per [`World::step`], so all mutations issued within one
//! step are observed by a single validation pass.

mod bulk;
mod connect;
mod spawn;
mod split;

use glam::Vec3;

use crate::arena::Arena;
use crate::assembly::{Assembly, AssemblyId};
use crate::bearing::{Bearing, BearingId};
use crate::block::{Block, BlockId};
use crate::chunk::{Chunk, ChunkId, chunk_sub_groups};
use crate::config::{AssemblySettings, BearingConfig, DamperConfig};
use crate::damper::{Damper, DamperId};
use crate::math::Pose;
use crate::physics::{BodyId, BodyState, PhysicsBackend};

pub use bulk::GridSpawner;
pub use spawn::{SpawnError, SpawnKind};
pub use split::MigrationError;

/// Owner of all core state, generic over the physics collaborator
pub struct World<P: PhysicsBackend> {
    pub(crate) physics: P,
    pub(crate) blocks: Arena<Block>,
    pub(crate) assemblies: Arena<Assembly>,
    pub(crate) chunks: Arena<Chunk>,
    pub(crate) bearings: Arena<Bearing>,
    pub(crate) dampers: Arena<Damper>,
    pending_validations: Vec<AssemblyId>,
    settings: AssemblySettings,
    bearing_config: BearingConfig,
    damper_config: DamperConfig,
}

impl<P: PhysicsBackend> World<P> {
    /// A world with default tuning records
    pub fn new(physics: P) -> Self {
        Self::with_configs(
            physics,
            AssemblySettings::default(),
            BearingConfig::default(),
            DamperConfig::default(),
        )
    }

    /// A world with explicit tuning records; configuration is read-only
    /// from here on
    pub fn with_configs(
        physics: P,
        settings: AssemblySettings,
        bearing_config: BearingConfig,
        damper_config: DamperConfig,
    ) -> Self {
        Self {
            physics,
            blocks: Arena::new(),
            assemblies: Arena::new(),
            chunks: Arena::new(),
            bearings: Arena::new(),
            dampers: Arena::new(),
            pending_validations: Vec::new(),
            settings,
            bearing_config,
            damper_config,
        }
    }

    /// The physics backend
    pub fn physics(&self) -> &P {
        &self.physics
    }

    /// Mutable access to the physics backend
    pub fn physics_mut(&mut self) -> &mut P {
        &mut self.physics
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn assembly(&self, id: AssemblyId) -> Option<&Assembly> {
        self.assemblies.get(id)
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    pub fn bearing(&self, id: BearingId) -> Option<&Bearing> {
        self.bearings.get(id)
    }

    pub fn damper(&self, id: DamperId) -> Option<&Damper> {
        self.dampers.get(id)
    }

    /// Iterate live assemblies in slot order
    pub fn assemblies(&self) -> impl Iterator<Item = (AssemblyId, &Assembly)> {
        self.assemblies.iter()
    }

    /// Iterate live blocks in slot order
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks.iter()
    }

    /// Number of validations waiting for the next step boundary
    pub fn pending_validation_count(&self) -> usize {
        self.pending_validations.len()
    }

    /// Create an empty assembly with a fresh rigid body at `pose`
    pub fn create_assembly(&mut self, pose: Pose) -> AssemblyId {
        let body = self.physics.create_body(pose);
        self.physics.set_body_state(
            body,
            BodyState {
                linear_damping: self.settings.linear_damping,
                angular_damping: self.settings.angular_damping,
                ..BodyState::default()
            },
        );
        self.assemblies.insert(Assembly::new(body))
    }

    /// Body and pose of an assembly, when both are live
    pub(crate) fn assembly_frame(&self, assembly: AssemblyId) -> Option<(BodyId, Pose)> {
        let body = self.assemblies.get(assembly)?.body;
        let pose = self.physics.body_pose(body)?;
        Some((body, pose))
    }

    /// Body and pose of a block's owning assembly
    pub(crate) fn assembly_frame_of_block(&self, block: BlockId) -> Option<(BodyId, Pose)> {
        self.assembly_frame(self.blocks.get(block)?.assembly)
    }

    /// World pose of a block
    pub fn block_world_pose(&self, block: BlockId) -> Option<Pose> {
        let b = self.blocks.get(block)?;
        let (_, body_pose) = self.assembly_frame(b.assembly)?;
        Some(body_pose.mul(&b.local_pose))
    }

    /// World position of a block
    pub fn block_world_position(&self, block: BlockId) -> Option<Vec3> {
        self.block_world_pose(block).map(|p| p.position)
    }

    /// Re-home a block into `assembly`. Registration is exclusive: the
    /// block is explicitly removed from any prior owner and chunk first.
    pub fn register_block(&mut self, assembly: AssemblyId, block: BlockId) {
        let Some(b) = self.blocks.get(block) else {
            return;
        };
        let previous = b.assembly;
        let already_member = previous == assembly
            && self
                .assemblies
                .get(assembly)
                .is_some_and(|a| a.blocks.contains(&block));
        if already_member {
            return;
        }
        if previous != assembly
            && let Some(prev) = self.assemblies.get_mut(previous)
        {
            prev.blocks.remove(&block);
        }
        // Unconditional: a block may hold a chunk slot even when its
        // member-set entry is gone, and it must never end up in two chunks.
        self.remove_from_chunk(block);
        if let Some(b) = self.blocks.get_mut(block) {
            b.assembly = assembly;
        }
        if let Some(a) = self.assemblies.get_mut(assembly) {
            a.blocks.insert(block);
        }
        self.assign_to_chunk(assembly, block);
    }

    /// Place a block in the first chunk with spare capacity, creating a
    /// fresh chunk when every existing one is full
    pub fn assign_to_chunk(&mut self, assembly: AssemblyId, block: BlockId) {
        let Some(a) = self.assemblies.get(assembly) else {
            return;
        };
        let target = a
            .chunks
            .iter()
            .copied()
            .find(|&id| self.chunks.get(id).is_some_and(|c| !c.is_full()));
        let chunk_id = match target {
            Some(id) => id,
            None => {
                let id = self.chunks.insert(Chunk::new(assembly));
                if let Some(a) = self.assemblies.get_mut(assembly) {
                    a.chunks.push(id);
                }
                id
            }
        };
        if let Some(chunk) = self.chunks.get_mut(chunk_id) {
            chunk.blocks.insert(block);
        }
        if let Some(b) = self.blocks.get_mut(block) {
            b.chunk = Some(chunk_id);
        }
    }

    /// Detach a block from its chunk; an emptied chunk is destroyed and
    /// removed from its assembly's chunk list
    pub(crate) fn remove_from_chunk(&mut self, block: BlockId) {
        let Some(chunk_id) = self.blocks.get(block).and_then(|b| b.chunk) else {
            return;
        };
        if let Some(b) = self.blocks.get_mut(block) {
            b.chunk = None;
        }
        let Some(chunk) = self.chunks.get_mut(chunk_id) else {
            return;
        };
        chunk.blocks.remove(&block);
        if chunk.is_empty() {
            let assembly = chunk.assembly;
            self.chunks.remove(chunk_id);
            if let Some(a) = self.assemblies.get_mut(assembly) {
                a.chunks.retain(|&c| c != chunk_id);
            }
        }
    }

    /// Cheap local pre-check: flood the chunk's internal edges and queue a
    /// full assembly validation when the chunk is internally disconnected
    pub fn check_chunk_integrity(&mut self, chunk_id: ChunkId) {
        let Some(chunk) = self.chunks.get(chunk_id) else {
            return;
        };
        if chunk.blocks.len() < 2 {
            return;
        }
        let assembly = chunk.assembly;
        let groups = chunk_sub_groups(chunk_id, chunk, &self.blocks);
        if groups.len() > 1 {
            tracing::debug!(
                sub_groups = groups.len(),
                "chunk internally disconnected, escalating to assembly validation"
            );
            self.queue_validation(assembly);
        }
    }

    /// Mark an assembly for validation at the next step boundary.
    /// Idempotent, and suppressed entirely while validation is suspended.
    pub fn queue_validation(&mut self, assembly: AssemblyId) {
        let Some(a) = self.assemblies.get_mut(assembly) else {
            return;
        };
        if a.validation_queued || a.suspend_validation {
            return;
        }
        a.validation_queued = true;
        self.pending_validations.push(assembly);
    }

    /// Toggle bulk-construction mode on an assembly. Callers are expected
    /// to queue one validation after resuming.
    pub fn set_suspend_validation(&mut self, assembly: AssemblyId, suspend: bool) {
        if let Some(a) = self.assemblies.get_mut(assembly) {
            a.suspend_validation = suspend;
        }
    }

    /// Advance one simulation step: integrate, flush pending validations,
    /// refresh damper visual proxies
    pub fn step(&mut self, dt: f32) {
        self.physics.step(dt);
        self.flush_validations();
        self.update_damper_visuals();
    }

    fn flush_validations(&mut self) {
        let pending = std::mem::take(&mut self.pending_validations);
        for assembly in pending {
            // The assembly may have been destroyed since it was queued.
            let Some(a) = self.assemblies.get_mut(assembly) else {
                continue;
            };
            a.validation_queued = false;
            self.validate(assembly);
        }
    }

    fn update_damper_visuals(&mut self) {
        let ids: Vec<DamperId> = self.dampers.handles().collect();
        for id in ids {
            let Some(d) = self.dampers.get(id) else {
                continue;
            };
            let (Some(start), Some(end)) = (
                self.block_world_position(d.start),
                self.block_world_position(d.end),
            ) else {
                continue;
            };
            let diameter = d.config.cylinder_diameter;
            if let Some(d) = self.dampers.get_mut(id) {
                d.visual.update(start, end, diameter);
            }
        }
    }

    pub(crate) fn bearing_config(&self) -> BearingConfig {
        self.bearing_config
    }

    pub(crate) fn damper_config(&self) -> DamperConfig {
        self.damper_config
    }
}
