//! Incremental grid construction
//!
//! Loading thousands of blocks at once must not run a validation per
//! block. [`GridSpawner`] suspends validation on the target assembly,
//! keeps its body kinematic, spawns and connects blocks in bounded
//! batches across calls, and on completion resumes validation and queues
//! exactly one pass for the whole batch.

use glam::Vec3;

use crate::assembly::AssemblyId;
use crate::block::BlockId;
use crate::math::Pose;
use crate::physics::PhysicsBackend;

use super::World;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Spawning,
    Connecting,
    Done,
}

/// Batched spawner for a regular grid of cube blocks
pub struct GridSpawner {
    assembly: AssemblyId,
    origin: Vec3,
    size: (u32, u32, u32),
    spacing: f32,
    blocks_per_call: usize,
    cursor: usize,
    phase: Phase,
    spawned: Vec<BlockId>,
}

impl GridSpawner {
    /// Begin building a `size` grid around a fresh assembly at `origin`.
    /// The assembly stays kinematic and validation-suspended until the
    /// grid is complete.
    pub fn new<P: PhysicsBackend>(
        world: &mut World<P>,
        origin: Vec3,
        size: (u32, u32, u32),
        spacing: f32,
        blocks_per_call: usize,
    ) -> Self {
        let assembly = world.create_assembly(Pose::from_position(origin));
        if let Some(a) = world.assembly(assembly) {
            let body = a.body;
            world.physics_mut().set_kinematic(body, true);
        }
        world.set_suspend_validation(assembly, true);
        let total = (size.0 * size.1 * size.2) as usize;
        Self {
            assembly,
            origin,
            size,
            spacing,
            blocks_per_call: blocks_per_call.max(1),
            cursor: 0,
            phase: Phase::Spawning,
            spawned: Vec::with_capacity(total),
        }
    }

    /// The assembly being built
    pub fn assembly(&self) -> AssemblyId {
        self.assembly
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    fn grid_position(&self, index: usize) -> Vec3 {
        let (_, sy, sz) = self.size;
        let per_x = (sy * sz) as usize;
        let x = index / per_x;
        let y = (index % per_x) / sz as usize;
        let z = index % sz as usize;
        self.origin + Vec3::new(x as f32, y as f32, z as f32) * self.spacing
    }

    /// Perform one bounded batch of work. Returns `true` once the grid is
    /// fully built and handed back to normal simulation.
    pub fn advance<P: PhysicsBackend>(&mut self, world: &mut World<P>) -> bool {
        let total = (self.size.0 * self.size.1 * self.size.2) as usize;
        match self.phase {
            Phase::Spawning => {
                let batch = self.blocks_per_call.min(total - self.cursor);
                for _ in 0..batch {
                    let pose = Pose::from_position(self.grid_position(self.cursor));
                    match world.insert_block(self.assembly, pose, false) {
                        Ok(block) => self.spawned.push(block),
                        Err(err) => {
                            tracing::warn!(%err, "grid spawn aborted");
                            self.phase = Phase::Done;
                            return true;
                        }
                    }
                    self.cursor += 1;
                }
                if self.cursor == total {
                    self.cursor = 0;
                    self.phase = Phase::Connecting;
                }
            }
            Phase::Connecting => {
                let batch = self.blocks_per_call.min(self.spawned.len() - self.cursor);
                for _ in 0..batch {
                    world.discover_connections(self.spawned[self.cursor]);
                    self.cursor += 1;
                }
                if self.cursor == self.spawned.len() {
                    self.finish(world);
                }
            }
            Phase::Done => {}
        }
        self.is_done()
    }

    fn finish<P: PhysicsBackend>(&mut self, world: &mut World<P>) {
        world.set_suspend_validation(self.assembly, false);
        world.queue_validation(self.assembly);
        if let Some(a) = world.assembly(self.assembly) {
            let body = a.body;
            world.physics_mut().set_kinematic(body, false);
        }
        tracing::debug!(blocks = self.spawned.len(), "grid construction finished");
        self.phase = Phase::Done;
    }
}
