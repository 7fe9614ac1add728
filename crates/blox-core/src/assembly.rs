//! Assemblies
//!
//! An assembly is a maximal group of blocks sharing one rigid body: the
//! physics identity of everything the player has snapped together. The
//! heavy lifecycle operations (registration, validation, splitting) live on
//! [`World`](crate::world::World), which owns the arenas; this module holds
//! the data and the validation flags.

use std::collections::BTreeSet;

use crate::arena::Handle;
use crate::block::BlockId;
use crate::chunk::ChunkId;
use crate::physics::BodyId;

/// Handle to an assembly
pub type AssemblyId = Handle<Assembly>;

/// A rigid group of blocks with one physics body
#[derive(Debug, Clone)]
pub struct Assembly {
    /// The backing rigid body; exclusively owned by this assembly
    pub body: BodyId,
    /// Member blocks (non-owning; block destruction is driven by deletion)
    pub blocks: BTreeSet<BlockId>,
    /// Chunks partitioning the member set
    pub chunks: Vec<ChunkId>,
    /// Suppresses validation entirely during bulk construction
    pub suspend_validation: bool,
    /// Guard so at most one validation is pending at a time
    pub(crate) validation_queued: bool,
}

impl Assembly {
    /// A fresh assembly backed by the given body
    pub fn new(body: BodyId) -> Self {
        Self {
            body,
            blocks: BTreeSet::new(),
            chunks: Vec::new(),
            suspend_validation: false,
            validation_queued: false,
        }
    }

    /// Number of member blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
