//! Spatial chunks
//!
//! A chunk is a capacity-bounded sub-grouping of one assembly's blocks.
//! It is bookkeeping only (it keeps per-group work bounded for very large
//! assemblies) and never a physics object.

use std::collections::BTreeSet;

use crate::arena::{Arena, Handle};
use crate::assembly::AssemblyId;
use crate::block::{Block, BlockId};
use crate::constants::CHUNK_CAPACITY;

/// Handle to a chunk
pub type ChunkId = Handle<Chunk>;

/// Capacity-bounded block container belonging to one assembly
#[derive(Debug, Clone)]
pub struct Chunk {
    pub blocks: BTreeSet<BlockId>,
    pub assembly: AssemblyId,
}

impl Chunk {
    /// An empty chunk for the given assembly
    pub fn new(assembly: AssemblyId) -> Self {
        Self {
            blocks: BTreeSet::new(),
            assembly,
        }
    }

    pub fn is_full(&self) -> bool {
        self.blocks.len() >= CHUNK_CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Connected sub-groups of a single chunk's blocks, traversing only edges
/// whose both endpoints live in this chunk.
///
/// Used as a cheap local pre-check: more than one sub-group means the chunk
/// is internally disconnected and the whole assembly needs validation.
pub fn chunk_sub_groups(
    chunk_id: ChunkId,
    chunk: &Chunk,
    blocks: &Arena<Block>,
) -> Vec<BTreeSet<BlockId>> {
    let mut visited: BTreeSet<BlockId> = BTreeSet::new();
    let mut groups = Vec::new();

    for &start in &chunk.blocks {
        if visited.contains(&start) || !blocks.contains(start) {
            continue;
        }
        let mut group = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            group.insert(current);
            let Some(block) = blocks.get(current) else {
                continue;
            };
            for &neighbor in &block.neighbors {
                let in_chunk = blocks
                    .get(neighbor)
                    .is_some_and(|b| b.chunk == Some(chunk_id));
                if in_chunk && !visited.contains(&neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        groups.push(group);
    }
    groups
}
