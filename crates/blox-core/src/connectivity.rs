//! Connected-component analysis over an assembly's member set
//!
//! Stateless: takes the block arena plus the member set and partitions the
//! members into maximal connected components, traversing only edges whose
//! both endpoints are members. Three interchangeable implementations:
//!
//! - iterative flood fill, used below [`UNION_FIND_THRESHOLD`] members;
//! - union-find with path compression and union by rank, used above it;
//! - label propagation over an immutable edge snapshot, the bulk variant
//!   (parallel relaxation under the `parallel` feature).
//!
//! All three return identical partitions, with components ordered by first
//! discovery in member iteration order so the "primary" component of a
//! split is deterministic.

use std::collections::{BTreeSet, HashMap};

use crate::arena::Arena;
use crate::block::{Block, BlockId};
use crate::constants::UNION_FIND_THRESHOLD;

/// Partition the member set, choosing the algorithm by member count
pub fn components(blocks: &Arena<Block>, members: &BTreeSet<BlockId>) -> Vec<BTreeSet<BlockId>> {
    if members.len() > UNION_FIND_THRESHOLD {
        components_union_find(blocks, members)
    } else {
        components_flood_fill(blocks, members)
    }
}

/// Stack-based flood fill per unvisited member
pub fn components_flood_fill(
    blocks: &Arena<Block>,
    members: &BTreeSet<BlockId>,
) -> Vec<BTreeSet<BlockId>> {
    let mut visited: BTreeSet<BlockId> = BTreeSet::new();
    let mut groups = Vec::new();

    for &start in members {
        if visited.contains(&start) {
            continue;
        }
        let mut group = BTreeSet::new();
        let mut stack = vec![start];
        visited.insert(start);
        while let Some(current) = stack.pop() {
            group.insert(current);
            let Some(block) = blocks.get(current) else {
                continue;
            };
            for &neighbor in &block.neighbors {
                if members.contains(&neighbor)
                    && blocks.contains(neighbor)
                    && visited.insert(neighbor)
                {
                    stack.push(neighbor);
                }
            }
        }
        groups.push(group);
    }
    groups
}

struct UnionFind {
    parent: Vec<u32>,
    rank: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n as u32).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        // Path compression.
        let mut current = x;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra as usize].cmp(&self.rank[rb as usize]) {
            std::cmp::Ordering::Less => self.parent[ra as usize] = rb,
            std::cmp::Ordering::Greater => self.parent[rb as usize] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb as usize] = ra;
                self.rank[ra as usize] += 1;
            }
        }
    }
}

/// Union-find over a flat index of the members
pub fn components_union_find(
    blocks: &Arena<Block>,
    members: &BTreeSet<BlockId>,
) -> Vec<BTreeSet<BlockId>> {
    let ordered: Vec<BlockId> = members.iter().copied().collect();
    let index: HashMap<BlockId, u32> = ordered
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i as u32))
        .collect();

    let mut uf = UnionFind::new(ordered.len());
    for (i, &id) in ordered.iter().enumerate() {
        let Some(block) = blocks.get(id) else {
            continue;
        };
        for neighbor in &block.neighbors {
            if let Some(&j) = index.get(neighbor) {
                uf.union(i as u32, j);
            }
        }
    }

    group_by_root(&ordered, |i| uf.find(i))
}

/// Min-label propagation to a fixed point over an immutable edge snapshot.
///
/// At the fixed point every member's label equals the minimum label of its
/// connected component, which yields the same partition as the traversal
/// algorithms.
pub fn components_label_propagation(
    blocks: &Arena<Block>,
    members: &BTreeSet<BlockId>,
) -> Vec<BTreeSet<BlockId>> {
    let ordered: Vec<BlockId> = members.iter().copied().collect();
    let index: HashMap<BlockId, u32> = ordered
        .iter()
        .enumerate()
        .map(|(i, &id)| (id, i as u32))
        .collect();

    // Snapshot edges before relaxation starts; the parallel phase never
    // touches the live graph.
    let edges: Vec<Vec<u32>> = ordered
        .iter()
        .map(|&id| {
            blocks
                .get(id)
                .map(|block| {
                    block
                        .neighbors
                        .iter()
                        .filter_map(|n| index.get(n).copied())
                        .collect()
                })
                .unwrap_or_default()
        })
        .collect();

    let mut labels: Vec<u32> = (0..ordered.len() as u32).collect();
    loop {
        let (next, changed) = relax(&labels, &edges);
        labels = next;
        if !changed {
            break;
        }
    }

    group_by_root(&ordered, |i| labels[i as usize])
}

#[cfg(feature = "parallel")]
fn relax(labels: &[u32], edges: &[Vec<u32>]) -> (Vec<u32>, bool) {
    use rayon::prelude::*;
    let next: Vec<u32> = labels
        .par_iter()
        .enumerate()
        .map(|(i, &label)| {
            edges[i]
                .iter()
                .fold(label, |acc, &j| acc.min(labels[j as usize]))
        })
        .collect();
    let changed = next != labels;
    (next, changed)
}

#[cfg(not(feature = "parallel"))]
fn relax(labels: &[u32], edges: &[Vec<u32>]) -> (Vec<u32>, bool) {
    let mut next = labels.to_vec();
    let mut changed = false;
    for (i, neighbors) in edges.iter().enumerate() {
        let mut label = next[i];
        for &j in neighbors {
            label = label.min(next[j as usize]);
        }
        if label != next[i] {
            next[i] = label;
            changed = true;
        }
    }
    (next, changed)
}

/// Group members by representative, ordering components by the first member
/// that introduced each representative.
fn group_by_root(ordered: &[BlockId], mut root_of: impl FnMut(u32) -> u32) -> Vec<BTreeSet<BlockId>> {
    let mut root_to_group: HashMap<u32, usize> = HashMap::new();
    let mut groups: Vec<BTreeSet<BlockId>> = Vec::new();
    for (i, &id) in ordered.iter().enumerate() {
        let root = root_of(i as u32);
        let slot = *root_to_group.entry(root).or_insert_with(|| {
            groups.push(BTreeSet::new());
            groups.len() - 1
        });
        groups[slot].insert(id);
    }
    groups
}
