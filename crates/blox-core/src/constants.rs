//! Global constants for blox-core

/// Maximum number of blocks per spatial chunk
pub const CHUNK_CAPACITY: usize = 100;

/// Default radius of the proximity query around each connection point
pub const DEFAULT_CHECK_RADIUS: f32 = 0.5;

/// Default offset of a newly spawned block along the connection point normal
pub const DEFAULT_SPAWN_OFFSET: f32 = 0.25;

/// Member count above which connectivity analysis switches from flood fill
/// to union-find
pub const UNION_FIND_THRESHOLD: usize = 100;

/// Default half extent of a standard cube block's connection point layout
pub const DEFAULT_BLOCK_HALF_EXTENT: f32 = 0.5;
