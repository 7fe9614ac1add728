//! Block Assembly Core Data Structures
//!
//! This crate contains the connectivity core of the block sandbox:
//! - Block: unit of construction with connection points
//! - Assembly: rigid group of blocks sharing one physics body
//! - Chunk: fixed-capacity partition of an assembly
//! - Bearing / Damper: constraint links between assemblies
//! - World: arenas, validation scheduling and split resolution

pub mod arena;
pub mod assembly;
pub mod bearing;
pub mod block;
pub mod chunk;
pub mod config;
pub mod connectivity;
pub mod constants;
pub mod damper;
pub mod math;
pub mod physics;
pub mod world;

pub use arena::*;
pub use assembly::*;
pub use bearing::*;
pub use block::*;
pub use chunk::*;
pub use config::*;
pub use constants::*;
pub use damper::*;
pub use math::*;
pub use world::*;
