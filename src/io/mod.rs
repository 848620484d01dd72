// io/mod.rs

// File-based map sources for runs without a live map topic.

pub mod map_file;

pub use map_file::{MapMetadata, load_map, map_from_image};
