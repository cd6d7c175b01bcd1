pub mod aabb;
pub mod decoder;
pub mod geometry;
pub mod loader;
pub mod node;
pub mod snapshot;

pub mod point_attributes;
