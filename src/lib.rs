//! Streaming loader for Potree 1.x octree point clouds.
//!
//! Node payloads are fetched on demand through a [`resource::ResourceClient`],
//! decoded on a fixed [`worker_pool::WorkerPool`], attached to their
//! [`octree::node::OctreeNode`] and kept resident in an [`lru::LruCache`]
//! bounded by point count. All shared state lives in a
//! [`context::StreamingContext`] owned by the host.

pub mod config;
pub mod context;
pub mod lru;
pub mod metadata;
pub mod octree;
pub mod point_cloud;
pub mod prelude;
pub mod resource;
pub mod version;
pub mod worker_pool;

pub use metadata::{parse_metadata, Metadata, ReadMetadataError};
