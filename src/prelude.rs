pub use crate::config::StreamingConfig;
pub use crate::context::StreamingContext;
pub use crate::lru::LruCache;
pub use crate::octree::aabb::Aabb;
pub use crate::octree::geometry::{BufferAttribute, GeometryPayload, TypedArray};
pub use crate::octree::loader::{BinaryLoader, LoadOutcome};
pub use crate::octree::node::{NodeId, OctreeNode, OctreeNodeData, PointCloudGeometry};
pub use crate::octree::point_attributes::{PointAttributeKind, PointAttributes};
pub use crate::octree::snapshot::OctreeNodeSnapshot;
pub use crate::point_cloud::PotreePointCloud;
pub use crate::resource::ResourceClient;
pub use crate::version::Version;
pub use crate::worker_pool::WorkerPool;

// Error types
pub use crate::config::ConfigError;
pub use crate::metadata::ReadMetadataError;
pub use crate::octree::decoder::DecodeError;
pub use crate::octree::loader::LoaderError;
pub use crate::octree::point_attributes::SchemaError;
pub use crate::point_cloud::LoadPotreePointCloudError;
pub use crate::resource::ResourceError;
pub use crate::worker_pool::WorkerPoolError;
