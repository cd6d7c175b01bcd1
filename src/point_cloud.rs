use crate::context::StreamingContext;
use crate::metadata::{parse_metadata, Metadata, ReadMetadataError};
use crate::octree::aabb::create_child_aabb;
use crate::octree::loader::{BinaryLoader, LoadOutcome, LoaderError};
use crate::octree::node::{OctreeNode, OctreeNodeData, PointCloudGeometry};
use crate::resource::ResourceClient;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LoadPotreePointCloudError {
    #[error("Error loading metadata: {0}")]
    Metadata(#[from] ReadMetadataError),
}

/// A Potree 1.x point cloud: its `cloud.js` description, the root node and
/// the loader that streams node payloads through the shared context.
pub struct PotreePointCloud<C: ResourceClient> {
    metadata: Metadata,
    geometry: Arc<PointCloudGeometry>,
    root: OctreeNode,
    loader: BinaryLoader<C>,
}

impl<C: ResourceClient + 'static> PotreePointCloud<C> {
    /// Load a point cloud from the url of its `cloud.js`.
    /// Node files are looked up relative to it, under `octreeDir`.
    pub async fn from_url(
        url: &str,
        client: Arc<C>,
        context: Arc<StreamingContext>,
    ) -> Result<Self, LoadPotreePointCloudError> {
        let metadata = parse_metadata(url, &client).await?;
        Self::from_metadata(url, metadata, client, context)
    }

    pub fn from_metadata(
        url: &str,
        metadata: Metadata,
        client: Arc<C>,
        context: Arc<StreamingContext>,
    ) -> Result<Self, LoadPotreePointCloudError> {
        let geometry = Arc::new(metadata.point_cloud_geometry(url)?);

        let root = OctreeNode::new(
            geometry.clone(),
            OctreeNodeData {
                name: "r".to_string(),
                bounding_box: geometry.bounding_box,
                spacing: geometry.spacing,
                has_children: true,
                ..Default::default()
            },
        );

        debug!(
            url,
            version = %geometry.version,
            record_size = geometry.point_attributes.byte_size,
            "point cloud opened"
        );

        Ok(Self {
            metadata,
            geometry,
            root,
            loader: BinaryLoader::new(client, context),
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn geometry(&self) -> &Arc<PointCloudGeometry> {
        &self.geometry
    }

    pub fn root(&self) -> &OctreeNode {
        &self.root
    }

    pub fn loader(&self) -> &BinaryLoader<C> {
        &self.loader
    }

    /// Create child `index` (0..8) of `parent` and link it in.
    pub fn create_child(&self, parent: &OctreeNode, index: usize) -> OctreeNode {
        let data = {
            let inner = parent.borrow();
            OctreeNodeData {
                name: format!("{}{}", inner.data.name, index),
                bounding_box: create_child_aabb(&inner.data.bounding_box, index),
                spacing: inner.data.spacing / 2.0,
                level: inner.data.level + 1,
                ..Default::default()
            }
        };

        let child = OctreeNode::new(self.geometry.clone(), data);
        parent.add_child(child.clone());
        child
    }

    pub fn load(
        &self,
        node: &OctreeNode,
    ) -> impl Future<Output = Result<LoadOutcome, LoaderError>> + Send + 'static {
        self.loader.load(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StreamingConfig;
    use crate::metadata::tests::CLOUD_JS;
    use crate::resource::{ResourceClient, ResourceError};
    use async_trait::async_trait;
    use glam::DVec3;
    use std::collections::BTreeMap;

    struct CloudJsClient;

    #[async_trait]
    impl ResourceClient for CloudJsClient {
        async fn get(
            &self,
            url: &str,
            _headers: Option<BTreeMap<String, String>>,
        ) -> Result<Vec<u8>, ResourceError> {
            match url {
                "http://host/lion/cloud.js" => Ok(CLOUD_JS.as_bytes().to_vec()),
                _ => Err(ResourceError::NotFound(url.to_string())),
            }
        }
    }

    fn context() -> Arc<StreamingContext> {
        StreamingContext::new(StreamingConfig {
            worker_count: 1,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn opens_cloud_and_builds_children() {
        let cloud = PotreePointCloud::from_url(
            "http://host/lion/cloud.js",
            Arc::new(CloudJsClient),
            context(),
        )
        .await
        .unwrap();

        let root = cloud.root();
        assert_eq!(root.url(), "http://host/lion/data/r/r");

        let child = cloud.create_child(root, 7);
        let grandchild = cloud.create_child(&child, 2);
        let inner = grandchild.borrow();
        assert_eq!(inner.data.name, "r72");
        assert_eq!(inner.data.level, 2);
        assert_eq!(inner.data.spacing, 0.125);
        assert_eq!(inner.data.bounding_box.min, DVec3::new(4.0, 6.0, 4.0));
        assert_eq!(inner.data.bounding_box.max, DVec3::new(6.0, 8.0, 6.0));
        drop(inner);
        assert_eq!(root.children().len(), 1);
    }

    #[tokio::test]
    async fn missing_cloud_js_is_a_metadata_error() {
        let result = PotreePointCloud::from_url(
            "http://host/missing/cloud.js",
            Arc::new(CloudJsClient),
            context(),
        )
        .await;

        assert!(matches!(
            result,
            Err(LoadPotreePointCloudError::Metadata(ReadMetadataError::ResourceError(
                ResourceError::NotFound(_)
            )))
        ));
    }
}
