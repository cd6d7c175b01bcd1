use crate::octree::aabb::Aabb;
use crate::octree::node::PointCloudGeometry;
use crate::octree::point_attributes::{PointAttributes, SchemaError};
use crate::resource::{ResourceClient, ResourceError};
use crate::version::{ParseVersionError, Version};
use glam::DVec3;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

const DEFAULT_HIERARCHY_STEP_SIZE: usize = 5;

pub async fn parse_metadata<C: ResourceClient>(
    url: &str,
    client: &C,
) -> Result<Metadata, ReadMetadataError> {
    Ok(client.get_json(url, None).await?)
}

#[derive(Error, Debug)]
pub enum ReadMetadataError {
    #[error("Invalid json: {0}")]
    JsonError(#[from] serde_json::error::Error),

    #[error("Resource error: {0}")]
    ResourceError(#[from] ResourceError),

    #[error("Invalid version: {0}")]
    Version(#[from] ParseVersionError),

    #[error("Invalid point attributes: {0}")]
    Schema(#[from] SchemaError),
}

/// Contents of a Potree 1.x `cloud.js`.
#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub version: String,
    pub octree_dir: String,
    #[serde(default)]
    pub projection: String,
    #[serde(default)]
    pub points: u64,
    pub bounding_box: BoundingBox,
    pub tight_bounding_box: Option<BoundingBox>,
    pub point_attributes: Vec<String>,
    pub spacing: f64,
    pub scale: f64,
    pub hierarchy_step_size: Option<usize>,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
    pub ux: f64,
    pub uy: f64,
    pub uz: f64,
}

impl From<BoundingBox> for Aabb {
    fn from(bb: BoundingBox) -> Self {
        Aabb::new(DVec3::new(bb.lx, bb.ly, bb.lz), DVec3::new(bb.ux, bb.uy, bb.uz))
    }
}

impl Metadata {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ReadMetadataError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn version(&self) -> Result<Version, ParseVersionError> {
        self.version.parse()
    }

    /// Shared geometry description. `octree_dir` is resolved against the
    /// directory that holds `cloud.js`; bounds are moved so that the cloud
    /// minimum becomes the origin.
    pub fn point_cloud_geometry(&self, url: &str) -> Result<PointCloudGeometry, ReadMetadataError> {
        let base = url.rsplit_once('/').map(|(base, _)| base).unwrap_or("");
        let octree_dir = if base.is_empty() {
            self.octree_dir.clone()
        } else {
            format!("{}/{}", base, self.octree_dir)
        };

        let bounding_box: Aabb = self.bounding_box.into();
        let offset = bounding_box.min;

        Ok(PointCloudGeometry {
            url: url.to_string(),
            octree_dir,
            version: self.version()?,
            projection: self.projection.clone(),
            num_points: self.points,
            spacing: self.spacing,
            scale: DVec3::splat(self.scale),
            offset,
            bounding_box: bounding_box.translated_to_origin(),
            tight_bounding_box: self.tight_bounding_box.map(|tight| {
                let tight: Aabb = tight.into();
                Aabb::new(tight.min - offset, tight.max - offset)
            }),
            hierarchy_step_size: self.hierarchy_step_size.unwrap_or(DEFAULT_HIERARCHY_STEP_SIZE),
            point_attributes: Arc::new(PointAttributes::from_names(self.point_attributes.as_slice())?),
        })
    }
}
