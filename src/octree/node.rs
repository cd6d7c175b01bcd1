use crate::octree::aabb::Aabb;
use crate::octree::geometry::GeometryPayload;
use crate::octree::point_attributes::PointAttributes;
use crate::octree::snapshot::OctreeNodeSnapshot;
use crate::version::Version;
use glam::DVec3;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Nodes are stored under `<octree_dir>/<hierarchy path>/<name>` from this version on.
const HIERARCHY_PATHS: Version = Version::new(1, 5);

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(0);

#[derive(Clone, Debug, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Properties shared by every node of one point cloud.
#[derive(Debug, Clone)]
pub struct PointCloudGeometry {
    pub url: String,
    pub octree_dir: String,
    pub version: Version,
    pub projection: String,
    /// Total points in the cloud as declared by `cloud.js`.
    pub num_points: u64,
    pub spacing: f64,
    pub scale: DVec3,
    pub offset: DVec3,
    /// Bounds of the whole cloud, translated so that `offset` is the origin.
    pub bounding_box: Aabb,
    /// Bounds of the actual points, in the same frame as `bounding_box`.
    pub tight_bounding_box: Option<Aabb>,
    pub hierarchy_step_size: usize,
    pub point_attributes: Arc<PointAttributes>,
}

#[derive(Clone, Debug, Default)]
pub struct OctreeNodeData {
    pub name: String,
    pub bounding_box: Aabb,
    pub spacing: f64,
    pub level: u32,
    pub has_children: bool,
    pub num_points: usize,
    pub loaded: bool,
    pub loading: bool,
    pub geometry: Option<GeometryPayload>,
    pub estimated_spacing: Option<f64>,
}

#[derive(Debug, Default)]
pub struct OctreeNodeInner {
    pub data: OctreeNodeData,
    pub parent: Option<ParentOctreeNode>,
    pub children: Vec<OctreeNode>,
    /// Bumped when a load is cancelled; a load started under an older generation is stale.
    pub(crate) generation: u64,
}

#[derive(Clone, Debug)]
pub struct OctreeNode {
    id: NodeId,
    point_cloud: Arc<PointCloudGeometry>,
    inner: Arc<Mutex<OctreeNodeInner>>,
}

#[derive(Clone, Debug)]
pub struct ParentOctreeNode {
    id: NodeId,
    point_cloud: Arc<PointCloudGeometry>,
    inner: Weak<Mutex<OctreeNodeInner>>,
}

impl OctreeNode {
    pub fn new(point_cloud: Arc<PointCloudGeometry>, data: OctreeNodeData) -> Self {
        Self {
            id: NodeId::next(),
            point_cloud,
            inner: Arc::new(Mutex::new(OctreeNodeInner {
                data,
                parent: None,
                children: Vec::new(),
                generation: 0,
            })),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn point_cloud(&self) -> &Arc<PointCloudGeometry> {
        &self.point_cloud
    }

    /// Exclusive access to the node state. Never hold it across an `.await`.
    pub fn borrow(&self) -> MutexGuard<'_, OctreeNodeInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> String {
        self.borrow().data.name.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.borrow().data.loaded
    }

    pub fn is_loading(&self) -> bool {
        self.borrow().data.loading
    }

    pub fn num_points(&self) -> usize {
        self.borrow().data.num_points
    }

    pub fn has_geometry(&self) -> bool {
        self.borrow().data.geometry.is_some()
    }

    /// Add a child and update both parent/child links
    pub fn add_child(&self, child: OctreeNode) {
        child.borrow().parent = Some(self.into());

        let mut inner = self.borrow();
        inner.children.push(child);
        inner.data.has_children = true;
    }

    /// Return all children (cloned handles)
    pub fn children(&self) -> Vec<OctreeNode> {
        self.borrow().children.clone()
    }

    /// Return the parent, if it is still alive
    pub fn parent(&self) -> Option<OctreeNode> {
        let parent = self.borrow().parent.clone()?;
        parent.inner.upgrade().map(|inner| OctreeNode {
            id: parent.id,
            point_cloud: parent.point_cloud,
            inner,
        })
    }

    /// Location of the node's binary file, without the version dependent suffix.
    pub fn url(&self) -> String {
        let point_cloud = &self.point_cloud;
        let name = self.name();

        if point_cloud.version.at_least(HIERARCHY_PATHS) {
            format!(
                "{}/{}/{}",
                point_cloud.octree_dir,
                hierarchy_path(&name, point_cloud.hierarchy_step_size),
                name
            )
        } else {
            format!("{}/{}", point_cloud.octree_dir, name)
        }
    }

    /// Release the decoded payload and flip the node back to unloaded.
    ///
    /// Only the cache calls this, so residency and the cache entry stay in
    /// step. Returns `false` if there was nothing to release.
    pub(crate) fn dispose(&self) -> bool {
        let mut inner = self.borrow();
        let data = &mut inner.data;

        if !data.loaded && data.geometry.is_none() {
            return false;
        }

        data.geometry = None;
        data.estimated_spacing = None;
        data.loaded = false;
        true
    }

    /// Invalidate the load in flight, if any. Its result will be discarded.
    pub(crate) fn cancel_load(&self) -> bool {
        let mut inner = self.borrow();
        if !inner.data.loading {
            return false;
        }
        inner.generation += 1;
        true
    }

    pub fn snapshot(&self) -> OctreeNodeSnapshot {
        let (mut snapshot, children) = {
            let inner = self.borrow();
            (OctreeNodeSnapshot::from(&inner.data), inner.children.clone())
        };
        snapshot.children = children.iter().map(OctreeNode::snapshot).collect();
        snapshot
    }
}

impl From<&OctreeNode> for ParentOctreeNode {
    fn from(node: &OctreeNode) -> Self {
        ParentOctreeNode {
            id: node.id,
            point_cloud: node.point_cloud.clone(),
            inner: Arc::downgrade(&node.inner),
        }
    }
}

/// `r` followed by the node indices split into `step`-sized directories.
/// The trailing partial group stays in the file name only.
fn hierarchy_path(name: &str, step: usize) -> String {
    let mut path = String::from("r");
    if step == 0 {
        return path;
    }

    let indices: Vec<char> = name.chars().skip(1).collect();
    for part in indices.chunks(step).take(indices.len() / step) {
        path.push('/');
        path.extend(part);
    }
    path
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::octree::point_attributes::PointAttributeKind;

    pub(crate) fn point_cloud(version: Version) -> Arc<PointCloudGeometry> {
        Arc::new(PointCloudGeometry {
            url: "http://host/cloud.js".to_string(),
            octree_dir: "http://host/data".to_string(),
            version,
            projection: String::new(),
            num_points: 0,
            spacing: 1.0,
            scale: DVec3::splat(0.001),
            offset: DVec3::ZERO,
            bounding_box: Aabb::new(DVec3::ZERO, DVec3::splat(8.0)),
            tight_bounding_box: None,
            hierarchy_step_size: 2,
            point_attributes: Arc::new(
                PointAttributes::new([PointAttributeKind::PositionCartesian]).unwrap(),
            ),
        })
    }

    pub(crate) fn node(name: &str, version: Version) -> OctreeNode {
        OctreeNode::new(
            point_cloud(version),
            OctreeNodeData {
                name: name.to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn url_depends_on_version() {
        assert_eq!(
            node("r01234", Version::new(1, 7)).url(),
            "http://host/data/r/01/23/r01234"
        );
        assert_eq!(node("r0", Version::new(1, 7)).url(), "http://host/data/r/r0");
        assert_eq!(node("r01234", Version::new(1, 4)).url(), "http://host/data/r01234");
    }

    #[test]
    fn dispose_releases_payload_once() {
        let node = node("r", Version::new(1, 7));
        {
            let mut inner = node.borrow();
            inner.data.loaded = true;
            inner.data.geometry = Some(GeometryPayload::new(
                Vec::new(),
                Aabb::default(),
                DVec3::ZERO,
            ));
        }

        assert!(node.dispose());
        assert!(!node.is_loaded());
        assert!(!node.has_geometry());
        assert!(!node.dispose());
        assert_eq!(node.borrow().generation, 0);
    }

    #[test]
    fn only_a_loading_node_can_be_cancelled() {
        let node = node("r", Version::new(1, 7));
        assert!(!node.cancel_load());
        assert_eq!(node.borrow().generation, 0);

        node.borrow().data.loading = true;
        assert!(node.cancel_load());
        assert_eq!(node.borrow().generation, 1);
    }

    #[test]
    fn children_link_back_to_parent() {
        let root = node("r", Version::new(1, 7));
        let child = OctreeNode::new(
            root.point_cloud().clone(),
            OctreeNodeData {
                name: "r3".to_string(),
                level: 1,
                ..Default::default()
            },
        );
        root.add_child(child.clone());

        assert!(root.borrow().data.has_children);
        assert_eq!(child.parent().map(|p| p.id()), Some(root.id()));
        assert_eq!(root.snapshot().iter().map(|s| s.name.clone()).collect::<Vec<_>>(), ["r", "r3"]);
    }
}
