use crate::octree::aabb::Aabb;
use crate::octree::node::OctreeNodeData;

/// Point-in-time copy of a node's load state, without its buffers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OctreeNodeSnapshot {
    pub name: String,
    pub bounding_box: Aabb,
    pub spacing: f64,
    pub level: u32,
    pub num_points: usize,
    pub loaded: bool,
    pub loading: bool,
    pub geometry_bytes: Option<usize>,
    pub estimated_spacing: Option<f64>,
    pub children: Vec<OctreeNodeSnapshot>,
}

impl From<&OctreeNodeData> for OctreeNodeSnapshot {
    fn from(data: &OctreeNodeData) -> Self {
        Self {
            name: data.name.clone(),
            bounding_box: data.bounding_box,
            spacing: data.spacing,
            level: data.level,
            num_points: data.num_points,
            loaded: data.loaded,
            loading: data.loading,
            geometry_bytes: data.geometry.as_ref().map(|g| g.byte_len()),
            estimated_spacing: data.estimated_spacing,
            children: Vec::new(),
        }
    }
}

pub struct SnapshotIter<'a> {
    stack: Vec<&'a OctreeNodeSnapshot>,
}

impl<'a> Iterator for SnapshotIter<'a> {
    type Item = &'a OctreeNodeSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some(node)
    }
}

impl OctreeNodeSnapshot {
    pub fn iter(&self) -> SnapshotIter<'_> {
        SnapshotIter { stack: vec![self] }
    }

    /// Points held by loaded nodes in this subtree.
    pub fn resident_points(&self) -> usize {
        self.iter()
            .filter(|node| node.loaded)
            .map(|node| node.num_points)
            .sum()
    }
}
