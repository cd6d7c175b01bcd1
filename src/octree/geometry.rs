use crate::octree::aabb::Aabb;
use crate::octree::decoder::DecodedAttribute;
use glam::DVec3;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    F32(Vec<f32>),
    U8(Vec<u8>),
}

impl TypedArray {
    pub fn len(&self) -> usize {
        match self {
            TypedArray::F32(values) => values.len(),
            TypedArray::U8(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn byte_len(&self) -> usize {
        match self {
            TypedArray::F32(values) => values.len() * 4,
            TypedArray::U8(values) => values.len(),
        }
    }
}

/// A vertex attribute as the renderer consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferAttribute {
    pub array: TypedArray,
    pub item_size: usize,
    pub normalized: bool,
}

impl BufferAttribute {
    pub fn new(array: TypedArray, item_size: usize) -> Self {
        Self {
            array,
            item_size,
            normalized: false,
        }
    }

    pub fn normalized(array: TypedArray, item_size: usize) -> Self {
        Self {
            array,
            item_size,
            normalized: true,
        }
    }

    /// Number of points covered by this attribute.
    pub fn count(&self) -> usize {
        self.array.len() / self.item_size
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeometryPayload {
    pub attributes: BTreeMap<&'static str, BufferAttribute>,
    /// Extent of the points, with `min` at the origin.
    pub tight_bounding_box: Aabb,
    pub mean: DVec3,
}

impl GeometryPayload {
    pub fn new(decoded: Vec<DecodedAttribute>, tight_bounding_box: Aabb, mean: DVec3) -> Self {
        let mut attributes = BTreeMap::new();

        for attribute in decoded {
            let (name, buffer) = match attribute {
                DecodedAttribute::Position(values) => {
                    ("position", BufferAttribute::new(TypedArray::F32(values), 3))
                }
                DecodedAttribute::Color(values) => (
                    "color",
                    BufferAttribute::normalized(TypedArray::U8(values), 4),
                ),
                DecodedAttribute::Intensity(values) => {
                    ("intensity", BufferAttribute::new(TypedArray::F32(values), 1))
                }
                DecodedAttribute::Classification(values) => (
                    "classification",
                    BufferAttribute::new(TypedArray::U8(values), 1),
                ),
                DecodedAttribute::NormalSpheremapped(values)
                | DecodedAttribute::NormalOct16(values)
                | DecodedAttribute::Normal(values) => {
                    ("normal", BufferAttribute::new(TypedArray::F32(values), 3))
                }
                DecodedAttribute::Indices(values) => (
                    "indices",
                    BufferAttribute::normalized(TypedArray::U8(values), 4),
                ),
                DecodedAttribute::Spacing(values) => {
                    ("spacing", BufferAttribute::new(TypedArray::F32(values), 1))
                }
            };
            attributes.insert(name, buffer);
        }

        Self {
            attributes,
            tight_bounding_box: tight_bounding_box.translated_to_origin(),
            mean,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&BufferAttribute> {
        self.attributes.get(name)
    }

    pub fn byte_len(&self) -> usize {
        self.attributes.values().map(|a| a.array.byte_len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_and_layouts() {
        let payload = GeometryPayload::new(
            vec![
                DecodedAttribute::Position(vec![0.0; 6]),
                DecodedAttribute::Color(vec![0; 8]),
                DecodedAttribute::NormalOct16(vec![0.0; 6]),
                DecodedAttribute::Indices(vec![0; 8]),
                DecodedAttribute::Spacing(vec![0.0; 2]),
            ],
            Aabb::new(DVec3::new(1.0, 2.0, 3.0), DVec3::new(5.0, 6.0, 9.0)),
            DVec3::ONE,
        );

        let color = payload.attribute("color").unwrap();
        assert_eq!((color.item_size, color.normalized), (4, true));
        assert_eq!(color.count(), 2);

        let normal = payload.attribute("normal").unwrap();
        assert_eq!((normal.item_size, normal.normalized), (3, false));

        let indices = payload.attribute("indices").unwrap();
        assert!(indices.normalized);
        assert_eq!(payload.attribute("spacing").unwrap().count(), 2);
        assert_eq!(payload.byte_len(), 24 + 8 + 24 + 8 + 8);

        assert_eq!(payload.tight_bounding_box.min, DVec3::ZERO);
        assert_eq!(payload.tight_bounding_box.max, DVec3::new(4.0, 4.0, 6.0));
    }
}
