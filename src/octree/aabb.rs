use glam::DVec3;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that any `expand` call will overwrite.
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn size(&self) -> DVec3 {
        if self.is_empty() {
            DVec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn volume(&self) -> f64 {
        let size = self.size();
        size.x * size.y * size.z
    }

    /// Same extent, moved so that `min` sits on the origin.
    pub fn translated_to_origin(&self) -> Aabb {
        Aabb::new(DVec3::ZERO, self.size())
    }
}

/// Bounds of child `index` (0..8); bit 2 selects x, bit 1 y, bit 0 z.
pub fn create_child_aabb(aabb: &Aabb, index: usize) -> Aabb {
    let mut min = aabb.min;
    let mut max = aabb.max;
    let size = (max - min) * 0.5;

    if (index & 0b0001) > 0 {
        min.z += size.z;
    } else {
        max.z -= size.z;
    }
    if (index & 0b0010) > 0 {
        min.y += size.y;
    } else {
        max.y -= size.y;
    }
    if (index & 0b0100) > 0 {
        min.x += size.x;
    } else {
        max.x -= size.x;
    }

    Aabb::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_keeps_only_the_extent() {
        let tight = Aabb::new(DVec3::new(1.0, 2.0, 3.0), DVec3::new(5.0, 6.0, 9.0));
        let translated = tight.translated_to_origin();
        assert_eq!(translated.min, DVec3::ZERO);
        assert_eq!(translated.max, DVec3::new(4.0, 4.0, 6.0));
    }

    #[test]
    fn empty_box_grows_from_points() {
        let mut aabb = Aabb::empty();
        assert!(aabb.is_empty());
        assert_eq!(aabb.translated_to_origin(), Aabb::default());

        aabb.expand(DVec3::new(1.0, -1.0, 0.5));
        aabb.expand(DVec3::new(-2.0, 3.0, 0.5));
        assert_eq!(aabb.min, DVec3::new(-2.0, -1.0, 0.5));
        assert_eq!(aabb.max, DVec3::new(1.0, 3.0, 0.5));
        assert_eq!(aabb.volume(), 0.0);
    }

    #[test]
    fn child_boxes_split_the_parent() {
        let parent = Aabb::new(DVec3::ZERO, DVec3::splat(8.0));
        assert_eq!(create_child_aabb(&parent, 0), Aabb::new(DVec3::ZERO, DVec3::splat(4.0)));
        assert_eq!(
            create_child_aabb(&parent, 5),
            Aabb::new(DVec3::new(4.0, 0.0, 4.0), DVec3::new(8.0, 4.0, 8.0))
        );
    }
}
