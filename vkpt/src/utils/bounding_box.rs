use std::ops::{Add, AddAssign};

use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().collect()
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn is_set(&self) -> bool {
        self.min.x <= self.max.x
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vec3 {
        if self.is_set() {
            self.max - self.min
        } else {
            Vec3::ZERO
        }
    }

    pub fn half_area(&self) -> f32 {
        let extent = self.extent();

        extent.x * extent.y + extent.y * extent.z + extent.z * extent.x
    }

    /// Returns the longest axis (0 = x, 1 = y, 2 = z).
    pub fn longest_axis(&self) -> usize {
        let extent = self.extent();

        if extent.x >= extent.y && extent.x >= extent.z {
            0
        } else if extent.y >= extent.z {
            1
        } else {
            2
        }
    }

    /// Slab test; returns distance at which the ray enters the box, if it
    /// does so before `t_max`.
    pub fn hit(&self, origin: Vec3, inv_dir: Vec3, t_max: f32) -> Option<f32> {
        if !self.is_set() {
            return None;
        }

        let t0 = (self.min - origin) * inv_dir;
        let t1 = (self.max - origin) * inv_dir;
        let near = t0.min(t1).max_element().max(0.0);
        let far = t0.max(t1).min_element().min(t_max);

        (near <= far).then_some(near)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Vec3::MAX, Vec3::MIN)
    }
}

impl Add<Vec3> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Vec3) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<Vec3> for BoundingBox {
    fn add_assign(&mut self, rhs: Vec3) {
        self.min = self.min.min(rhs);
        self.max = self.max.max(rhs);
    }
}

impl Add<Self> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<Self> for BoundingBox {
    fn add_assign(&mut self, rhs: Self) {
        self.min = self.min.min(rhs.min);
        self.max = self.max.max(rhs.max);
    }
}

impl FromIterator<Vec3> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Vec3>,
    {
        let mut this = Self::default();

        for item in iter {
            this += item;
        }

        this
    }
}

#[cfg(test)]
mod tests {
    use glam::vec3;

    use super::*;

    #[test]
    fn grow() {
        let bb = BoundingBox::from_points([vec3(1.0, 2.0, 3.0), vec3(-1.0, 4.0, 0.0)]);

        assert_eq!(vec3(-1.0, 2.0, 0.0), bb.min());
        assert_eq!(vec3(1.0, 4.0, 3.0), bb.max());
        assert_eq!(2, bb.longest_axis());
        assert_eq!(2.0 * 2.0 + 2.0 * 3.0 + 3.0 * 2.0, bb.half_area());
    }

    #[test]
    fn empty() {
        let bb = BoundingBox::default();

        assert!(!bb.is_set());
        assert_eq!(0.0, bb.half_area());
        assert_eq!(None, bb.hit(Vec3::ZERO, Vec3::ONE, f32::MAX));
    }

    #[test]
    fn hit() {
        let bb = BoundingBox::new(vec3(-1.0, -1.0, -6.0), vec3(1.0, 1.0, -4.0));
        let inv_dir = 1.0 / vec3(0.0, 0.0, -1.0);

        assert_eq!(Some(4.0), bb.hit(Vec3::ZERO, inv_dir, 100.0));
        assert_eq!(None, bb.hit(Vec3::ZERO, inv_dir, 3.0));
        assert_eq!(None, bb.hit(vec3(5.0, 0.0, 0.0), inv_dir, 100.0));
        assert_eq!(None, bb.hit(Vec3::ZERO, -inv_dir, 100.0));
    }
}
