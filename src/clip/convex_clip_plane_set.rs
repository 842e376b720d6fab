use nalgebra::{Matrix4, Point3, Vector3};

use crate::{
    bounding_box::BoundingBox,
    misc::{FloatingPoint, Transformable},
};

use super::{ClipPlane, ClipStatus, OnPlaneHandling};

/// Intersection of half-spaces
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvexClipPlaneSet<T: FloatingPoint> {
    planes: Vec<ClipPlane<T>>,
}

impl<T: FloatingPoint> ConvexClipPlaneSet<T> {
    pub fn new(planes: Vec<ClipPlane<T>>) -> Self {
        Self { planes }
    }

    /// Unit square `[0, 1]^2` of the xy plane, extruded along z
    pub fn unit_square() -> Self {
        let planes = [
            (Vector3::x(), T::zero()),
            (-Vector3::x(), -T::one()),
            (Vector3::y(), T::zero()),
            (-Vector3::y(), -T::one()),
        ]
        .into_iter()
        .filter_map(|(n, d)| ClipPlane::try_new(n, d, false, false).ok())
        .collect();
        Self { planes }
    }

    pub fn planes(&self) -> &[ClipPlane<T>] {
        &self.planes
    }

    pub fn push(&mut self, plane: ClipPlane<T>) {
        self.planes.push(plane);
    }

    pub fn is_point_inside(&self, point: &Point3<T>, tolerance: T) -> bool {
        self.planes
            .iter()
            .all(|p| p.is_point_on_or_inside(point, tolerance))
    }

    /// Clip a polygon through every plane in turn
    pub fn clip_polygon_in_place(
        &self,
        polygon: &mut Vec<Point3<T>>,
        work: &mut Vec<Point3<T>>,
        on_plane: OnPlaneHandling,
        tolerance: T,
    ) {
        for plane in self.planes.iter() {
            if polygon.is_empty() {
                break;
            }
            plane.convex_polygon_clip_in_place(polygon, work, on_plane, tolerance);
        }
    }

    pub fn clip_polygon(&self, polygon: &[Point3<T>], tolerance: T) -> Vec<Point3<T>> {
        let mut clipped = polygon.to_vec();
        let mut work = vec![];
        self.clip_polygon_in_place(&mut clipped, &mut work, OnPlaneHandling::Clip, tolerance);
        clipped
    }

    /// Inside fraction interval of the segment `p0-p1`
    pub fn clip_segment(&self, p0: &Point3<T>, p1: &Point3<T>) -> Option<(T, T)> {
        self.planes.iter().try_fold((T::zero(), T::one()), |(f0, f1), plane| {
            let (g0, g1) = plane.clip_segment(p0, p1)?;
            let (a, b) = (f0.max(g0), f1.min(g1));
            (a <= b).then_some((a, b))
        })
    }

    pub fn classify_range(&self, range: &BoundingBox<T>) -> ClipStatus {
        let mut status = ClipStatus::Inside;
        for plane in self.planes.iter() {
            match plane.classify_range(range) {
                ClipStatus::Outside => return ClipStatus::Outside,
                ClipStatus::Straddle => status = ClipStatus::Straddle,
                ClipStatus::Inside => {}
            }
        }
        status
    }
}

impl<'a, T: FloatingPoint> Transformable<&'a Matrix4<T>> for ConvexClipPlaneSet<T> {
    fn transform(&mut self, transform: &'a Matrix4<T>) {
        self.planes.iter_mut().for_each(|p| p.transform(transform));
    }
}
