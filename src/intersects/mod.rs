pub mod bilinear_quad;
pub mod intersection;
pub mod intersection_options;
pub mod surface_curve_intersection_problem;
pub mod surface_curve_newton;
pub mod surface_intersector;

pub use bilinear_quad::*;
pub use intersection::*;
pub use intersection_options::*;
pub use surface_curve_intersection_problem::*;
pub use surface_curve_newton::*;
pub use surface_intersector::*;

/// Intersection between two objects trait
pub trait Intersects<'a, T> {
    type Output;
    type Option;

    fn find_intersection(&'a self, other: T, option: Self::Option) -> Self::Output;
}
