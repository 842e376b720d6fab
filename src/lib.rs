#![allow(clippy::needless_range_loop)]

mod bounding_box;
mod clip;
mod closest_parameter;
mod curve;
mod intersects;
mod knot;
mod misc;
mod patch;
mod surface;
mod tessellation;
mod tolerance;

pub mod prelude {
    pub use crate::bounding_box::*;
    pub use crate::clip::*;
    pub use crate::closest_parameter::*;
    pub use crate::curve::*;
    pub use crate::intersects::*;
    pub use crate::knot::*;
    pub use crate::misc::*;
    pub use crate::patch::*;
    pub use crate::surface::*;
    pub use crate::tessellation::*;
    pub use crate::tolerance::*;
}
