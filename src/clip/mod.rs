mod clip_plane;
mod convex_clip_plane_set;

pub use clip_plane::*;
pub use convex_clip_plane_set::*;
