pub mod nurbs_surface;
pub mod surface_direction;
pub use nurbs_surface::*;
pub use surface_direction::*;
