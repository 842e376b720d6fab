pub mod closest_point_options;
pub mod patch_closest_parameter_newton;
pub mod patch_closest_parameter_problem;
pub mod surface_closest_point;
pub mod triangle;
pub use closest_point_options::*;
pub use patch_closest_parameter_newton::*;
pub use patch_closest_parameter_problem::*;
pub use surface_closest_point::*;
pub use triangle::*;
