pub mod binomial;
pub mod ellipse_arc;
pub mod floating_point;
pub mod orientation;
pub mod polygon_boundary;
pub mod ray;
pub mod transformable;

pub use binomial::*;
pub use ellipse_arc::*;
pub use floating_point::*;
pub use orientation::*;
pub use polygon_boundary::*;
pub use ray::*;
pub use transformable::*;
