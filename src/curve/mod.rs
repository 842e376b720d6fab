pub mod line_segment;
pub mod nurbs_curve;
pub mod parametric_curve;
pub use line_segment::*;
pub use nurbs_curve::*;
pub use parametric_curve::*;
