pub mod grid_counts;
pub mod step_counts;
pub mod tolerance_options;
pub use grid_counts::*;
pub use step_counts::*;
pub use tolerance_options::*;
