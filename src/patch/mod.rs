pub mod bezier_patch;
pub mod grid;
pub use bezier_patch::*;
pub use grid::*;
