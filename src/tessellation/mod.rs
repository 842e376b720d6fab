pub mod boundary;
pub mod graph_mesh;
pub mod half_edge_graph;
pub mod mesh_event;
pub mod monotone_decomposition;
pub mod patch_layout;
pub mod piece;
pub mod piece_mesh;
pub mod strip_builder;
pub mod surface_tessellation;
pub mod tessellation_options;
pub mod triangulation;

pub use boundary::*;
pub use graph_mesh::*;
pub use half_edge_graph::*;
pub use mesh_event::*;
pub use monotone_decomposition::*;
pub use patch_layout::*;
pub use piece::*;
pub use piece_mesh::*;
pub use strip_builder::*;
pub use surface_tessellation::*;
pub use tessellation_options::*;
pub use triangulation::*;

/// A trait for tessellating a shape
pub trait Tessellation<Opt> {
    type Output;
    fn tessellate(&self, options: Opt) -> Self::Output;
}
