use nalgebra::{Point2, Point3, Vector3};

use crate::{
    misc::{scalar, FloatingPoint},
    patch::{evaluate_samples, BezierPatch},
    surface::NurbsSurface,
    tolerance::{compute_all_step_counts, reconcile_neighbor_counts},
};

use super::{
    assemble_boundary, build_strips, compress_coordinates, decompose, mesh_graph, mesh_piece, parameter_scale,
    split_region, MeshEvent, ParamGrid, PatchLayout, PieceMesh, Tessellation, TessellationOptions,
    TessellationStrategy, TessellationSummary,
};

/// Events of a finished tessellation together with its summary
#[derive(Clone, Debug, PartialEq)]
pub struct SurfaceTessellation<T: FloatingPoint> {
    events: Vec<MeshEvent<T>>,
    summary: TessellationSummary,
}

impl<T: FloatingPoint> SurfaceTessellation<T> {
    pub fn events(&self) -> &[MeshEvent<T>] {
        &self.events
    }

    pub fn summary(&self) -> &TessellationSummary {
        &self.summary
    }

    /// Flatten every event into one indexed triangle list.
    /// Vertices are not shared between events.
    pub fn to_mesh(&self) -> (Vec<Point3<T>>, Vec<[usize; 3]>) {
        let mut points = vec![];
        let mut faces = vec![];
        for event in self.events.iter() {
            let offset = points.len();
            points.extend_from_slice(event.points());
            faces.extend(
                event
                    .triangles()
                    .into_iter()
                    .map(|[a, b, c]| [a + offset, b + offset, c + offset]),
            );
        }
        (points, faces)
    }
}

/// Evaluates parameter-space meshes on their patch and hands the events to the sink
struct MeshEmitter<'a, T: FloatingPoint, F> {
    options: &'a TessellationOptions<T>,
    /// factors applied to parameter fractions in emitted params
    param_factors: (T, T),
    sink: F,
    summary: TessellationSummary,
}

type Samples<T> = (Vec<Point3<T>>, Option<Vec<Vector3<T>>>, Option<Vec<Point2<T>>>);

impl<T: FloatingPoint, F: FnMut(MeshEvent<T>)> MeshEmitter<'_, T, F> {
    /// Evaluate the fractions on the patch, `None` when any of them hits a zero weight.
    /// The failure is counted in the summary.
    fn sample(&mut self, patch: &BezierPatch<T>, fractions: &[Point2<T>]) -> Option<Samples<T>> {
        let local: Vec<_> = fractions
            .iter()
            .map(|p| {
                let (s, t) = patch.fraction_to_local(p.x, p.y);
                Point2::new(s, t)
            })
            .collect();
        let grid = evaluate_samples(patch, &local, self.options.normals_required);
        if !grid.all_valid() {
            let invalid = grid.valid().iter().filter(|v| !**v).count();
            log::warn!("{} of {} samples have no valid point, skipping the facets", invalid, fractions.len());
            self.summary.failed_regions += 1;
            return None;
        }
        let normals = self.options.normals_required.then(|| {
            grid.normals()
                .iter()
                .map(|n| if self.options.reverse { -n } else { *n })
                .collect()
        });
        let (fu, fv) = self.param_factors;
        let params = self
            .options
            .params_required
            .then(|| fractions.iter().map(|p| Point2::new(p.x * fu, p.y * fv)).collect());
        Some((grid.points().to_vec(), normals, params))
    }

    fn emit_grid(&mut self, patch: &BezierPatch<T>, grid: &ParamGrid<T>) {
        if grid.us.len() < 2 || grid.vs.len() < 2 {
            return;
        }
        let mut us = grid.us.clone();
        if self.options.reverse {
            us.reverse();
        }
        let fractions: Vec<_> = grid
            .vs
            .iter()
            .flat_map(|v| us.iter().map(move |u| Point2::new(*u, *v)))
            .collect();
        let Some((points, normals, params)) = self.sample(patch, &fractions) else {
            return;
        };
        (self.sink)(MeshEvent::QuadGrid {
            points,
            normals,
            params,
            rows: grid.vs.len(),
            cols: us.len(),
        });
        self.summary.quad_grids += 1;
    }

    fn emit_triangles(&mut self, patch: &BezierPatch<T>, fractions: &[Point2<T>], triangles: &[[usize; 3]]) {
        if triangles.is_empty() {
            return;
        }
        let reverse = self.options.reverse;
        let triangles = triangles
            .iter()
            .map(|[a, b, c]| if reverse { [*a, *c, *b] } else { [*a, *b, *c] })
            .collect();
        let Some((points, normals, params)) = self.sample(patch, fractions) else {
            return;
        };
        for strip in build_strips(triangles) {
            let pick = |i: &usize| points[*i];
            (self.sink)(MeshEvent::TriStrip {
                points: strip.iter().map(pick).collect(),
                normals: normals.as_ref().map(|n| strip.iter().map(|i| n[*i]).collect()),
                params: params.as_ref().map(|p| strip.iter().map(|i| p[*i]).collect()),
            });
            self.summary.tri_strips += 1;
        }
    }

    fn emit_piece(&mut self, patch: &BezierPatch<T>, mesh: &PieceMesh<T>) {
        for grid in mesh.grids.iter() {
            self.emit_grid(patch, grid);
        }
        self.emit_triangles(patch, &mesh.points, &mesh.triangles);
    }
}

fn param_factors<T: FloatingPoint>(surface: &NurbsSurface<T>, options: &TessellationOptions<T>) -> (T, T) {
    let Some((sx, sy)) = options.param_scale else {
        return (T::one(), T::one());
    };
    let (lu, lv) = surface.control_polygon_lengths();
    let min = scalar::<T>(TessellationOptions::<T>::MIN_PARAM_SCALE);
    let factor = |length: T, s: T| if s < min { T::one() } else { length / s };
    (factor(lu, sx), factor(lv, sy))
}

/// Facet a surface, handing every quad grid and triangle strip to `sink` as it is produced.
///
/// Untrimmed single Bezier surfaces come out as one grid. Anything else is cut into monotone
/// regions over the patch layout and meshed piece by piece. A piece that fails to mesh is
/// logged and counted in the summary, the rest of the surface is still emitted.
pub fn tessellate_surface<T: FloatingPoint, F: FnMut(MeshEvent<T>)>(
    surface: &NurbsSurface<T>,
    options: &TessellationOptions<T>,
    sink: F,
) -> anyhow::Result<TessellationSummary> {
    options.validate()?;

    let patches = BezierPatch::extract_all(surface);
    let mut counts = compute_all_step_counts(&patches, &options.tolerance);
    let (nu, nv) = surface.span_counts();
    reconcile_neighbor_counts(&mut counts, nu, nv, surface.u().is_closed(), surface.v().is_closed());

    let mut emitter = MeshEmitter {
        options,
        param_factors: param_factors(surface, options),
        sink,
        summary: TessellationSummary::default(),
    };

    if !surface.is_trimmed() && surface.is_single_bezier() {
        let (Some(patch), Some(counts)) = (patches.first(), counts.first()) else {
            anyhow::bail!("surface has no patch");
        };
        if counts.null {
            log::debug!("single patch is degenerate, nothing to facet");
            return Ok(emitter.summary);
        }
        let grid = ParamGrid {
            us: counts.u.lattice(counts.u.max()),
            vs: counts.v.lattice(counts.v.max()),
        };
        emitter.summary.regions += 1;
        emitter.emit_grid(patch, &grid);
        return Ok(emitter.summary);
    }

    let tolerance = options.compression_epsilon;
    let layout = PatchLayout::new(surface);
    let mut loops = assemble_boundary(surface, options);
    compress_coordinates(&mut loops, layout.u_breaks(), layout.v_breaks(), tolerance);
    let decomposition = decompose(&loops, &layout, tolerance);
    emitter.summary.failed_regions += decomposition.failed_bands;

    for region in decomposition.regions.iter() {
        let pieces = match split_region(region, &decomposition, &layout, &counts, tolerance) {
            Ok(pieces) => pieces,
            Err(e) => {
                log::warn!("failed to split region in band {}: {}", region.band, e);
                emitter.summary.failed_regions += 1;
                continue;
            }
        };
        for piece in pieces.iter() {
            emitter.summary.regions += 1;
            let patch = &patches[piece.patch];
            let piece_counts = &counts[piece.patch];
            let scale = parameter_scale(patch);
            let mesh = match options.strategy {
                TessellationStrategy::PatchMonotone => mesh_piece(piece, piece_counts, &scale, tolerance)
                    .or_else(|e| {
                        log::debug!("patch {}: {}, meshing through the graph", piece.patch, e);
                        mesh_graph(piece, piece_counts, &scale, tolerance, options.max_flip_passes)
                    }),
                TessellationStrategy::SurfaceGraph => {
                    mesh_graph(piece, piece_counts, &scale, tolerance, options.max_flip_passes)
                }
            };
            match mesh {
                Ok(mesh) => emitter.emit_piece(patch, &mesh),
                Err(e) => {
                    log::warn!("failed to mesh a piece of patch {}: {}", piece.patch, e);
                    emitter.summary.failed_regions += 1;
                }
            }
        }
    }

    Ok(emitter.summary)
}

impl<T: FloatingPoint> NurbsSurface<T> {
    /// Stream the tessellation of the surface into `sink`
    pub fn tessellate_with<F: FnMut(MeshEvent<T>)>(
        &self,
        options: &TessellationOptions<T>,
        sink: F,
    ) -> anyhow::Result<TessellationSummary> {
        tessellate_surface(self, options, sink)
    }
}

impl<T: FloatingPoint> Tessellation<Option<TessellationOptions<T>>> for NurbsSurface<T> {
    type Output = anyhow::Result<SurfaceTessellation<T>>;

    /// Tessellate the surface into collected events
    /// # Example
    /// ```
    /// use bsurf::prelude::*;
    /// use nalgebra::Point3;
    ///
    /// let surface = NurbsSurface::bilinear([
    ///     Point3::new(0., 0., 0.),
    ///     Point3::new(1., 0., 0.),
    ///     Point3::new(0., 1., 0.),
    ///     Point3::new(1., 1., 0.),
    /// ])
    /// .unwrap();
    /// let tess = surface.tessellate(None).unwrap();
    /// assert_eq!(tess.summary().quad_grids, 1);
    /// assert!(tess.summary().is_complete());
    /// ```
    fn tessellate(&self, options: Option<TessellationOptions<T>>) -> Self::Output {
        let options = options.unwrap_or_default();
        let mut events = vec![];
        let summary = tessellate_surface(self, &options, |event| events.push(event))?;
        Ok(SurfaceTessellation { events, summary })
    }
}
