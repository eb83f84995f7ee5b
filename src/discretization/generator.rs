use glam::DVec2;

use super::mesh::{BoundaryLink, Cell, Face, InteriorLink, Mesh, Node, Patch};

/// Build a rectilinear grid of quad cells over `[0, width] x [0, height]`
/// with boundary patches named `left`, `right`, `bottom`, `top`.
///
/// The cell at grid position `(i, j)` has id `j * nx + i`. The grid carries
/// full unstructured connectivity: interior and boundary links per cell plus
/// the corner-sharing diagonal links the ghost-cell classification needs.
pub fn rectilinear_mesh(nx: usize, ny: usize, width: f64, height: f64) -> Mesh {
    assert!(nx > 0 && ny > 0, "grid must have at least one cell");
    let dx = width / nx as f64;
    let dy = height / ny as f64;

    let node_id = |i: usize, j: usize| j * (nx + 1) + i;
    let cell_id = |i: usize, j: usize| j * nx + i;

    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            nodes.push(Node {
                position: DVec2::new(i as f64 * dx, j as f64 * dy),
            });
        }
    }

    // Patch ids in construction order
    let patch_names = ["left", "right", "bottom", "top"];
    let mut patch_faces: [Vec<usize>; 4] = Default::default();

    let mut faces: Vec<Face> = Vec::with_capacity((nx + 1) * ny + nx * (ny + 1));

    // Vertical faces, constant x
    for j in 0..ny {
        for i in 0..=nx {
            let id = faces.len();
            let centroid = DVec2::new(i as f64 * dx, (j as f64 + 0.5) * dy);
            let (cells, normal, patch) = if i == 0 {
                ((cell_id(0, j), None), -DVec2::X, Some(0))
            } else if i == nx {
                ((cell_id(nx - 1, j), None), DVec2::X, Some(1))
            } else {
                ((cell_id(i - 1, j), Some(cell_id(i, j))), DVec2::X, None)
            };
            if let Some(p) = patch {
                patch_faces[p].push(id);
            }
            faces.push(Face {
                id,
                area: dy,
                normal,
                centroid,
                cells,
                patch,
            });
        }
    }

    // Horizontal faces, constant y
    for j in 0..=ny {
        for i in 0..nx {
            let id = faces.len();
            let centroid = DVec2::new((i as f64 + 0.5) * dx, j as f64 * dy);
            let (cells, normal, patch) = if j == 0 {
                ((cell_id(i, 0), None), -DVec2::Y, Some(2))
            } else if j == ny {
                ((cell_id(i, ny - 1), None), DVec2::Y, Some(3))
            } else {
                ((cell_id(i, j - 1), Some(cell_id(i, j))), DVec2::Y, None)
            };
            if let Some(p) = patch {
                patch_faces[p].push(id);
            }
            faces.push(Face {
                id,
                area: dx,
                normal,
                centroid,
                cells,
                patch,
            });
        }
    }

    let v_face = |i: usize, j: usize| j * (nx + 1) + i;
    let h_face = |i: usize, j: usize| (nx + 1) * ny + j * nx + i;

    let mut cells = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let id = cell_id(i, j);
            let centroid = DVec2::new((i as f64 + 0.5) * dx, (j as f64 + 0.5) * dy);
            let cell_faces = vec![v_face(i, j), v_face(i + 1, j), h_face(i, j), h_face(i, j + 1)];
            let cell_nodes = vec![
                node_id(i, j),
                node_id(i + 1, j),
                node_id(i + 1, j + 1),
                node_id(i, j + 1),
            ];

            let mut interior_links = Vec::new();
            let mut boundary_links = Vec::new();
            for &f in &cell_faces {
                let face = &faces[f];
                let sign = if face.cells.0 == id { 1.0 } else { -1.0 };
                let outward_norm = sign * face.normal * face.area;
                match face.cells {
                    (owner, Some(neigh)) => {
                        let other = if owner == id { neigh } else { owner };
                        interior_links.push(InteriorLink {
                            cell: other,
                            face: f,
                            outward_norm,
                        });
                    }
                    (_, None) => boundary_links.push(BoundaryLink {
                        face: f,
                        patch: face.patch.unwrap_or(0),
                        outward_norm,
                    }),
                }
            }

            let mut diagonal_links = Vec::new();
            for dj in [-1i64, 1] {
                for di in [-1i64, 1] {
                    let (ci, cj) = (i as i64 + di, j as i64 + dj);
                    if ci >= 0 && cj >= 0 && (ci as usize) < nx && (cj as usize) < ny {
                        diagonal_links.push(cell_id(ci as usize, cj as usize));
                    }
                }
            }

            cells.push(Cell {
                id,
                volume: dx * dy,
                centroid,
                faces: cell_faces,
                nodes: cell_nodes,
                interior_links,
                boundary_links,
                diagonal_links,
            });
        }
    }

    let patches = patch_names
        .iter()
        .zip(patch_faces)
        .enumerate()
        .map(|(id, (name, faces))| Patch {
            id,
            name: name.to_string(),
            faces,
        })
        .collect();

    Mesh::assemble(cells, faces, nodes, patches)
}
