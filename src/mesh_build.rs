//! Mesh assembly from flat PSK records
//!
//! Turns the unordered point / wedge / face / weight tables into a
//! renderable mesh: triangles with reversed winding, a mandatory primary
//! UV layer plus any extra channels, optional per point colors and
//! normals, and bone grouped vertex weights. Degenerate and ambiguous
//! data is excluded and reported through structured warnings rather than
//! aborting the import.

use crate::ps_error::PsError;
use crate::psk::Psk;
use ahash::{HashSet, HashSetExt};
use log::{info, warn};
use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    Linear,
    Srgb,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct MeshOptions {
    pub vertex_colors: bool,
    pub color_space: ColorSpace,
    pub vertex_normals: bool,
    pub extra_uvs: bool,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            vertex_colors: true,
            color_space: ColorSpace::Srgb,
            vertex_normals: true,
            extra_uvs: true,
        }
    }
}

/// A kept triangle: point indices in output winding order plus the
/// material slot
#[derive(Clone, Copy, Debug)]
pub struct MeshFace {
    pub vertices: [u32; 3],
    pub material_index: usize,
}

/// One UV per kept face corner, in face order
#[derive(Clone, Debug)]
pub struct UvLayer {
    pub name: String,
    pub uvs: Vec<[f32; 2]>,
}

/// All weights referencing one bone
#[derive(Clone, Debug)]
pub struct VertexGroup {
    pub bone_index: usize,
    pub name: String,
    /// (point index, weight) pairs; weights are not renormalized
    pub weights: Vec<(u32, f32)>,
}

/// Non fatal problems found while assembling, with counts. The exact
/// offending indices are on `MeshBuild`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MeshWarning {
    DegenerateFaces { count: usize },
    AmbiguousVertexColors { count: usize },
}

/// Assembled mesh ready to hand to a renderer or scene builder
#[derive(Clone, Debug, Default)]
pub struct MeshBuild {
    pub positions: Vec<glm::Vec3>,
    pub faces: Vec<MeshFace>,
    /// Primary layer first, then any extra channels
    pub uv_layers: Vec<UvLayer>,
    /// Per point RGBA, present when the file has colors and the option
    /// asked for them
    pub vertex_colors: Option<Vec<[f32; 4]>>,
    /// Per point normals; forces smooth shading when present
    pub vertex_normals: Option<Vec<glm::Vec3>>,
    pub smooth_shading: bool,
    pub material_names: Vec<String>,
    pub vertex_groups: Vec<VertexGroup>,
    pub degenerate_faces: Vec<usize>,
    pub ambiguous_color_points: Vec<usize>,
    pub warnings: Vec<MeshWarning>,
}

/// Builds a mesh from PSK records
///
/// # Errors
/// `PsError` when an index references a missing point, wedge or bone.
/// Degenerate faces and ambiguous colors are warnings, not errors.
#[allow(clippy::too_many_lines)]
pub fn build(psk: &Psk, options: &MeshOptions) -> Result<MeshBuild, PsError> {
    let point_count = psk.points.len();
    for (index, wedge) in psk.wedges.iter().enumerate() {
        if wedge.point_index as usize >= point_count {
            return Err(PsError::PointIndexTooLarge {
                wedge: index,
                point: wedge.point_index as usize,
            });
        }
    }

    let mut build = MeshBuild {
        positions: psk.points.clone(),
        material_names: psk
            .materials
            .iter()
            .map(|m| m.name.clone())
            .collect(),
        ..Default::default()
    };

    // FACES
    // The stored corner order is mirrored, so each face consumes its
    // wedge triple in reverse. A face whose corners land on fewer than
    // three distinct points cannot form a triangle and is excluded from
    // the topology and from every per corner stream below.
    let mut kept = Vec::with_capacity(psk.faces.len());
    for (face_index, face) in psk.faces.iter().enumerate() {
        let mut vertices = [0u32; 3];
        for (slot, wedge_index) in
            face.wedge_indices.iter().rev().enumerate()
        {
            let wedge = psk
                .wedges
                .get(*wedge_index as usize)
                .ok_or(PsError::WedgeIndexTooLarge {
                    face: face_index,
                    wedge: *wedge_index as usize,
                })?;
            vertices[slot] = wedge.point_index;
        }
        if vertices[0] == vertices[1]
            || vertices[0] == vertices[2]
            || vertices[1] == vertices[2]
        {
            build.degenerate_faces.push(face_index);
            continue;
        }
        kept.push(face_index);
        build.faces.push(MeshFace {
            vertices,
            material_index: usize::from(face.material_index),
        });
    }
    if !build.degenerate_faces.is_empty() {
        let count = build.degenerate_faces.len();
        warn!("discarded {count} degenerate face(s)");
        build.warnings.push(MeshWarning::DegenerateFaces { count });
    }

    // TEXTURE COORDINATES
    let mut primary = UvLayer {
        name: String::from("VTXW0000"),
        uvs: Vec::with_capacity(kept.len() * 3),
    };
    for &face_index in &kept {
        for wedge_index in psk.faces[face_index].wedge_indices.iter().rev()
        {
            let uv = psk.wedges[*wedge_index as usize].uv;
            primary.uvs.push([uv[0], 1.0 - uv[1]]);
        }
    }
    build.uv_layers.push(primary);

    // EXTRA UVS
    // Extra channels repeat as whole blocks of one entry per wedge
    if psk.has_extra_uvs() && options.extra_uvs {
        let wedge_count = psk.wedges.len();
        for channel in 0..psk.extra_uv_channel_count() {
            let offset = channel * wedge_count;
            let mut layer = UvLayer {
                name: format!("EXTRAUV{channel}"),
                uvs: Vec::with_capacity(kept.len() * 3),
            };
            for &face_index in &kept {
                for wedge_index in
                    psk.faces[face_index].wedge_indices.iter().rev()
                {
                    let uv = psk.extra_uvs[offset + *wedge_index as usize];
                    layer.uvs.push([uv[0], 1.0 - uv[1]]);
                }
            }
            build.uv_layers.push(layer);
        }
    }

    // VERTEX COLORS
    // Stored per wedge but exposed per point. Wedges that disagree on
    // their shared point's color flag it ambiguous; the first seen value
    // wins deterministically.
    if psk.has_vertex_colors() && options.vertex_colors {
        let mut resolved: Vec<Option<[f32; 4]>> = vec![None; point_count];
        let mut flagged = HashSet::new();
        for (wedge_index, wedge) in psk.wedges.iter().enumerate() {
            let point = wedge.point_index as usize;
            let color = normalized(psk.vertex_colors[wedge_index]);
            match resolved[point] {
                Some(existing) if existing != color => {
                    if flagged.insert(point) {
                        build.ambiguous_color_points.push(point);
                    }
                }
                Some(_) => {}
                None => resolved[point] = Some(color),
            }
        }
        if options.color_space == ColorSpace::Srgb {
            for slot in resolved.iter_mut().flatten() {
                slot[0] = linear_to_srgb(slot[0]);
                slot[1] = linear_to_srgb(slot[1]);
                slot[2] = linear_to_srgb(slot[2]);
            }
        }
        build.vertex_colors = Some(
            resolved
                .into_iter()
                .map(|c| c.unwrap_or([1.0, 1.0, 1.0, 1.0]))
                .collect(),
        );
        if !build.ambiguous_color_points.is_empty() {
            let count = build.ambiguous_color_points.len();
            warn!("{count} point(s) with ambiguous vertex colors");
            build
                .warnings
                .push(MeshWarning::AmbiguousVertexColors { count });
        }
    }

    // VERTEX NORMALS
    if psk.has_vertex_normals() && options.vertex_normals {
        build.vertex_normals = Some(psk.vertex_normals.clone());
        build.smooth_shading = true;
    }

    // WEIGHTS
    // Grouped by bone, ordered by bone index
    let mut groups: Vec<Vec<(u32, f32)>> =
        vec![Vec::new(); psk.bones.len()];
    for (index, weight) in psk.weights.iter().enumerate() {
        if weight.point_index as usize >= point_count
            || weight.bone_index as usize >= psk.bones.len()
        {
            return Err(PsError::WeightIndexTooLarge { index });
        }
        groups[weight.bone_index as usize]
            .push((weight.point_index, weight.weight));
    }
    for (bone_index, weights) in groups.into_iter().enumerate() {
        if weights.is_empty() {
            continue;
        }
        build.vertex_groups.push(VertexGroup {
            bone_index,
            name: psk.bones[bone_index].name.clone(),
            weights,
        });
    }

    info!(
        "mesh: vertices={} faces={} uv layers={} groups={}",
        build.positions.len(),
        build.faces.len(),
        build.uv_layers.len(),
        build.vertex_groups.len(),
    );
    Ok(build)
}

fn normalized(color: [u8; 4]) -> [f32; 4] {
    [
        f32::from(color[0]) / 255.0,
        f32::from(color[1]) / 255.0,
        f32::from(color[2]) / 255.0,
        f32::from(color[3]) / 255.0,
    ]
}

fn linear_to_srgb(value: f32) -> f32 {
    if value > 0.003_130_8 {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * value
    }
}
