use crate::skeleton::Bone;
use nalgebra_glm as glm;

/// A wedge ties a point to a UV coordinate and a material. Several wedges
/// may reference the same point. The two on disk layouts (16 and 32 bit
/// point indices) are unified here.
#[derive(Clone, Copy, Debug)]
pub struct Wedge {
    pub point_index: u32,
    pub uv: [f32; 2],
    pub material_index: u32,
}

/// A triangle of wedge indices. Winding is reversed relative to the
/// stored order when the mesh is assembled.
#[derive(Clone, Copy, Debug)]
pub struct Face {
    pub wedge_indices: [u32; 3],
    pub material_index: u8,
    pub aux_material_index: u8,
    pub smoothing_groups: u32,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub texture_index: i32,
    pub poly_flags: u32,
    pub aux_material: i32,
    pub aux_flags: u32,
    pub lod_bias: i32,
    pub lod_style: i32,
}

impl Material {
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            texture_index: 0,
            poly_flags: 0,
            aux_material: 0,
            aux_flags: 0,
            lod_bias: 0,
            lod_style: 0,
        }
    }
}

/// One bone influence on one point. Weights are not required to sum to 1
/// across a point; renormalization is a target runtime concern.
#[derive(Clone, Copy, Debug)]
pub struct Weight {
    pub weight: f32,
    pub point_index: u32,
    pub bone_index: u32,
}

/// In memory form of a PSK file. Optional chunks that were absent from
/// the file leave their vectors empty.
#[derive(Clone, Debug, Default)]
pub struct Psk {
    pub points: Vec<glm::Vec3>,
    pub wedges: Vec<Wedge>,
    pub faces: Vec<Face>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
    pub weights: Vec<Weight>,
    /// Extra UV channels, one block of `wedges.len()` entries per channel
    pub extra_uvs: Vec<[f32; 2]>,
    /// RGBA per wedge
    pub vertex_colors: Vec<[u8; 4]>,
    /// One normal per point
    pub vertex_normals: Vec<glm::Vec3>,
}

impl Psk {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn has_extra_uvs(&self) -> bool {
        !self.extra_uvs.is_empty()
    }

    #[must_use]
    pub fn has_vertex_colors(&self) -> bool {
        !self.vertex_colors.is_empty()
    }

    #[must_use]
    pub fn has_vertex_normals(&self) -> bool {
        !self.vertex_normals.is_empty()
    }

    /// Number of extra UV channels carried alongside the primary one
    #[must_use]
    pub fn extra_uv_channel_count(&self) -> usize {
        if self.wedges.is_empty() {
            0
        } else {
            self.extra_uvs.len() / self.wedges.len()
        }
    }
}
