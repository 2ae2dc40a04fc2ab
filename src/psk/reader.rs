//! PSK chunk parser
//!
//! A PSK file opens with an `ACTRHEAD` chunk and then carries the mesh as
//! a flat sequence of tagged record chunks. Optional data (extra UV
//! channels, vertex colors, vertex normals) is detected by tag, nothing
//! in the file declares it up front.

use super::data::{Face, Material, Psk, Wedge, Weight};
use crate::chunk::{ChunkHeader, FieldCursor};
use crate::ps_error::PsError;
use crate::skeleton::{Bone, BONE_RECORD_SIZE};
use itertools::Itertools;
use log::{debug, info, warn};
use nalgebra_glm as glm;
use std::{fs, io, io::Read, path::Path};

const HEADER_TAG: &str = "ACTRHEAD";
const POINT_SIZE: usize = 12;
const WEDGE_SIZE: usize = 16;
const FACE16_SIZE: usize = 12;
const FACE32_SIZE: usize = 18;
const MATERIAL_SIZE: usize = 88;
const WEIGHT_SIZE: usize = 12;
const EXTRA_UV_SIZE: usize = 8;
const COLOR_SIZE: usize = 4;

/// Wedge records with 16 bit point indices are only used up to this many
/// wedges; larger meshes switch to the 32 bit layout at the same record
/// size.
const WEDGE16_MAX_COUNT: i32 = 65536;

/// Loads a PSK file
///
/// # Errors
/// May return `PsError`
pub fn load<P>(path: P) -> Result<Psk, PsError>
where
    P: AsRef<Path>,
{
    let file = fs::File::open(path.as_ref())?;
    let mut reader = io::BufReader::new(file);
    read_from(&mut reader)
}

/// Reads a PSK from any byte stream
///
/// # Errors
/// May return `PsError`
#[allow(clippy::too_many_lines)]
pub fn read_from(reader: &mut impl Read) -> Result<Psk, PsError> {
    let header =
        ChunkHeader::read_from(reader)?.ok_or(PsError::InvalidFile)?;
    if header.name() != HEADER_TAG {
        return Err(PsError::InvalidFile);
    }
    header.read_payload(reader)?;

    let mut points = None;
    let mut wedges = None;
    let mut faces = None;
    let mut materials = None;
    let mut bones = None;
    let mut weights = Vec::new();
    let mut extra_uvs = Vec::new();
    let mut vertex_colors = Vec::new();
    let mut vertex_normals = Vec::new();

    while let Some(header) = ChunkHeader::read_from(reader)? {
        let tag = header.name();
        let payload = header.read_payload(reader)?;
        match tag.as_str() {
            "PNTS0000" => {
                expect_size(&header, POINT_SIZE)?;
                points = Some(read_vec3s(&payload));
            }
            "VTXW0000" => {
                expect_size(&header, WEDGE_SIZE)?;
                wedges = Some(read_wedges(&header, &payload)?);
            }
            "FACE0000" => {
                expect_size(&header, FACE16_SIZE)?;
                faces = Some(read_faces16(&payload)?);
            }
            "FACE3200" => {
                expect_size(&header, FACE32_SIZE)?;
                faces = Some(read_faces32(&payload)?);
            }
            "MATT0000" => {
                expect_size(&header, MATERIAL_SIZE)?;
                materials = Some(read_materials(&payload)?);
            }
            "REFSKELT" => {
                expect_size(&header, BONE_RECORD_SIZE)?;
                bones = Some(read_bones(&payload)?);
            }
            "RAWWEIGHTS" => {
                expect_size(&header, WEIGHT_SIZE)?;
                weights = read_weights(&payload)?;
            }
            "VERTEXCOLOR" => {
                expect_size(&header, COLOR_SIZE)?;
                vertex_colors = payload
                    .chunks_exact(4)
                    .map(|c| [c[0], c[1], c[2], c[3]])
                    .collect();
            }
            "VTXNORMS" => {
                expect_size(&header, POINT_SIZE)?;
                vertex_normals = read_vec3s(&payload);
            }
            t if t.starts_with("EXTRAUVS") => {
                expect_size(&header, EXTRA_UV_SIZE)?;
                let floats: Vec<f32> =
                    bytemuck::pod_collect_to_vec(&payload);
                extra_uvs
                    .extend(floats.iter().tuples().map(|(u, v)| [*u, *v]));
            }
            _ => {
                // The format has grown by appending new optional tagged
                // chunks over the years, so an unknown tag is more likely
                // a newer extension than corruption.
                warn!("skipping unknown chunk \"{tag}\"");
            }
        }
    }

    let psk = Psk {
        points: points.ok_or(PsError::MissingChunk("PNTS0000"))?,
        wedges: wedges.ok_or(PsError::MissingChunk("VTXW0000"))?,
        faces: faces.ok_or(PsError::MissingChunk("FACE0000"))?,
        materials: materials.ok_or(PsError::MissingChunk("MATT0000"))?,
        bones: bones.ok_or(PsError::MissingChunk("REFSKELT"))?,
        weights,
        extra_uvs,
        vertex_colors,
        vertex_normals,
    };
    validate(&psk)?;

    info!(
        "PSK: points={} wedges={} faces={} materials={} bones={} \
         weights={}",
        psk.points.len(),
        psk.wedges.len(),
        psk.faces.len(),
        psk.materials.len(),
        psk.bones.len(),
        psk.weights.len(),
    );
    debug!(
        "PSK optional data: extra uv channels={} colors={} normals={}",
        psk.extra_uv_channel_count(),
        psk.has_vertex_colors(),
        psk.has_vertex_normals(),
    );
    Ok(psk)
}

// Optional per wedge and per point streams must agree with the chunks
// they annotate or index bookkeeping falls apart downstream.
fn validate(psk: &Psk) -> Result<(), PsError> {
    if psk.has_vertex_colors()
        && psk.vertex_colors.len() != psk.wedges.len()
    {
        return Err(PsError::CountMismatch {
            chunk: "VERTEXCOLOR",
        });
    }
    if psk.has_vertex_normals()
        && psk.vertex_normals.len() != psk.points.len()
    {
        return Err(PsError::CountMismatch { chunk: "VTXNORMS" });
    }
    if psk.has_extra_uvs()
        && (psk.wedges.is_empty()
            || psk.extra_uvs.len() % psk.wedges.len() != 0)
    {
        return Err(PsError::CountMismatch { chunk: "EXTRAUVS" });
    }
    Ok(())
}

fn expect_size(
    header: &ChunkHeader,
    expected: usize,
) -> Result<(), PsError> {
    if usize::try_from(header.data_size).map_or(false, |s| s == expected) {
        Ok(())
    } else {
        Err(PsError::UnexpectedItemSize {
            chunk: header.name(),
            size: header.data_size,
        })
    }
}

fn read_vec3s(payload: &[u8]) -> Vec<glm::Vec3> {
    let floats: Vec<f32> = bytemuck::pod_collect_to_vec(payload);
    floats
        .iter()
        .tuples()
        .map(|(x, y, z)| glm::vec3(*x, *y, *z))
        .collect()
}

fn read_wedges(
    header: &ChunkHeader,
    payload: &[u8],
) -> Result<Vec<Wedge>, PsError> {
    let mut wedges = Vec::new();
    let mut cursor = FieldCursor::new(payload);
    if header.data_count <= WEDGE16_MAX_COUNT {
        for _ in 0..header.data_count {
            let point_index = u32::from(cursor.word()?);
            cursor.skip(2)?;
            let u = cursor.float()?;
            let v = cursor.float()?;
            let material_index = u32::from(cursor.byte()?);
            cursor.skip(3)?;
            wedges.push(Wedge {
                point_index,
                uv: [u, v],
                material_index,
            });
        }
    } else {
        for _ in 0..header.data_count {
            let point_index = cursor.dword()?;
            let u = cursor.float()?;
            let v = cursor.float()?;
            let material_index = cursor.dword()?;
            wedges.push(Wedge {
                point_index,
                uv: [u, v],
                material_index,
            });
        }
    }
    Ok(wedges)
}

fn read_faces16(payload: &[u8]) -> Result<Vec<Face>, PsError> {
    let mut faces = Vec::with_capacity(payload.len() / FACE16_SIZE);
    let mut cursor = FieldCursor::new(payload);
    for _ in 0..payload.len() / FACE16_SIZE {
        let wedge_indices = [
            u32::from(cursor.word()?),
            u32::from(cursor.word()?),
            u32::from(cursor.word()?),
        ];
        faces.push(Face {
            wedge_indices,
            material_index: cursor.byte()?,
            aux_material_index: cursor.byte()?,
            smoothing_groups: cursor.dword()?,
        });
    }
    Ok(faces)
}

fn read_faces32(payload: &[u8]) -> Result<Vec<Face>, PsError> {
    let mut faces = Vec::with_capacity(payload.len() / FACE32_SIZE);
    let mut cursor = FieldCursor::new(payload);
    for _ in 0..payload.len() / FACE32_SIZE {
        let wedge_indices =
            [cursor.dword()?, cursor.dword()?, cursor.dword()?];
        faces.push(Face {
            wedge_indices,
            material_index: cursor.byte()?,
            aux_material_index: cursor.byte()?,
            smoothing_groups: cursor.dword()?,
        });
    }
    Ok(faces)
}

fn read_materials(payload: &[u8]) -> Result<Vec<Material>, PsError> {
    let mut materials = Vec::with_capacity(payload.len() / MATERIAL_SIZE);
    let mut cursor = FieldCursor::new(payload);
    for _ in 0..payload.len() / MATERIAL_SIZE {
        materials.push(Material {
            name: cursor.name64()?,
            texture_index: cursor.long()?,
            poly_flags: cursor.dword()?,
            aux_material: cursor.long()?,
            aux_flags: cursor.dword()?,
            lod_bias: cursor.long()?,
            lod_style: cursor.long()?,
        });
    }
    Ok(materials)
}

pub(crate) fn read_bones(payload: &[u8]) -> Result<Vec<Bone>, PsError> {
    let mut bones = Vec::with_capacity(payload.len() / BONE_RECORD_SIZE);
    let mut cursor = FieldCursor::new(payload);
    for _ in 0..payload.len() / BONE_RECORD_SIZE {
        bones.push(Bone::read(&mut cursor)?);
    }
    Ok(bones)
}

fn read_weights(payload: &[u8]) -> Result<Vec<Weight>, PsError> {
    let mut weights = Vec::with_capacity(payload.len() / WEIGHT_SIZE);
    let mut cursor = FieldCursor::new(payload);
    for _ in 0..payload.len() / WEIGHT_SIZE {
        weights.push(Weight {
            weight: cursor.float()?,
            point_index: cursor.dword()?,
            bone_index: cursor.dword()?,
        });
    }
    Ok(weights)
}
