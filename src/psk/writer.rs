//! PSK chunk writer
//!
//! Emits the mandatory chunks in the order the reference exporter uses,
//! then whichever optional chunks the `Psk` carries. Bone child counts
//! are recomputed from the parent indices so callers do not have to keep
//! them current.

use super::data::Psk;
use crate::chunk::{self, write_header};
use crate::ps_error::PsError;
use crate::skeleton::BONE_RECORD_SIZE;
use log::info;
use std::{fs, io, io::Write, path::Path};

/// Writes a PSK file
///
/// # Errors
/// May return `PsError`
pub fn save<P>(psk: &Psk, path: P) -> Result<(), PsError>
where
    P: AsRef<Path>,
{
    let file = fs::File::create(path.as_ref())?;
    let mut writer = io::BufWriter::new(file);
    write_to(psk, &mut writer)
}

/// Writes a PSK to any byte stream
///
/// # Errors
/// May return `PsError`
pub fn write_to(psk: &Psk, writer: &mut impl Write) -> Result<(), PsError> {
    write_header(writer, "ACTRHEAD", 0, 0)?;

    let mut payload = Vec::new();
    for point in &psk.points {
        chunk::put_vec3(&mut payload, point);
    }
    write_chunk(writer, "PNTS0000", 12, psk.points.len(), &payload)?;

    // Wedge and face layouts switch together once wedge indices no
    // longer fit in 16 bits
    let wide = psk.wedges.len() > 65536;
    let mut payload = Vec::new();
    for wedge in &psk.wedges {
        if wide {
            chunk::put_u32(&mut payload, wedge.point_index);
            chunk::put_f32(&mut payload, wedge.uv[0]);
            chunk::put_f32(&mut payload, wedge.uv[1]);
            chunk::put_u32(&mut payload, wedge.material_index);
        } else {
            let point = u16::try_from(wedge.point_index)
                .map_err(|_| PsError::DataNotConverted)?;
            let material = u8::try_from(wedge.material_index)
                .map_err(|_| PsError::DataNotConverted)?;
            chunk::put_u16(&mut payload, point);
            chunk::put_u16(&mut payload, 0);
            chunk::put_f32(&mut payload, wedge.uv[0]);
            chunk::put_f32(&mut payload, wedge.uv[1]);
            chunk::put_u8(&mut payload, material);
            chunk::put_u8(&mut payload, 0);
            chunk::put_u16(&mut payload, 0);
        }
    }
    write_chunk(writer, "VTXW0000", 16, psk.wedges.len(), &payload)?;

    let mut payload = Vec::new();
    for face in &psk.faces {
        for index in face.wedge_indices {
            if wide {
                chunk::put_u32(&mut payload, index);
            } else {
                let narrow = u16::try_from(index)
                    .map_err(|_| PsError::DataNotConverted)?;
                chunk::put_u16(&mut payload, narrow);
            }
        }
        chunk::put_u8(&mut payload, face.material_index);
        chunk::put_u8(&mut payload, face.aux_material_index);
        chunk::put_u32(&mut payload, face.smoothing_groups);
    }
    let (tag, size) = if wide {
        ("FACE3200", 18)
    } else {
        ("FACE0000", 12)
    };
    write_chunk(writer, tag, size, psk.faces.len(), &payload)?;

    let mut payload = Vec::new();
    for material in &psk.materials {
        chunk::put_name(&mut payload, &material.name);
        chunk::put_i32(&mut payload, material.texture_index);
        chunk::put_u32(&mut payload, material.poly_flags);
        chunk::put_i32(&mut payload, material.aux_material);
        chunk::put_u32(&mut payload, material.aux_flags);
        chunk::put_i32(&mut payload, material.lod_bias);
        chunk::put_i32(&mut payload, material.lod_style);
    }
    write_chunk(writer, "MATT0000", 88, psk.materials.len(), &payload)?;

    let child_counts = child_counts(psk);
    let mut payload = Vec::new();
    for (bone, count) in psk.bones.iter().zip(&child_counts) {
        let mut record = bone.clone();
        record.children_count = *count;
        record.write(&mut payload);
    }
    write_chunk(
        writer,
        "REFSKELT",
        BONE_RECORD_SIZE,
        psk.bones.len(),
        &payload,
    )?;

    let mut payload = Vec::new();
    for weight in &psk.weights {
        chunk::put_f32(&mut payload, weight.weight);
        chunk::put_u32(&mut payload, weight.point_index);
        chunk::put_u32(&mut payload, weight.bone_index);
    }
    write_chunk(writer, "RAWWEIGHTS", 12, psk.weights.len(), &payload)?;

    for (channel, block) in
        psk.extra_uvs.chunks(psk.wedges.len().max(1)).enumerate()
    {
        let mut payload = Vec::new();
        for uv in block {
            chunk::put_f32(&mut payload, uv[0]);
            chunk::put_f32(&mut payload, uv[1]);
        }
        let tag = format!("EXTRAUVS{channel}");
        write_chunk(writer, &tag, 8, block.len(), &payload)?;
    }

    if psk.has_vertex_colors() {
        let mut payload = Vec::new();
        for color in &psk.vertex_colors {
            payload.extend_from_slice(color);
        }
        write_chunk(
            writer,
            "VERTEXCOLOR",
            4,
            psk.vertex_colors.len(),
            &payload,
        )?;
    }

    if psk.has_vertex_normals() {
        let mut payload = Vec::new();
        for normal in &psk.vertex_normals {
            chunk::put_vec3(&mut payload, normal);
        }
        write_chunk(
            writer,
            "VTXNORMS",
            12,
            psk.vertex_normals.len(),
            &payload,
        )?;
    }

    info!(
        "wrote PSK: points={} wedges={} faces={} bones={}",
        psk.points.len(),
        psk.wedges.len(),
        psk.faces.len(),
        psk.bones.len(),
    );
    Ok(())
}

fn child_counts(psk: &Psk) -> Vec<i32> {
    let mut counts = vec![0i32; psk.bones.len()];
    for (index, bone) in psk.bones.iter().enumerate().skip(1) {
        if let Ok(parent) = usize::try_from(bone.parent_index.max(0)) {
            if parent < counts.len() && parent != index {
                counts[parent] += 1;
            }
        }
    }
    counts
}

fn write_chunk(
    writer: &mut impl Write,
    tag: &str,
    size: usize,
    count: usize,
    payload: &[u8],
) -> Result<(), PsError> {
    write_header(writer, tag, size, count)?;
    writer.write_all(payload)?;
    Ok(())
}
