//! PSA chunk writer
//!
//! The inverse of the reader. Sequence headers are rewritten with their
//! `first_raw_frame` recomputed from the running frame total and their
//! `bone_count` pinned to the bone table, so an authored `Psa` only has
//! to get `frame_count` and the key ordering right.

use super::data::{Psa, KEY_SIZE, SEQUENCE_INFO_SIZE};
use crate::chunk::{self, write_header};
use crate::ps_error::PsError;
use crate::skeleton::BONE_RECORD_SIZE;
use log::info;
use std::{fs, io, io::Write, path::Path};

/// Writes a PSA file
///
/// # Errors
/// May return `PsError`
pub fn save<P>(psa: &Psa, path: P) -> Result<(), PsError>
where
    P: AsRef<Path>,
{
    let file = fs::File::create(path.as_ref())?;
    let mut writer = io::BufWriter::new(file);
    write_to(psa, &mut writer)
}

/// Writes a PSA to any byte stream
///
/// # Errors
/// `PsError::CountMismatch` if the key table length does not equal the
/// sum of `frame_count * bone_count` over all sequences, plus IO errors
pub fn write_to(psa: &Psa, writer: &mut impl Write) -> Result<(), PsError> {
    let bone_count = psa.bones.len();
    let total_frames: usize = psa
        .sequences
        .iter()
        .map(|s| usize::try_from(s.frame_count.max(0)).unwrap_or(0))
        .sum();
    if total_frames * bone_count != psa.keys.len() {
        return Err(PsError::CountMismatch { chunk: "ANIMKEYS" });
    }

    write_header(writer, "ANIMHEAD", 0, 0)?;

    let mut payload = Vec::new();
    for bone in &psa.bones {
        bone.write(&mut payload);
    }
    write_chunk(
        writer,
        "BONENAMES",
        BONE_RECORD_SIZE,
        psa.bones.len(),
        &payload,
    )?;

    let mut payload = Vec::new();
    let mut frame_offset = 0i32;
    for sequence in &psa.sequences {
        chunk::put_name(&mut payload, &sequence.name);
        chunk::put_name(&mut payload, &sequence.group);
        let count = i32::try_from(bone_count)
            .map_err(|_| PsError::DataNotConverted)?;
        chunk::put_i32(&mut payload, count);
        chunk::put_i32(&mut payload, sequence.root_include);
        chunk::put_i32(&mut payload, sequence.compression_style);
        chunk::put_i32(&mut payload, sequence.key_quotum);
        chunk::put_f32(&mut payload, sequence.key_reduction);
        chunk::put_f32(&mut payload, sequence.track_time);
        chunk::put_f32(&mut payload, sequence.fps);
        chunk::put_i32(&mut payload, sequence.start_bone);
        chunk::put_i32(&mut payload, frame_offset);
        chunk::put_i32(&mut payload, sequence.frame_count);
        frame_offset += sequence.frame_count.max(0);
    }
    write_chunk(
        writer,
        "ANIMINFO",
        SEQUENCE_INFO_SIZE,
        psa.sequences.len(),
        &payload,
    )?;

    let mut payload = Vec::new();
    for key in &psa.keys {
        chunk::put_vec3(&mut payload, &key.location);
        chunk::put_quat(&mut payload, &key.rotation);
        chunk::put_f32(&mut payload, key.time);
    }
    write_chunk(writer, "ANIMKEYS", KEY_SIZE, psa.keys.len(), &payload)?;

    info!(
        "wrote PSA: bones={} sequences={} keys={}",
        psa.bones.len(),
        psa.sequences.len(),
        psa.keys.len(),
    );
    Ok(())
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
