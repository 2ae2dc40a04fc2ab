//! PSA chunk parser
//!
//! A PSA carries a bone table, a sequence header table and one flat key
//! table holding every sequence's samples back to back. The key table
//! can be large, so the reader records where it lives and slices out one
//! sequence's `frame_count * bone_count` contiguous block on demand.

use super::data::{SequenceInfo, KEY_SIZE, SEQUENCE_INFO_SIZE};
use crate::anim::SampleMatrix;
use crate::chunk::{ChunkHeader, FieldCursor};
use crate::ps_error::PsError;
use crate::psk::reader::read_bones;
use crate::skeleton::{Bone, BONE_RECORD_SIZE};
use ahash::{HashMap, HashMapExt};
use itertools::Itertools;
use log::{debug, info, warn};
use std::{
    fs, io,
    io::{Read, Seek, SeekFrom},
    path::Path,
};

const HEADER_TAG: &str = "ANIMHEAD";

pub struct PsaReader<R> {
    reader: R,
    bones: Vec<Bone>,
    bone_names: Vec<String>,
    sequences: Vec<SequenceInfo>,
    by_name: HashMap<String, usize>,
    keys_offset: u64,
    key_count: usize,
}

impl PsaReader<io::BufReader<fs::File>> {
    /// Opens a PSA file and parses everything except the key table
    ///
    /// # Errors
    /// May return `PsError`
    pub fn open<P>(path: P) -> Result<Self, PsError>
    where
        P: AsRef<Path>,
    {
        let file = fs::File::open(path.as_ref())?;
        Self::new(io::BufReader::new(file))
    }
}

impl<R: Read + Seek> PsaReader<R> {
    /// Parses the bone table and sequence headers from any seekable byte
    /// stream. The key table stays unread until a sequence is requested.
    ///
    /// # Errors
    /// May return `PsError`
    pub fn new(mut reader: R) -> Result<Self, PsError> {
        let header =
            ChunkHeader::read_from(&mut reader)?.ok_or(PsError::InvalidFile)?;
        if header.name() != HEADER_TAG {
            return Err(PsError::InvalidFile);
        }
        skip_payload(&mut reader, &header)?;

        let mut bones = Vec::new();
        let mut sequences = Vec::new();
        let mut keys_offset = None;
        let mut key_count = 0usize;

        while let Some(header) = ChunkHeader::read_from(&mut reader)? {
            let tag = header.name();
            match tag.as_str() {
                "BONENAMES" => {
                    expect_size(&header, BONE_RECORD_SIZE)?;
                    let payload = header.read_payload(&mut reader)?;
                    bones = read_bones(&payload)?;
                }
                "ANIMINFO" => {
                    expect_size(&header, SEQUENCE_INFO_SIZE)?;
                    let payload = header.read_payload(&mut reader)?;
                    sequences = read_sequence_infos(&payload)?;
                }
                "ANIMKEYS" => {
                    expect_size(&header, KEY_SIZE)?;
                    keys_offset = Some(reader.stream_position()?);
                    key_count = usize::try_from(header.data_count)
                        .map_err(|_| PsError::DataNotConverted)?;
                    skip_payload(&mut reader, &header)?;
                }
                "SCALEKEYS" => {
                    // Scale animation is not part of the conversion
                    debug!("skipping SCALEKEYS chunk");
                    skip_payload(&mut reader, &header)?;
                }
                _ => {
                    warn!("skipping unknown chunk \"{tag}\"");
                    skip_payload(&mut reader, &header)?;
                }
            }
        }

        let keys_offset =
            keys_offset.ok_or(PsError::MissingChunk("ANIMKEYS"))?;
        if bones.is_empty() {
            return Err(PsError::MissingChunk("BONENAMES"));
        }

        let bone_names: Vec<String> =
            bones.iter().map(|b| b.name.clone()).collect();

        // The first occurrence of a duplicated sequence name wins
        let mut by_name = HashMap::with_capacity(sequences.len());
        for (index, sequence) in sequences.iter().enumerate() {
            by_name.entry(sequence.name.clone()).or_insert(index);
        }

        info!(
            "PSA: bones={} sequences={} keys={}",
            bones.len(),
            sequences.len(),
            key_count,
        );

        Ok(Self {
            reader,
            bones,
            bone_names,
            sequences,
            by_name,
            keys_offset,
            key_count,
        })
    }

    #[must_use]
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Decoded bone names in table order
    #[must_use]
    pub fn bone_names(&self) -> &[String] {
        &self.bone_names
    }

    #[must_use]
    pub fn sequences(&self) -> &[SequenceInfo] {
        &self.sequences
    }

    #[must_use]
    pub fn sequence(&self, name: &str) -> Option<&SequenceInfo> {
        self.by_name.get(name).map(|&i| &self.sequences[i])
    }

    /// Reads one sequence's sample block into a dense matrix. Channel
    /// order per sample is rotation w, x, y, z then translation x, y, z.
    ///
    /// # Errors
    /// `PsError::SequenceNotFound` for an unknown name,
    /// `PsError::TruncatedKeyTable` if the block runs past the stored
    /// key table, plus IO errors
    pub fn read_sequence_matrix(
        &mut self,
        name: &str,
    ) -> Result<SampleMatrix, PsError> {
        let index = *self
            .by_name
            .get(name)
            .ok_or_else(|| PsError::SequenceNotFound(name.to_owned()))?;
        let sequence = &self.sequences[index];
        let frame_count = usize::try_from(sequence.frame_count.max(0))
            .map_err(|_| PsError::DataNotConverted)?;
        let first_frame = usize::try_from(sequence.first_raw_frame.max(0))
            .map_err(|_| PsError::DataNotConverted)?;
        let bone_count = self.bones.len();

        let first_key = first_frame * bone_count;
        let block_keys = frame_count * bone_count;
        if first_key + block_keys > self.key_count {
            return Err(PsError::TruncatedKeyTable(name.to_owned()));
        }

        let skip = u64::try_from(first_key * KEY_SIZE)
            .map_err(|_| PsError::DataNotConverted)?;
        let offset = self.keys_offset + skip;
        self.reader.seek(SeekFrom::Start(offset))?;
        let mut payload = vec![0u8; block_keys * KEY_SIZE];
        self.reader
            .read_exact(&mut payload)
            .map_err(|_| PsError::TruncatedKeyTable(name.to_owned()))?;

        let floats: Vec<f32> = bytemuck::pod_collect_to_vec(&payload);
        let mut matrix = SampleMatrix::new(frame_count, bone_count);
        let samples = matrix.samples_mut();
        for (row, (lx, ly, lz, rx, ry, rz, rw, _time)) in
            floats.iter().tuples().enumerate()
        {
            let sample = &mut samples[row * 7..row * 7 + 7];
            sample.copy_from_slice(&[*rw, *rx, *ry, *rz, *lx, *ly, *lz]);
        }
        Ok(matrix)
    }
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

fn skip_payload(
    reader: &mut impl Seek,
    header: &ChunkHeader,
) -> Result<(), PsError> {
    let len = i64::try_from(header.payload_len()?)
        .map_err(|_| PsError::DataNotConverted)?;
    reader.seek(SeekFrom::Current(len))?;
    Ok(())
}

fn read_sequence_infos(
    payload: &[u8],
) -> Result<Vec<SequenceInfo>, PsError> {
    let mut sequences =
        Vec::with_capacity(payload.len() / SEQUENCE_INFO_SIZE);
    let mut cursor = FieldCursor::new(payload);
    for _ in 0..payload.len() / SEQUENCE_INFO_SIZE {
        sequences.push(SequenceInfo {
            name: cursor.name64()?,
            group: cursor.name64()?,
            bone_count: cursor.long()?,
            root_include: cursor.long()?,
            compression_style: cursor.long()?,
            key_quotum: cursor.long()?,
            key_reduction: cursor.float()?,
            track_time: cursor.float()?,
            fps: cursor.float()?,
            start_bone: cursor.long()?,
            first_raw_frame: cursor.long()?,
            frame_count: cursor.long()?,
        });
    }
    Ok(sequences)
}
