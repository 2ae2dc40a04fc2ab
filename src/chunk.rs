//! Chunked binary plumbing shared by the PSK and PSA readers and writers
//!
//! Both formats are a flat sequence of tagged chunks: a 32 byte header
//! carrying a 20 byte ASCII tag, a type flags field, the per record size
//! and the record count, followed by `data_size * data_count` payload
//! bytes. All values are little endian.

use crate::name;
use crate::ps_error::PsError;
use log::trace;
use nalgebra_glm as glm;
use std::io::{Read, Write};

/// Width of the tag field in a chunk header
pub const TAG_WIDTH: usize = 20;

/// Size of a chunk header on disk
pub const HEADER_SIZE: usize = 32;

/// Historical type flags value written by the reference exporter. Readers
/// ignore it.
pub const TYPE_FLAGS: i32 = 1_999_801;

#[derive(Debug)]
pub struct ChunkHeader {
    pub tag: [u8; TAG_WIDTH],
    pub type_flags: i32,
    pub data_size: i32,
    pub data_count: i32,
}

impl ChunkHeader {
    /// Reads the next chunk header. Returns `Ok(None)` on a clean end of
    /// file, an error if the file ends partway through a header.
    ///
    /// # Errors
    /// May return `PsError`
    pub fn read_from(
        reader: &mut impl Read,
    ) -> Result<Option<Self>, PsError> {
        let mut buffer = [0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            let n = reader.read(&mut buffer[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(PsError::TruncatedChunk(String::from("header")));
            }
            filled += n;
        }
        let mut tag = [0u8; TAG_WIDTH];
        tag.copy_from_slice(&buffer[0..TAG_WIDTH]);
        let header = Self {
            tag,
            type_flags: long(&buffer[20..24])?,
            data_size: long(&buffer[24..28])?,
            data_count: long(&buffer[28..32])?,
        };
        trace!(
            "chunk \"{}\" size={} count={}",
            header.name(),
            header.data_size,
            header.data_count,
        );
        Ok(Some(header))
    }

    /// The chunk tag decoded up to its NUL terminator
    #[must_use]
    pub fn name(&self) -> String {
        name::decode(&self.tag)
    }

    /// Total payload length in bytes
    ///
    /// # Errors
    /// Returns `PsError::DataNotConverted` for negative size fields
    pub fn payload_len(&self) -> Result<usize, PsError> {
        let size = usize::try_from(self.data_size)
            .map_err(|_| PsError::DataNotConverted)?;
        let count = usize::try_from(self.data_count)
            .map_err(|_| PsError::DataNotConverted)?;
        size.checked_mul(count).ok_or(PsError::DataNotConverted)
    }

    /// Reads this chunk's payload
    ///
    /// # Errors
    /// May return `PsError`
    pub fn read_payload(
        &self,
        reader: &mut impl Read,
    ) -> Result<Vec<u8>, PsError> {
        let len = self.payload_len()?;
        let mut payload = vec![0u8; len];
        reader
            .read_exact(&mut payload)
            .map_err(|_| PsError::TruncatedChunk(self.name()))?;
        Ok(payload)
    }
}

/// Writes one chunk header
///
/// # Errors
/// May return `PsError`
pub fn write_header(
    writer: &mut impl Write,
    tag: &str,
    data_size: usize,
    data_count: usize,
) -> Result<(), PsError> {
    let mut field = [0u8; TAG_WIDTH];
    for (slot, byte) in field.iter_mut().zip(tag.bytes()) {
        *slot = byte;
    }
    writer.write_all(&field)?;
    writer.write_all(&TYPE_FLAGS.to_le_bytes())?;
    let size =
        i32::try_from(data_size).map_err(|_| PsError::DataNotConverted)?;
    let count =
        i32::try_from(data_count).map_err(|_| PsError::DataNotConverted)?;
    writer.write_all(&size.to_le_bytes())?;
    writer.write_all(&count.to_le_bytes())?;
    Ok(())
}

fn dword(slice: &[u8]) -> Result<u32, PsError> {
    Ok(u32::from_le_bytes(
        slice.try_into().map_err(|_| PsError::DataNotConverted)?,
    ))
}

fn long(slice: &[u8]) -> Result<i32, PsError> {
    Ok(i32::from_le_bytes(
        slice.try_into().map_err(|_| PsError::DataNotConverted)?,
    ))
}

fn float(slice: &[u8]) -> Result<f32, PsError> {
    Ok(f32::from_le_bytes(
        slice.try_into().map_err(|_| PsError::DataNotConverted)?,
    ))
}

/// Little endian field cursor over a record payload
pub struct FieldCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FieldCursor<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PsError> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(PsError::DataNotConverted)?;
        if end > self.data.len() {
            return Err(PsError::DataNotConverted);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// # Errors
    /// May return `PsError` if the record is too short
    pub fn byte(&mut self) -> Result<u8, PsError> {
        Ok(self.take(1)?[0])
    }

    /// # Errors
    /// May return `PsError` if the record is too short
    pub fn word(&mut self) -> Result<u16, PsError> {
        Ok(u16::from_le_bytes(
            self.take(2)?
                .try_into()
                .map_err(|_| PsError::DataNotConverted)?,
        ))
    }

    /// # Errors
    /// May return `PsError` if the record is too short
    pub fn dword(&mut self) -> Result<u32, PsError> {
        dword(self.take(4)?)
    }

    /// # Errors
    /// May return `PsError` if the record is too short
    pub fn long(&mut self) -> Result<i32, PsError> {
        long(self.take(4)?)
    }

    /// # Errors
    /// May return `PsError` if the record is too short
    pub fn float(&mut self) -> Result<f32, PsError> {
        float(self.take(4)?)
    }

    /// # Errors
    /// May return `PsError` if the record is too short
    pub fn vec3(&mut self) -> Result<glm::Vec3, PsError> {
        Ok(glm::vec3(self.float()?, self.float()?, self.float()?))
    }

    /// Reads a quaternion in x, y, z, w storage order
    ///
    /// # Errors
    /// May return `PsError` if the record is too short
    pub fn quat(&mut self) -> Result<glm::Quat, PsError> {
        Ok(glm::quat(
            self.float()?,
            self.float()?,
            self.float()?,
            self.float()?,
        ))
    }

    /// Reads and decodes a fixed width name field
    ///
    /// # Errors
    /// May return `PsError` if the record is too short
    pub fn name64(&mut self) -> Result<String, PsError> {
        Ok(name::decode(self.take(name::NAME_WIDTH)?))
    }

    /// # Errors
    /// May return `PsError` if the record is too short
    pub fn skip(&mut self, len: usize) -> Result<(), PsError> {
        self.take(len).map(|_| ())
    }
}

// Record serialization helpers. Records are built up in a Vec so the
// chunk header can be written with the final size first.

pub fn put_u8(out: &mut Vec<u8>, v: u8) {
    out.push(v);
}

pub fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub fn put_vec3(out: &mut Vec<u8>, v: &glm::Vec3) {
    put_f32(out, v.x);
    put_f32(out, v.y);
    put_f32(out, v.z);
}

/// Writes a quaternion in x, y, z, w storage order
pub fn put_quat(out: &mut Vec<u8>, q: &glm::Quat) {
    put_f32(out, q.i);
    put_f32(out, q.j);
    put_f32(out, q.k);
    put_f32(out, q.w);
}

pub fn put_name(out: &mut Vec<u8>, n: &str) {
    out.extend_from_slice(&name::encode(n));
}
