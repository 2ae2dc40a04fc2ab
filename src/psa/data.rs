use crate::skeleton::Bone;
use nalgebra_glm as glm;

/// On disk size of one sequence header record
pub const SEQUENCE_INFO_SIZE: usize = 168;

/// On disk size of one raw key record
pub const KEY_SIZE: usize = 32;

/// Sequence header as stored in the `ANIMINFO` chunk. Most fields are
/// carried through untouched; the conversion pipeline only consumes
/// `name`, `first_raw_frame` and `frame_count`.
#[derive(Clone, Debug)]
pub struct SequenceInfo {
    pub name: String,
    pub group: String,
    pub bone_count: i32,
    pub root_include: i32,
    pub compression_style: i32,
    pub key_quotum: i32,
    pub key_reduction: f32,
    pub track_time: f32,
    pub fps: f32,
    pub start_bone: i32,
    /// Frame offset of this sequence's block in the flat key table
    pub first_raw_frame: i32,
    pub frame_count: i32,
}

impl SequenceInfo {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn named(name: &str, frame_count: i32, fps: f32) -> Self {
        Self {
            name: name.to_owned(),
            group: String::new(),
            bone_count: 0,
            root_include: 1,
            compression_style: 0,
            key_quotum: 0,
            key_reduction: 1.0,
            track_time: frame_count as f32,
            fps,
            start_bone: 0,
            first_raw_frame: 0,
            frame_count,
        }
    }
}

/// One raw sample: a bone transform in the file's world aligned
/// convention. The stored `time` field is carried but not used by the
/// conversion pipeline.
#[derive(Clone, Copy, Debug)]
pub struct Key {
    pub location: glm::Vec3,
    pub rotation: glm::Quat,
    pub time: f32,
}

/// In memory form of a PSA file, mainly useful for authoring. Reading
/// normally goes through `PsaReader` which leaves the key table on disk
/// and slices per sequence.
#[derive(Clone, Debug, Default)]
pub struct Psa {
    pub bones: Vec<Bone>,
    pub sequences: Vec<SequenceInfo>,
    /// Keys ordered by sequence, then frame, then bone
    pub keys: Vec<Key>,
}
