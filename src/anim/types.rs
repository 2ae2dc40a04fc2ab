use super::bind::BindPoseSource;
use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// Channels per sample: rotation w, x, y, z then translation x, y, z
pub const CHANNEL_COUNT: usize = 7;

/// Dense frame major sample storage for one sequence. Each
/// `(frame, bone)` cell is a 7 wide row in `CHANNEL_COUNT` order.
///
/// Conversion stages treat this as immutable input and produce a new
/// matrix, so a sequence is never observable in a half converted state.
#[derive(Clone, Debug)]
pub struct SampleMatrix {
    frame_count: usize,
    bone_count: usize,
    data: Vec<f32>,
}

impl SampleMatrix {
    #[must_use]
    pub fn new(frame_count: usize, bone_count: usize) -> Self {
        Self {
            frame_count,
            bone_count,
            data: vec![0.0; frame_count * bone_count * CHANNEL_COUNT],
        }
    }

    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[must_use]
    pub const fn bone_count(&self) -> usize {
        self.bone_count
    }

    const fn offset(&self, frame: usize, bone: usize) -> usize {
        (frame * self.bone_count + bone) * CHANNEL_COUNT
    }

    /// The 7 channel row for one bone at one frame
    ///
    /// # Panics
    /// Panics if `frame` or `bone` is out of range
    #[must_use]
    pub fn sample(&self, frame: usize, bone: usize) -> &[f32] {
        let offset = self.offset(frame, bone);
        &self.data[offset..offset + CHANNEL_COUNT]
    }

    /// # Panics
    /// Panics if `frame` or `bone` is out of range
    pub fn sample_mut(&mut self, frame: usize, bone: usize) -> &mut [f32] {
        let offset = self.offset(frame, bone);
        &mut self.data[offset..offset + CHANNEL_COUNT]
    }

    /// # Panics
    /// Panics if any index is out of range
    #[must_use]
    pub fn value(&self, frame: usize, bone: usize, channel: usize) -> f32 {
        self.data[self.offset(frame, bone) + channel]
    }

    /// Flat storage, frame major
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

/// Boolean matrix parallel to a `SampleMatrix`: true marks a channel
/// value that should be written as a keyframe
#[derive(Clone, Debug)]
pub struct KeepMatrix {
    frame_count: usize,
    bone_count: usize,
    data: Vec<bool>,
}

impl KeepMatrix {
    /// A keep matrix with every entry false
    #[must_use]
    pub fn new(frame_count: usize, bone_count: usize) -> Self {
        Self {
            frame_count,
            bone_count,
            data: vec![false; frame_count * bone_count * CHANNEL_COUNT],
        }
    }

    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[must_use]
    pub const fn bone_count(&self) -> usize {
        self.bone_count
    }

    const fn offset(&self, frame: usize, bone: usize) -> usize {
        (frame * self.bone_count + bone) * CHANNEL_COUNT
    }

    /// The 7 channel keep row for one bone at one frame
    ///
    /// # Panics
    /// Panics if `frame` or `bone` is out of range
    #[must_use]
    pub fn row(&self, frame: usize, bone: usize) -> &[bool] {
        let offset = self.offset(frame, bone);
        &self.data[offset..offset + CHANNEL_COUNT]
    }

    /// # Panics
    /// Panics if any index is out of range
    #[must_use]
    pub fn is_kept(
        &self,
        frame: usize,
        bone: usize,
        channel: usize,
    ) -> bool {
        self.data[self.offset(frame, bone) + channel]
    }

    /// # Panics
    /// Panics if any index is out of range
    pub fn set(
        &mut self,
        frame: usize,
        bone: usize,
        channel: usize,
        value: bool,
    ) {
        let offset = self.offset(frame, bone);
        self.data[offset + channel] = value;
    }
}

/// Reference frame pair used to move samples between the file's world
/// aligned convention and a bone's local space. `post_quat` is always
/// the conjugate of `orig_quat`.
#[derive(Clone, Copy, Debug)]
pub struct BindFrame {
    pub orig_quat: glm::Quat,
    pub orig_loc: glm::Vec3,
    pub post_quat: glm::Quat,
}

/// One animation bone resolved onto the target skeleton
#[derive(Clone, Copy, Debug)]
pub struct MappedBone {
    pub target_index: usize,
    /// True when the target bone has no parent, or its parent is not
    /// part of the animation's bone table. Such bones get the root
    /// conjugation during conversion.
    pub treat_as_root: bool,
}

/// Name based mapping from an animation bone table onto a target
/// skeleton. `entries` is indexed by animation bone; unmatched bones are
/// `None` and their names are collected, sorted, in `unmapped`.
#[derive(Clone, Debug, Default)]
pub struct BoneMapping {
    pub entries: Vec<Option<MappedBone>>,
    pub unmapped: Vec<String>,
}

impl BoneMapping {
    #[must_use]
    pub fn mapped_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }
}

/// Options for the sequence conversion pipeline
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ConvertOptions {
    /// Thin redundant keyframes after conversion
    pub clean_keys: bool,
    /// Per channel threshold for keyframe thinning
    pub epsilon: f32,
    pub bind_source: BindPoseSource,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            clean_keys: true,
            epsilon: 0.001,
            bind_source: BindPoseSource::Cached,
        }
    }
}

/// A fully converted sequence: local space samples, the parallel keep
/// matrix, and the animation bones that did not map onto the target
/// skeleton
#[derive(Clone, Debug)]
pub struct RetargetedSequence {
    pub name: String,
    pub samples: SampleMatrix,
    pub keep: KeepMatrix,
    pub unmapped: Vec<String>,
}
