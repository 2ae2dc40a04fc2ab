//! Keyframe thinning
//!
//! Marks which converted samples are worth writing as keyframes. Each of
//! the 7 channels of each mapped bone is walked independently: frame 0
//! is always kept, and a later frame is kept only when its value moved
//! at least `epsilon` away from the last kept value. Comparing against
//! the last kept frame (not the previous frame) is what lets a value
//! that drifts away and back still produce a key at the return point.

use super::types::{BoneMapping, KeepMatrix, SampleMatrix, CHANNEL_COUNT};

/// Builds the keep matrix for a converted sequence. This is lossy by
/// design: between two consecutive kept keys the channel error is
/// bounded by `epsilon`. An epsilon of 0 keeps every frame. Bones that
/// did not map onto the target skeleton get all false rows.
#[must_use]
pub fn thin_keys(
    samples: &SampleMatrix,
    mapping: &BoneMapping,
    epsilon: f32,
) -> KeepMatrix {
    let mut keep =
        KeepMatrix::new(samples.frame_count(), samples.bone_count());
    if samples.frame_count() == 0 {
        return keep;
    }
    for (bone, entry) in mapping.entries.iter().enumerate() {
        if entry.is_none() {
            continue;
        }
        for channel in 0..CHANNEL_COUNT {
            keep.set(0, bone, channel, true);
            let mut last_kept = samples.value(0, bone, channel);
            for frame in 1..samples.frame_count() {
                let value = samples.value(frame, bone, channel);
                if (value - last_kept).abs() >= epsilon {
                    keep.set(frame, bone, channel, true);
                    last_kept = value;
                }
            }
        }
    }
    keep
}

/// The keep matrix for disabled thinning: every frame of every mapped
/// bone is kept, unmapped bones stay masked off
#[must_use]
pub fn keep_all(
    samples: &SampleMatrix,
    mapping: &BoneMapping,
) -> KeepMatrix {
    let mut keep =
        KeepMatrix::new(samples.frame_count(), samples.bone_count());
    for (bone, entry) in mapping.entries.iter().enumerate() {
        if entry.is_none() {
            continue;
        }
        for frame in 0..samples.frame_count() {
            for channel in 0..CHANNEL_COUNT {
                keep.set(frame, bone, channel, true);
            }
        }
    }
    keep
}
