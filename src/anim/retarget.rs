//! Animation retargeting
//!
//! Maps a PSA bone table onto a target skeleton by exact name and
//! rewrites every sample from the file's world aligned convention into
//! bone local space. The conjugation chain below is the correctness
//! critical part of the whole crate: a sign or order mistake produces
//! globally flipped or drifting animation that no type check will catch,
//! so it stays in one small function with the round trip test in
//! `tests/convert.rs` guarding it.

use super::bind::bind_frames;
use super::thin::{keep_all, thin_keys};
use super::types::{
    BindFrame, BoneMapping, ConvertOptions, MappedBone, RetargetedSequence,
    SampleMatrix,
};
use crate::ps_error::PsError;
use crate::psa::PsaReader;
use crate::skeleton::Skeleton;
use ahash::{HashSet, HashSetExt};
use log::{info, warn};
use nalgebra_glm as glm;
use std::io::{Read, Seek};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Matches animation bones onto the target skeleton by exact name.
/// Unmatched animation bones are collected into the sorted `unmapped`
/// list and skipped by every later stage; unmatched target bones are
/// simply unaffected.
#[must_use]
pub fn map_bones(
    anim_bone_names: &[String],
    skeleton: &Skeleton,
) -> BoneMapping {
    let mut anim_names = HashSet::with_capacity(anim_bone_names.len());
    for name in anim_bone_names {
        anim_names.insert(name.as_str());
    }

    let mut entries = Vec::with_capacity(anim_bone_names.len());
    let mut unmapped = Vec::new();
    for name in anim_bone_names {
        match skeleton.bone_index(name) {
            Some(target_index) => {
                // A mapped bone converts as a root when it has nothing
                // to inherit a frame from: no parent at all, or a parent
                // the animation does not carry
                let treat_as_root = skeleton.bones()[target_index]
                    .parent
                    .map_or(true, |p| {
                        !anim_names
                            .contains(skeleton.bones()[p].name.as_str())
                    });
                entries.push(Some(MappedBone {
                    target_index,
                    treat_as_root,
                }));
            }
            None => {
                entries.push(None);
                unmapped.push(name.clone());
            }
        }
    }
    unmapped.sort();
    unmapped.dedup();
    if !unmapped.is_empty() {
        warn!(
            "target skeleton is missing {} bone(s): {:?}",
            unmapped.len(),
            unmapped,
        );
    }
    BoneMapping { entries, unmapped }
}

/// Converts one world space sample into the bone's local space
fn convert_sample(
    bind: &BindFrame,
    treat_as_root: bool,
    sample: &[f32],
) -> [f32; 7] {
    let key_rotation =
        glm::quat(sample[1], sample[2], sample[3], sample[0]);
    let key_location = glm::vec3(sample[4], sample[5], sample[6]);

    let q1 = bind.orig_quat * bind.post_quat;
    let key = if treat_as_root {
        // The root has no parent frame to inherit the axis convention
        // from and needs the extra conjugation
        glm::quat_conjugate(&key_rotation)
    } else {
        key_rotation
    };
    let q2 = key * bind.post_quat;
    let rotation = glm::quat_conjugate(&q2) * q1;
    let location = glm::quat_rotate_vec3(
        &glm::quat_conjugate(&bind.post_quat),
        &(key_location - bind.orig_loc),
    );
    [
        rotation.w, rotation.i, rotation.j, rotation.k, //
        location.x, location.y, location.z,
    ]
}

/// Rewrites a sequence's samples from world space to target local
/// space. Produces a new matrix; samples of unmapped bones are copied
/// through unchanged so the output keeps its shape (the keep matrix
/// masks them off).
///
/// # Panics
/// Panics if `mapping` or `frames` do not belong to this matrix and
/// skeleton
#[must_use]
pub fn retarget(
    samples: &SampleMatrix,
    mapping: &BoneMapping,
    frames: &[BindFrame],
) -> SampleMatrix {
    let mut out = samples.clone();
    for (bone, entry) in mapping.entries.iter().enumerate() {
        let Some(mapped) = entry else {
            continue;
        };
        let bind = &frames[mapped.target_index];
        for frame in 0..samples.frame_count() {
            let converted = convert_sample(
                bind,
                mapped.treat_as_root,
                samples.sample(frame, bone),
            );
            out.sample_mut(frame, bone).copy_from_slice(&converted);
        }
    }
    out
}

fn convert_matrix(
    name: &str,
    samples: &SampleMatrix,
    mapping: &BoneMapping,
    frames: &[BindFrame],
    options: &ConvertOptions,
) -> RetargetedSequence {
    let local = retarget(samples, mapping, frames);
    let keep = if options.clean_keys {
        thin_keys(&local, mapping, options.epsilon)
    } else {
        keep_all(&local, mapping)
    };
    RetargetedSequence {
        name: name.to_owned(),
        samples: local,
        keep,
        unmapped: mapping.unmapped.clone(),
    }
}

/// Converts one sequence for the target skeleton
///
/// # Errors
/// May return `PsError`
pub fn convert<R: Read + Seek>(
    reader: &mut PsaReader<R>,
    sequence_name: &str,
    skeleton: &Skeleton,
    options: &ConvertOptions,
) -> Result<RetargetedSequence, PsError> {
    let mapping = map_bones(reader.bone_names(), skeleton);
    let frames = bind_frames(skeleton, options.bind_source);
    let samples = reader.read_sequence_matrix(sequence_name)?;
    info!(
        "converting \"{}\": frames={} mapped bones={}/{}",
        sequence_name,
        samples.frame_count(),
        mapping.mapped_count(),
        samples.bone_count(),
    );
    Ok(convert_matrix(
        sequence_name,
        &samples,
        &mapping,
        &frames,
        options,
    ))
}

/// Converts several sequences for the same target skeleton. Key blocks
/// are read sequentially from the file; the conversions themselves are
/// independent per sequence and run in parallel with the `rayon`
/// feature.
///
/// # Errors
/// May return `PsError`
pub fn convert_all<R: Read + Seek>(
    reader: &mut PsaReader<R>,
    sequence_names: &[String],
    skeleton: &Skeleton,
    options: &ConvertOptions,
) -> Result<Vec<RetargetedSequence>, PsError> {
    let mapping = map_bones(reader.bone_names(), skeleton);
    let frames = bind_frames(skeleton, options.bind_source);

    let mut raw = Vec::with_capacity(sequence_names.len());
    for name in sequence_names {
        raw.push((name, reader.read_sequence_matrix(name)?));
    }

    #[cfg(feature = "rayon")]
    let it = raw.par_iter();
    #[cfg(not(feature = "rayon"))]
    let it = raw.iter();
    Ok(it
        .map(|(name, samples)| {
            convert_matrix(name.as_str(), samples, &mapping, &frames, options)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{map_bones, retarget};
    use crate::anim::bind::{bind_frames, BindPoseSource};
    use crate::anim::types::SampleMatrix;
    use crate::skeleton::{Bone, Skeleton};
    use nalgebra_glm as glm;

    fn two_bone_chain() -> Skeleton {
        let root = Bone::named("root", 0);
        let mut child = Bone::named("child", 0);
        child.location = glm::vec3(0.0, 1.0, 0.0);
        Skeleton::build(&[root, child]).unwrap()
    }

    #[test]
    fn unmatched_bones_are_reported_sorted() {
        let skeleton = two_bone_chain();
        let names = vec![
            String::from("root"),
            String::from("Spine"),
            String::from("child"),
            String::from("Head"),
        ];
        let mapping = map_bones(&names, &skeleton);
        assert_eq!(mapping.unmapped, vec!["Head", "Spine"]);
        assert!(mapping.entries[1].is_none());
        assert_eq!(mapping.mapped_count(), 2);
    }

    #[test]
    fn orphaned_parent_makes_a_bone_root() {
        let skeleton = two_bone_chain();
        // The animation carries the child but not its parent
        let names = vec![String::from("child")];
        let mapping = map_bones(&names, &skeleton);
        let mapped = mapping.entries[0].unwrap();
        assert!(mapped.treat_as_root);
    }

    #[test]
    fn unmapped_samples_pass_through_unchanged() {
        let skeleton = two_bone_chain();
        let names = vec![String::from("root"), String::from("Spine")];
        let mapping = map_bones(&names, &skeleton);
        let frames = bind_frames(&skeleton, BindPoseSource::Cached);

        let mut samples = SampleMatrix::new(2, 2);
        for frame in 0..2 {
            samples.sample_mut(frame, 1).copy_from_slice(&[
                0.5, 0.5, 0.5, 0.5, 1.0, 2.0, 3.0,
            ]);
        }
        let out = retarget(&samples, &mapping, &frames);
        for frame in 0..2 {
            assert_eq!(
                out.sample(frame, 1),
                &[0.5, 0.5, 0.5, 0.5, 1.0, 2.0, 3.0]
            );
        }
    }
}
