//! Bind pose reference frames
//!
//! For every bone of the target skeleton this derives the quaternion
//! pair (`orig_quat`, `post_quat`) and offset (`orig_loc`) that move an
//! animation sample between the file's world aligned convention and the
//! bone's local space.

use super::types::BindFrame;
use crate::skeleton::Skeleton;
use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// Where the bind pose reference frames come from.
///
/// The two strategies are numerically interchangeable for every bone
/// with a parent. They differ at the root: `Derived` recomputes from the
/// composed world matrices and skips the conjugation the root's stored
/// rotation needs, which flips converted animation 180 degrees around
/// the vertical. That behavior is kept for parity with rigs whose bind
/// data is only available as matrices; prefer `Cached` whenever the
/// exact file values are available.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindPoseSource {
    /// Exact bind pose values carried from the file
    Cached,
    /// Recomputed from the skeleton's composed world transforms
    Derived,
}

/// Calculates a reference frame per skeleton bone
#[must_use]
pub fn bind_frames(
    skeleton: &Skeleton,
    source: BindPoseSource,
) -> Vec<BindFrame> {
    skeleton
        .bones()
        .iter()
        .map(|bone| {
            let (orig_quat, orig_loc) = match (source, bone.parent) {
                (BindPoseSource::Cached, Some(_)) => {
                    (bone.local_rotation, bone.local_translation)
                }
                (BindPoseSource::Cached, None) => (
                    glm::quat_conjugate(&bone.local_rotation),
                    bone.local_translation,
                ),
                (BindPoseSource::Derived, Some(parent)) => {
                    let parent = &skeleton.bones()[parent];
                    let inv_parent =
                        glm::quat_conjugate(&parent.world_rotation);
                    let quat = glm::quat_conjugate(
                        &(inv_parent * bone.world_rotation),
                    );
                    let loc = glm::quat_rotate_vec3(
                        &inv_parent,
                        &(bone.world_translation
                            - parent.world_translation),
                    );
                    (quat, loc)
                }
                (BindPoseSource::Derived, None) => {
                    // Known divergent: no conjugation here, see the enum
                    // docs
                    (bone.world_rotation, bone.world_translation)
                }
            };
            BindFrame {
                orig_quat,
                orig_loc,
                post_quat: glm::quat_conjugate(&orig_quat),
            }
        })
        .collect()
}
