//! Bone records and skeleton reconstruction
//!
//! Both file formats carry the same flat 120 byte bone record. The
//! skeleton builder turns that flat array into a tree with resolved
//! parent links and an incrementally composed world transform per bone.
//!
//! Bind rotations are stored in an inverse facing convention, so world
//! rotations compose with the conjugate of the local rotation. The root
//! bone (index 0, parent index 0) is the exception and keeps its stored
//! rotation as is.

use crate::chunk::{self, FieldCursor};
use crate::ps_error::PsError;
use ahash::{HashMap, HashMapExt};
use nalgebra_glm as glm;
use smallvec::SmallVec;

/// On disk size of one bone record
pub const BONE_RECORD_SIZE: usize = 120;

/// Flat bone record as stored in the file
#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub flags: u32,
    pub children_count: i32,
    pub parent_index: i32,
    pub rotation: glm::Quat,
    pub location: glm::Vec3,
    pub length: f32,
    pub size: glm::Vec3,
}

impl Bone {
    /// A bone with identity transforms, mostly useful for building files
    /// in memory
    #[must_use]
    pub fn named(name: &str, parent_index: i32) -> Self {
        Self {
            name: name.to_owned(),
            flags: 0,
            children_count: 0,
            parent_index,
            rotation: glm::quat(0.0, 0.0, 0.0, 1.0),
            location: glm::Vec3::zeros(),
            length: 0.0,
            size: glm::Vec3::zeros(),
        }
    }

    pub(crate) fn read(cursor: &mut FieldCursor) -> Result<Self, PsError> {
        Ok(Self {
            name: cursor.name64()?,
            flags: cursor.dword()?,
            children_count: cursor.long()?,
            parent_index: cursor.long()?,
            rotation: cursor.quat()?,
            location: cursor.vec3()?,
            length: cursor.float()?,
            size: cursor.vec3()?,
        })
    }

    pub(crate) fn write(&self, out: &mut Vec<u8>) {
        chunk::put_name(out, &self.name);
        chunk::put_u32(out, self.flags);
        chunk::put_i32(out, self.children_count);
        chunk::put_i32(out, self.parent_index);
        chunk::put_quat(out, &self.rotation);
        chunk::put_vec3(out, &self.location);
        chunk::put_f32(out, self.length);
        chunk::put_vec3(out, &self.size);
    }
}

/// One bone of a built skeleton
#[derive(Clone, Debug)]
pub struct SkeletonBone {
    pub name: String,
    pub parent: Option<usize>,
    pub children: SmallVec<[usize; 4]>,
    /// Bind pose rotation relative to the parent, file convention
    pub local_rotation: glm::Quat,
    /// Bind pose offset relative to the parent
    pub local_translation: glm::Vec3,
    pub world_rotation: glm::Quat,
    pub world_translation: glm::Vec3,
}

/// A bone hierarchy with bind pose data. Immutable once built.
#[derive(Clone, Debug)]
pub struct Skeleton {
    bones: Vec<SkeletonBone>,
    by_name: HashMap<String, usize>,
}

impl Skeleton {
    /// Builds a skeleton from flat bone records.
    ///
    /// Negative parent indices are clamped to 0 first; some exporters
    /// write -1 for the root. After clamping, bone 0 must reference
    /// itself and every other bone must reference a strictly earlier
    /// bone, which also rules out cycles.
    ///
    /// # Errors
    /// `PsError::EmptySkeleton`, `PsError::RootBoneParent` or
    /// `PsError::BoneParentOutOfOrder` on structural problems
    pub fn build(records: &[Bone]) -> Result<Self, PsError> {
        if records.is_empty() {
            return Err(PsError::EmptySkeleton);
        }

        let mut bones: Vec<SkeletonBone> = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let parent = usize::try_from(record.parent_index.max(0))
                .map_err(|_| PsError::DataNotConverted)?;
            if index == 0 {
                if parent != 0 {
                    return Err(PsError::RootBoneParent { parent });
                }
                bones.push(SkeletonBone {
                    name: record.name.clone(),
                    parent: None,
                    children: SmallVec::new(),
                    local_rotation: record.rotation,
                    local_translation: record.location,
                    world_rotation: record.rotation,
                    world_translation: record.location,
                });
                continue;
            }
            if parent >= index {
                return Err(PsError::BoneParentOutOfOrder {
                    bone: index,
                    parent,
                });
            }
            let world_rotation = bones[parent].world_rotation
                * glm::quat_conjugate(&record.rotation);
            let world_translation = bones[parent].world_translation
                + glm::quat_rotate_vec3(
                    &bones[parent].world_rotation,
                    &record.location,
                );
            bones[parent].children.push(index);
            bones.push(SkeletonBone {
                name: record.name.clone(),
                parent: Some(parent),
                children: SmallVec::new(),
                local_rotation: record.rotation,
                local_translation: record.location,
                world_rotation,
                world_translation,
            });
        }

        // Second pass builds the name lookup. The first occurrence of a
        // duplicated name wins.
        let mut by_name = HashMap::with_capacity(bones.len());
        for (index, bone) in bones.iter().enumerate() {
            by_name.entry(bone.name.clone()).or_insert(index);
        }

        Ok(Self { bones, by_name })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[must_use]
    pub fn bones(&self) -> &[SkeletonBone] {
        &self.bones
    }

    /// Index of the bone with the given name, if any
    #[must_use]
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}
