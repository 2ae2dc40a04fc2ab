//! End to end tests for the PSA conversion pipeline
//!
//! These drive the real file path: author a PSA in memory, serialize it,
//! parse it back through `PsaReader` and convert against a skeleton
//! built from bone records. The algebra of the world to local
//! conversion is verified by inverting it manually and comparing with
//! the values that went in.

use log::info;
use nalgebra_glm as glm;
use pskpsa::anim::{
    self, bind_frames, BindFrame, BindPoseSource, ConvertOptions,
};
use pskpsa::psa::{self, Key, Psa, PsaReader, SequenceInfo};
use pskpsa::skeleton::{Bone, Skeleton};
use pskpsa::PsError;
use std::io::Cursor;
use std::sync::Once;

const EPSILON: f32 = 1e-5; // Round trip tolerance

static INIT: Once = Once::new();

/// Initializes logging in a "once per test run" manner. Call at the
/// start of each test that needs logging.
fn init_tests() {
    INIT.call_once(|| {
        env_logger::init();
    });
}

fn identity_quat() -> glm::Quat {
    glm::quat(0.0, 0.0, 0.0, 1.0)
}

fn rest_key(location: glm::Vec3) -> Key {
    Key {
        location,
        rotation: identity_quat(),
        time: 0.0,
    }
}

/// Two bone chain: root at the origin, child offset one unit up the Y
/// axis, identity bind rotations
fn chain_bones() -> Vec<Bone> {
    let root = Bone::named("root", 0);
    let mut child = Bone::named("child", 0);
    child.location = glm::vec3(0.0, 1.0, 0.0);
    vec![root, child]
}

/// Serializes a `Psa` and opens it back through the reader
fn reopen(psa: &Psa) -> PsaReader<Cursor<Vec<u8>>> {
    let mut buffer = Vec::new();
    psa::writer::write_to(psa, &mut buffer).unwrap();
    PsaReader::new(Cursor::new(buffer)).unwrap()
}

/// Inverse of the world to local sample conversion, used to verify the
/// round trip property
fn invert_sample(
    bind: &BindFrame,
    treat_as_root: bool,
    local: &[f32],
) -> [f32; 7] {
    let local_rotation = glm::quat(local[1], local[2], local[3], local[0]);
    let local_location = glm::vec3(local[4], local[5], local[6]);

    let q1 = bind.orig_quat * bind.post_quat;
    let q2 = q1 * glm::quat_conjugate(&local_rotation);
    let mut key = q2 * glm::quat_conjugate(&bind.post_quat);
    if treat_as_root {
        key = glm::quat_conjugate(&key);
    }
    let key_location =
        glm::quat_rotate_vec3(&bind.post_quat, &local_location)
            + bind.orig_loc;
    [
        key.w,
        key.i,
        key.j,
        key.k,
        key_location.x,
        key_location.y,
        key_location.z,
    ]
}

/// Converting world samples to local space and applying the inverse
/// transform must reproduce the input within tolerance, for the root
/// and for a child bone
#[test]
fn round_trip_reproduces_world_samples() {
    init_tests();

    let bones = chain_bones();
    let frame_count = 3;
    let mut keys = Vec::new();
    for frame in 0..frame_count {
        let angle = 0.3 * (frame as f32 + 1.0);
        keys.push(Key {
            location: glm::vec3(0.1 * frame as f32, 0.0, 0.2),
            rotation: glm::quat_angle_axis(
                angle,
                &glm::vec3(0.0, 0.0, 1.0),
            ),
            time: frame as f32,
        });
        keys.push(Key {
            location: glm::vec3(0.0, 1.0, 0.3 * frame as f32),
            rotation: glm::quat_angle_axis(
                -angle,
                &glm::vec3(1.0, 0.0, 0.0),
            ),
            time: frame as f32,
        });
    }
    let psa = Psa {
        bones: bones.clone(),
        sequences: vec![SequenceInfo::named("Sway", frame_count, 30.0)],
        keys,
    };

    let mut reader = reopen(&psa);
    let skeleton = Skeleton::build(&bones).unwrap();
    let world = reader.read_sequence_matrix("Sway").unwrap();

    let options = ConvertOptions {
        clean_keys: false,
        ..Default::default()
    };
    let result =
        anim::convert(&mut reader, "Sway", &skeleton, &options).unwrap();
    assert!(result.unmapped.is_empty());

    let frames = bind_frames(&skeleton, BindPoseSource::Cached);
    for frame in 0..world.frame_count() {
        for bone in 0..world.bone_count() {
            let treat_as_root = bone == 0;
            let recovered = invert_sample(
                &frames[bone],
                treat_as_root,
                result.samples.sample(frame, bone),
            );
            let original = world.sample(frame, bone);
            info!(
                "frame={frame} bone={bone} original={original:?} \
                 recovered={recovered:?}"
            );
            for channel in 0..7 {
                assert!(
                    (original[channel] - recovered[channel]).abs()
                        < EPSILON
                );
            }
        }
    }
}

/// An animation bone missing from the target skeleton lands in the
/// unmapped list, gets no keyframes, and leaves other bones unaffected
#[test]
fn missing_bone_is_reported_and_skipped() {
    init_tests();

    let mut bones = chain_bones();
    bones.push(Bone::named("Spine", 0));
    let frame_count = 2;
    let mut keys = Vec::new();
    for _ in 0..frame_count {
        keys.push(rest_key(glm::vec3(0.0, 0.0, 0.0)));
        keys.push(rest_key(glm::vec3(0.0, 1.0, 0.0)));
        keys.push(rest_key(glm::vec3(0.0, 2.0, 0.0)));
    }
    let psa = Psa {
        bones,
        sequences: vec![SequenceInfo::named("Idle", frame_count, 30.0)],
        keys,
    };

    let mut reader = reopen(&psa);
    // Target skeleton only has the chain, no "Spine"
    let skeleton = Skeleton::build(&chain_bones()).unwrap();
    let options = ConvertOptions::default();
    let result =
        anim::convert(&mut reader, "Idle", &skeleton, &options).unwrap();

    assert_eq!(result.unmapped, vec!["Spine"]);
    for frame in 0..result.samples.frame_count() {
        // No keyframes at all for the unmapped bone
        assert!(result.keep.row(frame, 2).iter().all(|&k| !k));
    }
    // The mapped bones still get their frame 0 keys
    assert!(result.keep.row(0, 0).iter().all(|&k| k));
    assert!(result.keep.row(0, 1).iter().all(|&k| k));
}

/// The concrete thinning scenario: a child that rotates away and back.
/// The return frame must still be kept because thinning compares
/// against the last kept frame, not frame 0.
#[test]
fn thinning_keeps_the_reverted_frame() {
    init_tests();

    let bones = chain_bones();
    let rotated =
        glm::quat_angle_axis(std::f32::consts::FRAC_PI_2, &glm::vec3(0.0, 0.0, 1.0));
    let frame_count = 4;
    let mut keys = Vec::new();
    for frame in 0..frame_count {
        keys.push(rest_key(glm::vec3(0.0, 0.0, 0.0)));
        keys.push(Key {
            location: glm::vec3(0.0, 1.0, 0.0),
            rotation: if frame == 2 { rotated } else { identity_quat() },
            time: frame as f32,
        });
    }
    let psa = Psa {
        bones: bones.clone(),
        sequences: vec![SequenceInfo::named("Wave", frame_count, 30.0)],
        keys,
    };

    let mut reader = reopen(&psa);
    let skeleton = Skeleton::build(&bones).unwrap();
    let options = ConvertOptions::default(); // clean_keys, epsilon 0.001
    let result =
        anim::convert(&mut reader, "Wave", &skeleton, &options).unwrap();

    // Rotation w channel of the child: rest is 1.0, the rotated frame
    // drops to cos(45 degrees)
    assert!(result.keep.is_kept(0, 1, 0));
    assert!(!result.keep.is_kept(1, 1, 0)); // Unchanged since frame 0
    assert!(result.keep.is_kept(2, 1, 0)); // Rotated
    assert!(result.keep.is_kept(3, 1, 0)); // Reverted, differs from 2

    // Translation never changes, so only frame 0 carries keys
    for frame in 1..4 {
        assert!(!result.keep.is_kept(frame, 1, 4));
        assert!(!result.keep.is_kept(frame, 1, 5));
        assert!(!result.keep.is_kept(frame, 1, 6));
    }

    // The root never moves at all
    for frame in 1..4 {
        assert!(result.keep.row(frame, 0).iter().all(|&k| !k));
    }
}

/// Sequence blocks are sliced out of the flat key table by their stored
/// starting frame
#[test]
fn second_sequence_slices_its_own_block() {
    init_tests();

    let bones = vec![Bone::named("root", 0)];
    let mut keys = Vec::new();
    // Sequence "A": 2 frames, translation marks the sequence
    for frame in 0..2 {
        keys.push(rest_key(glm::vec3(1.0, frame as f32, 0.0)));
    }
    // Sequence "B": 3 frames
    for frame in 0..3 {
        keys.push(rest_key(glm::vec3(2.0, frame as f32, 0.0)));
    }
    let psa = Psa {
        bones,
        sequences: vec![
            SequenceInfo::named("A", 2, 30.0),
            SequenceInfo::named("B", 3, 30.0),
        ],
        keys,
    };

    let mut reader = reopen(&psa);
    assert_eq!(reader.sequence("B").unwrap().first_raw_frame, 2);
    let matrix = reader.read_sequence_matrix("B").unwrap();
    assert_eq!(matrix.frame_count(), 3);
    for frame in 0..3 {
        assert!((matrix.value(frame, 0, 4) - 2.0).abs() < EPSILON);
        assert!(
            (matrix.value(frame, 0, 5) - frame as f32).abs() < EPSILON
        );
    }

    let missing = reader.read_sequence_matrix("C");
    assert!(matches!(missing, Err(PsError::SequenceNotFound(_))));
}

/// A key table that ends early is a structural error, nothing partial
/// comes back
#[test]
fn truncated_key_table_is_fatal() {
    init_tests();

    let bones = vec![Bone::named("root", 0)];
    let keys = vec![
        rest_key(glm::vec3(0.0, 0.0, 0.0)),
        rest_key(glm::vec3(0.0, 0.0, 1.0)),
    ];
    let psa = Psa {
        bones,
        sequences: vec![SequenceInfo::named("Cut", 2, 30.0)],
        keys,
    };
    let mut buffer = Vec::new();
    psa::writer::write_to(&psa, &mut buffer).unwrap();
    // Chop the last key off the end of the file
    buffer.truncate(buffer.len() - 32);

    let mut reader = PsaReader::new(Cursor::new(buffer)).unwrap();
    let result = reader.read_sequence_matrix("Cut");
    assert!(matches!(result, Err(PsError::TruncatedKeyTable(_))));
}

/// Disabled thinning keeps every frame of every mapped bone
#[test]
fn disabled_thinning_keeps_everything() {
    init_tests();

    let bones = chain_bones();
    let frame_count = 3;
    let mut keys = Vec::new();
    for _ in 0..frame_count {
        keys.push(rest_key(glm::vec3(0.0, 0.0, 0.0)));
        keys.push(rest_key(glm::vec3(0.0, 1.0, 0.0)));
    }
    let psa = Psa {
        bones: bones.clone(),
        sequences: vec![SequenceInfo::named("Hold", frame_count, 30.0)],
        keys,
    };

    let mut reader = reopen(&psa);
    let skeleton = Skeleton::build(&bones).unwrap();
    let options = ConvertOptions {
        clean_keys: false,
        ..Default::default()
    };
    let result =
        anim::convert(&mut reader, "Hold", &skeleton, &options).unwrap();
    for frame in 0..3 {
        for bone in 0..2 {
            assert!(result.keep.row(frame, bone).iter().all(|&k| k));
        }
    }
}
