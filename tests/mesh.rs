//! End to end tests for the PSK path: serialize, parse back, build the
//! skeleton and the mesh

use nalgebra_glm as glm;
use pskpsa::mesh_build::{self, MeshOptions};
use pskpsa::psk::{self, Face, Material, Psk, Wedge, Weight};
use pskpsa::skeleton::{Bone, Skeleton};
use pskpsa::PsError;
use std::io::Cursor;
use std::sync::Once;

static INIT: Once = Once::new();

fn init_tests() {
    INIT.call_once(|| {
        env_logger::init();
    });
}

fn reopen(psk: &Psk) -> Psk {
    let mut buffer = Vec::new();
    psk::writer::write_to(psk, &mut buffer).unwrap();
    psk::reader::read_from(&mut Cursor::new(buffer)).unwrap()
}

fn small_psk() -> Psk {
    let mut child = Bone::named("child", 0);
    child.location = glm::vec3(0.0, 1.0, 0.0);
    child.rotation = glm::quat_angle_axis(0.5, &glm::vec3(0.0, 0.0, 1.0));
    Psk {
        points: vec![
            glm::vec3(0.0, 0.0, 0.0),
            glm::vec3(1.0, 0.0, 0.0),
            glm::vec3(0.0, 1.0, 0.0),
        ],
        wedges: vec![
            Wedge {
                point_index: 0,
                uv: [0.0, 0.0],
                material_index: 0,
            },
            Wedge {
                point_index: 1,
                uv: [1.0, 0.0],
                material_index: 0,
            },
            Wedge {
                point_index: 2,
                uv: [0.0, 1.0],
                material_index: 0,
            },
        ],
        faces: vec![Face {
            wedge_indices: [0, 1, 2],
            material_index: 0,
            aux_material_index: 0,
            smoothing_groups: 1,
        }],
        materials: vec![Material::named("skin")],
        bones: vec![Bone::named("root", 0), child],
        weights: vec![Weight {
            weight: 1.0,
            point_index: 0,
            bone_index: 1,
        }],
        ..Default::default()
    }
}

/// A PSK with every optional chunk survives a write and read and still
/// assembles
#[test]
fn full_psk_round_trips_and_assembles() {
    init_tests();

    let mut psk = small_psk();
    psk.extra_uvs = vec![[0.5, 0.5]; 3];
    psk.vertex_colors = vec![[255, 0, 0, 255]; 3];
    psk.vertex_normals = vec![glm::vec3(0.0, 0.0, 1.0); 3];

    let loaded = reopen(&psk);
    assert_eq!(loaded.points.len(), 3);
    assert_eq!(loaded.wedges.len(), 3);
    assert_eq!(loaded.faces.len(), 1);
    assert_eq!(loaded.materials[0].name, "skin");
    assert_eq!(loaded.bones.len(), 2);
    assert_eq!(loaded.bones[1].name, "child");
    // Child counts are recomputed on write
    assert_eq!(loaded.bones[0].children_count, 1);
    assert_eq!(loaded.weights.len(), 1);
    assert_eq!(loaded.extra_uv_channel_count(), 1);
    assert!(loaded.has_vertex_colors());
    assert!(loaded.has_vertex_normals());

    let skeleton = Skeleton::build(&loaded.bones).unwrap();
    assert_eq!(skeleton.bone_index("child"), Some(1));

    let mesh =
        mesh_build::build(&loaded, &MeshOptions::default()).unwrap();
    assert_eq!(mesh.faces.len(), 1);
    assert_eq!(mesh.faces[0].vertices, [2, 1, 0]);
    assert_eq!(mesh.uv_layers.len(), 2);
    assert!(mesh.smooth_shading);
    assert_eq!(mesh.vertex_groups.len(), 1);
    assert_eq!(mesh.vertex_groups[0].name, "child");
    assert!(mesh.warnings.is_empty());
}

/// Meshes past the 16 bit wedge limit switch to the wide record layouts
/// and still round trip
#[test]
fn wide_wedge_layout_round_trips() {
    init_tests();

    let count = 70_000u32;
    let points: Vec<glm::Vec3> =
        (0..count).map(|i| glm::vec3(i as f32, 0.0, 0.0)).collect();
    let wedges: Vec<Wedge> = (0..count)
        .map(|i| Wedge {
            point_index: i,
            uv: [0.0, 0.0],
            material_index: 0,
        })
        .collect();
    let psk = Psk {
        points,
        wedges,
        faces: vec![Face {
            wedge_indices: [0, 1, 69_999],
            material_index: 0,
            aux_material_index: 0,
            smoothing_groups: 0,
        }],
        materials: vec![Material::named("skin")],
        bones: vec![Bone::named("root", 0)],
        ..Default::default()
    };

    let loaded = reopen(&psk);
    assert_eq!(loaded.wedges.len(), 70_000);
    assert_eq!(loaded.wedges[69_999].point_index, 69_999);
    assert_eq!(loaded.faces[0].wedge_indices, [0, 1, 69_999]);
}

/// Missing mandatory chunks abort the load
#[test]
fn missing_mandatory_chunk_is_fatal() {
    init_tests();

    // Just the header chunk, nothing else
    let mut buffer = Vec::new();
    pskpsa::chunk::write_header(&mut buffer, "ACTRHEAD", 0, 0).unwrap();
    let result = psk::reader::read_from(&mut Cursor::new(buffer));
    assert!(matches!(result, Err(PsError::MissingChunk(_))));
}

/// A file that does not open with the expected header chunk is invalid
#[test]
fn wrong_magic_is_fatal() {
    init_tests();

    let mut buffer = Vec::new();
    pskpsa::chunk::write_header(&mut buffer, "NOTAPSK0", 0, 0).unwrap();
    let result = psk::reader::read_from(&mut Cursor::new(buffer));
    assert!(matches!(result, Err(PsError::InvalidFile)));
}

/// Names with 8 bit characters survive the trip through the fixed width
/// fields
#[test]
fn names_round_trip_through_fixed_fields() {
    init_tests();

    let mut psk = small_psk();
    psk.materials[0].name = String::from("pi\u{f1}ata");
    psk.bones[1].name = String::from("O\u{2019}Neill");
    let loaded = reopen(&psk);
    assert_eq!(loaded.materials[0].name, "pi\u{f1}ata");
    assert_eq!(loaded.bones[1].name, "O\u{2019}Neill");
}
