//! Reader, writer and rig converter for PSK/PSA skeletal mesh and
//! animation files.
//!
//! PSK files carry a skinned mesh plus the skeleton it was bound to. PSA
//! files carry named animation sequences sampled against a bone table in a
//! world aligned convention. This crate parses both formats, assembles a
//! renderable mesh from the flat PSK records, rebuilds the bone hierarchy
//! with its bind pose, and converts PSA samples into bone local keyframes
//! for a target skeleton, with optional keyframe thinning.
//!
//! The conversion pipeline is pure and synchronous: each stage takes its
//! input by reference and produces a new buffer, so sequences can be
//! processed independently (see the optional `rayon` feature).

pub mod anim;
pub mod batch;
pub mod chunk;
pub mod mesh_build;
pub mod name;
pub mod ps_error;
pub mod psa;
pub mod psk;
pub mod skeleton;

// Re-export the error type since almost every public function returns it
pub use ps_error::PsError;
