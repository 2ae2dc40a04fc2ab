pub mod bind;
pub mod retarget;
pub mod thin;
mod types;

// Re-exports
pub use {
    bind::{bind_frames, BindPoseSource},
    retarget::{convert, convert_all, map_bones, retarget},
    thin::{keep_all, thin_keys},
    types::{
        BindFrame, BoneMapping, ConvertOptions, KeepMatrix, MappedBone,
        RetargetedSequence, SampleMatrix, CHANNEL_COUNT,
    },
};
