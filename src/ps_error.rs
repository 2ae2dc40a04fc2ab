use std::{error, fmt};

/// Unified error type
///
/// Everything in here is fatal to the operation that returned it: a file
/// that fails to parse returns an error and nothing else, it is never
/// partially loaded. Recoverable oddities (bones missing from a target
/// skeleton, degenerate faces, ambiguous vertex colors) are not errors;
/// they are returned as warning values on the result structs so the caller
/// decides what becomes user visible.
///
/// Name fields never produce an error. Authoring tools for these formats
/// are known to emit non standard encodings so decoding is best effort
/// (see the `name` module).
#[derive(Debug)]
pub enum PsError {
    InvalidFile,
    DataNotConverted,
    TruncatedChunk(String),
    UnexpectedItemSize { chunk: String, size: i32 },
    CountMismatch { chunk: &'static str },
    MissingChunk(&'static str),
    EmptySkeleton,
    RootBoneParent { parent: usize },
    BoneParentOutOfOrder { bone: usize, parent: usize },
    PointIndexTooLarge { wedge: usize, point: usize },
    WedgeIndexTooLarge { face: usize, wedge: usize },
    WeightIndexTooLarge { index: usize },
    SequenceNotFound(String),
    TruncatedKeyTable(String),
    StdIoError(std::io::Error),
    SerdeYamlError(Box<serde_yaml::Error>),
}

impl error::Error for PsError {}

impl fmt::Display for PsError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::InvalidFile => write!(f, "invalid file"),
            Self::DataNotConverted => {
                write!(f, "data could not convert to a valid value")
            }
            Self::TruncatedChunk(tag) => {
                write!(f, "chunk \"{tag}\" is truncated")
            }
            Self::UnexpectedItemSize { chunk, size } => {
                write!(f, "chunk \"{chunk}\" has unexpected item size {size}")
            }
            Self::CountMismatch { chunk } => {
                write!(f, "chunk \"{chunk}\" has an inconsistent item count")
            }
            Self::MissingChunk(tag) => {
                write!(f, "required chunk \"{tag}\" is missing")
            }
            Self::EmptySkeleton => write!(f, "bone table is empty"),
            Self::RootBoneParent { parent } => {
                write!(f, "root bone declares parent index {parent}")
            }
            Self::BoneParentOutOfOrder { bone, parent } => {
                write!(
                    f,
                    "bone {bone} references parent {parent} which is not an \
                     earlier bone"
                )
            }
            Self::PointIndexTooLarge { wedge, point } => {
                write!(f, "wedge {wedge} references missing point {point}")
            }
            Self::WedgeIndexTooLarge { face, wedge } => {
                write!(f, "face {face} references missing wedge {wedge}")
            }
            Self::WeightIndexTooLarge { index } => {
                write!(f, "weight {index} references a missing point or bone")
            }
            Self::SequenceNotFound(name) => {
                write!(f, "sequence \"{name}\" not found")
            }
            Self::TruncatedKeyTable(name) => {
                write!(
                    f,
                    "key table ends before sequence \"{name}\" is complete"
                )
            }
            Self::StdIoError(e) => write!(f, "std::io::Error: {}", e.kind()),
            Self::SerdeYamlError(e) => {
                write!(f, "serde_yaml::Error: {e}")
            }
        }
    }
}

impl From<std::io::Error> for PsError {
    fn from(e: std::io::Error) -> Self {
        Self::StdIoError(e)
    }
}

impl From<serde_yaml::Error> for PsError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::SerdeYamlError(Box::new(e))
    }
}
