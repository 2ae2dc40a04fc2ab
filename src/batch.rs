//! Import sets
//!
//! An import set is a small YAML manifest describing a PSK / PSA pair
//! and how to convert it, so a whole character import is one call. The
//! target skeleton comes from the PSK when one is given, otherwise the
//! animations are converted against the PSA's own bone table.
//!
//! ```yaml
//! psk: models/hero.psk
//! psa: models/hero.psa
//! sequences: [Idle, Run]
//! anim:
//!   epsilon: 0.002
//! ```

use crate::anim::{convert_all, ConvertOptions, RetargetedSequence};
use crate::mesh_build::{self, MeshBuild, MeshOptions};
use crate::ps_error::PsError;
use crate::psa::PsaReader;
use crate::psk;
use crate::skeleton::Skeleton;
use log::info;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Manifest for one import. Omitted option blocks take their defaults.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ImportSet {
    pub psk: Option<String>,
    pub psa: Option<String>,
    /// Sequences to convert; empty means every sequence in the PSA
    #[serde(default)]
    pub sequences: Vec<String>,
    #[serde(default)]
    pub mesh: MeshOptions,
    #[serde(default)]
    pub anim: ConvertOptions,
}

impl ImportSet {
    /// Loads a manifest from a YAML file
    ///
    /// # Errors
    /// May return `PsError`
    pub fn load<P>(path: P) -> Result<Self, PsError>
    where
        P: AsRef<Path>,
    {
        let text = fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

/// Everything an import set produced
#[derive(Debug, Default)]
pub struct Imported {
    pub skeleton: Option<Skeleton>,
    pub mesh: Option<MeshBuild>,
    pub sequences: Vec<RetargetedSequence>,
}

/// Runs an import set: loads the PSK, assembles its mesh and skeleton,
/// then converts the selected sequences from the PSA against that
/// skeleton (or against the PSA's own bone table if no PSK was given).
///
/// # Errors
/// May return `PsError`
pub fn run(set: &ImportSet) -> Result<Imported, PsError> {
    let mut imported = Imported::default();

    if let Some(psk_path) = &set.psk {
        info!("loading mesh from {psk_path}");
        let psk = psk::reader::load(psk_path)?;
        imported.skeleton = Some(Skeleton::build(&psk.bones)?);
        imported.mesh = Some(mesh_build::build(&psk, &set.mesh)?);
    }

    if let Some(psa_path) = &set.psa {
        info!("loading animations from {psa_path}");
        let mut reader = PsaReader::open(psa_path)?;
        let skeleton = match imported.skeleton.take() {
            Some(skeleton) => skeleton,
            None => Skeleton::build(reader.bones())?,
        };
        let names: Vec<String> = if set.sequences.is_empty() {
            reader
                .sequences()
                .iter()
                .map(|s| s.name.clone())
                .collect()
        } else {
            set.sequences.clone()
        };
        imported.sequences =
            convert_all(&mut reader, &names, &skeleton, &set.anim)?;
        imported.skeleton = Some(skeleton);
    }

    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::ImportSet;
    use crate::anim::BindPoseSource;

    #[test]
    fn manifest_defaults_apply() {
        let set: ImportSet =
            serde_yaml::from_str("psa: anims/walk.psa\n").unwrap();
        assert!(set.psk.is_none());
        assert!(set.sequences.is_empty());
        assert!(set.anim.clean_keys);
        assert!((set.anim.epsilon - 0.001).abs() < 1e-9);
        assert_eq!(set.anim.bind_source, BindPoseSource::Cached);
        assert!(set.mesh.vertex_colors);
    }

    #[test]
    fn manifest_overrides_apply() {
        let yaml = "psk: hero.psk\n\
                    psa: hero.psa\n\
                    sequences: [Idle]\n\
                    mesh:\n  color_space: linear\n\
                    anim:\n  clean_keys: false\n  bind_source: derived\n";
        let set: ImportSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(set.sequences, vec!["Idle"]);
        assert!(!set.anim.clean_keys);
        assert_eq!(set.anim.bind_source, BindPoseSource::Derived);
        assert_eq!(
            set.mesh.color_space,
            crate::mesh_build::ColorSpace::Linear
        );
    }
}
