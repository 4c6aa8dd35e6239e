//! Chained layer cache keys
//!
//! Each key hashes the previous key plus the step's own inputs, so a change
//! invalidates that step and everything after it, and nothing before it.

use super::context::BuildContext;
use super::error::ImageError;
use super::recipe::{BuildStep, ImageRecipe};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerKey {
    pub step: &'static str,
    pub key: String,
}

pub fn layer_keys(recipe: &ImageRecipe, context: &BuildContext) -> Result<Vec<LayerKey>, ImageError> {
    let mut keys = Vec::new();
    let mut previous = String::new();

    for step in recipe.steps(context.env_files()) {
        let mut hasher = Sha256::new();
        hasher.update(previous.as_bytes());
        hasher.update(step.name().as_bytes());

        match &step {
            BuildStep::SelectBase { image, workdir } => {
                hash_field(&mut hasher, image.as_bytes());
                hash_field(&mut hasher, workdir.as_bytes());
            }
            BuildStep::InstallToolchain { packages } => {
                for pkg in packages {
                    hash_field(&mut hasher, pkg.as_bytes());
                }
            }
            BuildStep::InstallDependencies { manifest } => {
                hash_file(&mut hasher, context, manifest)?;
            }
            BuildStep::StageSources { files } | BuildStep::CopyEnvFiles { files } => {
                for file in files {
                    hash_file(&mut hasher, context, file)?;
                }
            }
            BuildStep::MarkExecutable { path } => hash_field(&mut hasher, path.as_bytes()),
            BuildStep::DeclarePort { port } => hash_field(&mut hasher, &port.to_be_bytes()),
            BuildStep::RegisterCommand { argv } => {
                for arg in argv {
                    hash_field(&mut hasher, arg.as_bytes());
                }
            }
        }

        previous = hex::encode(hasher.finalize());
        keys.push(LayerKey {
            step: step.name(),
            key: previous.clone(),
        });
    }

    Ok(keys)
}

// Length prefix keeps ["ab","c"] and ["a","bc"] distinct
fn hash_field(hasher: &mut Sha256, data: &[u8]) {
    hasher.update((data.len() as u64).to_be_bytes());
    hasher.update(data);
}

fn hash_file(hasher: &mut Sha256, context: &BuildContext, name: &str) -> Result<(), ImageError> {
    hash_field(hasher, name.as_bytes());
    hash_field(hasher, &context.read(name)?);
    Ok(())
}
