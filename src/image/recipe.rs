//! Typed container build recipe
//!
//! An [`ImageRecipe`] describes one linear image build: base image, toolchain,
//! dependency manifest, staged sources, env files, the executable bit, the
//! declared port and the launch command. [`ImageRecipe::steps`] expands it into
//! the ordered [`BuildStep`] list that every other part of the builder consumes.

use super::error::ImageError;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::{Component, Path};

fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// Process started by the image's default command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchCommand {
    /// ASGI server executable
    pub server: String,
    /// Python module holding the application object
    pub module: String,
    /// Name of the application object inside `module`
    pub object: String,
    pub host: String,
    pub port: u16,
}

impl Default for LaunchCommand {
    fn default() -> Self {
        Self {
            server: "uvicorn".to_string(),
            module: "app".to_string(),
            object: "app".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl LaunchCommand {
    /// `module:object`, the import string ASGI servers take
    pub fn target(&self) -> String {
        format!("{}:{}", self.module, self.object)
    }

    /// Relative path of the module file (`pkg.app` becomes `pkg/app.py`)
    pub fn module_path(&self) -> String {
        format!("{}.py", self.module.replace('.', "/"))
    }

    pub fn argv(&self) -> Vec<String> {
        vec![
            self.server.clone(),
            self.target(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecipe {
    #[serde(default = "default_base_image")]
    pub base_image: String,
    #[serde(default = "default_workdir")]
    pub workdir: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub toolchain_packages: Vec<String>,
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub sources: Vec<String>,
    #[serde(default = "default_env_pattern")]
    pub env_pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub launch: LaunchCommand,
}

fn default_base_image() -> String {
    "python:3.11-slim".to_string()
}

fn default_workdir() -> String {
    "/app".to_string()
}

fn default_manifest() -> String {
    "requirements.txt".to_string()
}

fn default_env_pattern() -> String {
    ".env*".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ImageRecipe {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            workdir: default_workdir(),
            toolchain_packages: vec![
                "gcc".to_string(),
                "g++".to_string(),
                "python3-dev".to_string(),
            ],
            manifest: default_manifest(),
            sources: vec![
                "app.py".to_string(),
                "index.html".to_string(),
                "entrypoint.sh".to_string(),
            ],
            env_pattern: default_env_pattern(),
            executable: Some("entrypoint.sh".to_string()),
            port: default_port(),
            launch: LaunchCommand::default(),
        }
    }
}

/// One operation of the linear build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum BuildStep {
    SelectBase { image: String, workdir: String },
    InstallToolchain { packages: Vec<String> },
    InstallDependencies { manifest: String },
    StageSources { files: Vec<String> },
    CopyEnvFiles { files: Vec<String> },
    MarkExecutable { path: String },
    DeclarePort { port: u16 },
    RegisterCommand { argv: Vec<String> },
}

impl BuildStep {
    pub fn name(&self) -> &'static str {
        match self {
            BuildStep::SelectBase { .. } => "select-base",
            BuildStep::InstallToolchain { .. } => "install-toolchain",
            BuildStep::InstallDependencies { .. } => "install-dependencies",
            BuildStep::StageSources { .. } => "stage-sources",
            BuildStep::CopyEnvFiles { .. } => "copy-env-files",
            BuildStep::MarkExecutable { .. } => "mark-executable",
            BuildStep::DeclarePort { .. } => "declare-port",
            BuildStep::RegisterCommand { .. } => "register-command",
        }
    }
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ImageRecipe {
    /// Loads a recipe from YAML, or JSON when the file ends in `.json`
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recipe {}", path.display()))?;

        let recipe: ImageRecipe = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse recipe {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse recipe {}", path.display()))?
        };

        recipe.validate()?;
        Ok(recipe)
    }

    pub fn validate(&self) -> Result<(), ImageError> {
        if self.base_image.trim().is_empty() {
            return Err(ImageError::InvalidRecipe("base image is empty".to_string()));
        }
        if !self.workdir.starts_with('/') {
            return Err(ImageError::InvalidRecipe(format!(
                "workdir '{}' must be absolute",
                self.workdir
            )));
        }
        if self.manifest.trim().is_empty() {
            return Err(ImageError::InvalidRecipe(
                "dependency manifest is empty".to_string(),
            ));
        }
        for path in std::iter::once(&self.manifest).chain(&self.sources) {
            if !is_context_relative(path) {
                return Err(ImageError::InvalidRecipe(format!(
                    "'{}' must be a relative path inside the build context",
                    path
                )));
            }
        }
        if self.sources.is_empty() {
            return Err(ImageError::InvalidRecipe(
                "at least one source file is required".to_string(),
            ));
        }
        if let Some(ref exe) = self.executable {
            if !self.sources.contains(exe) {
                return Err(ImageError::InvalidRecipe(format!(
                    "executable '{}' is not one of the staged sources",
                    exe
                )));
            }
        }
        if self.port == 0 {
            return Err(ImageError::InvalidRecipe("port must be non-zero".to_string()));
        }
        if self.launch.port != self.port {
            return Err(ImageError::InvalidRecipe(format!(
                "launch command listens on {} but the image declares {}",
                self.launch.port, self.port
            )));
        }
        Ok(())
    }

    /// True when the launch command mentions the executable script
    pub fn launch_uses_executable(&self) -> bool {
        match &self.executable {
            Some(exe) => self.launch.argv().iter().any(|arg| arg.contains(exe.as_str())),
            None => true,
        }
    }

    /// Expands the recipe into its ordered build steps
    ///
    /// `env_files` are the names that matched `env_pattern` in the context.
    pub fn steps(&self, env_files: &[String]) -> Vec<BuildStep> {
        let mut steps = vec![
            BuildStep::SelectBase {
                image: self.base_image.clone(),
                workdir: self.workdir.clone(),
            },
            BuildStep::InstallToolchain {
                packages: self.toolchain_packages.clone(),
            },
            BuildStep::InstallDependencies {
                manifest: self.manifest.clone(),
            },
            BuildStep::StageSources {
                files: self.sources.clone(),
            },
            BuildStep::CopyEnvFiles {
                files: env_files.to_vec(),
            },
        ];

        if let Some(ref exe) = self.executable {
            steps.push(BuildStep::MarkExecutable { path: exe.clone() });
        }

        steps.push(BuildStep::DeclarePort { port: self.port });
        steps.push(BuildStep::RegisterCommand {
            argv: self.launch.argv(),
        });

        steps
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize recipe to YAML")
    }
}

/// No absolute paths and no `..`, so every file stays inside the context
fn is_context_relative(path: &str) -> bool {
    let path = Path::new(path);
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
