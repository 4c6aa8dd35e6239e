//! Docker Engine driver for image builds
//!
//! Streams the staged context to the daemon, follows the classic builder's
//! `Step N/M` lines to drive [`BuildState`], then inspects the result to
//! confirm the declared port and command made it into the image.

use super::context::{stage_to_bytes, BuildContext};
use super::dockerfile::Dockerfile;
use super::error::ImageError;
use super::layers::{layer_keys, LayerKey};
use super::recipe::{BuildStep, ImageRecipe};
use super::state::BuildState;
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use bollard::image::BuildImageOptions;
use bollard::Docker;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info};

const DOCKER_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Check if a Docker daemon answers on the local socket
pub async fn docker_available() -> bool {
    if !Path::new(DOCKER_SOCKET_PATH).exists() {
        debug!("Docker socket not found at {}", DOCKER_SOCKET_PATH);
        return false;
    }

    let docker = match Docker::connect_with_local_defaults() {
        Ok(d) => d,
        Err(e) => {
            debug!("Failed to connect to Docker: {}", e);
            return false;
        }
    };

    match docker.version().await {
        Ok(v) => {
            debug!(
                "Docker API version: {}",
                v.api_version.unwrap_or_else(|| "unknown".to_string())
            );
            true
        }
        Err(e) => {
            debug!("Failed to get Docker version: {}", e);
            false
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub tag: String,
    pub image_id: String,
    pub states: Vec<BuildState>,
    pub layer_keys: Vec<LayerKey>,
    pub env_files: Vec<String>,
    pub exposed_ports: Vec<String>,
    pub command: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u128,
}

/// Follows build output and keeps [`BuildState`] in step with it
pub struct StepTracker<'a> {
    dockerfile: &'a Dockerfile,
    steps: Vec<BuildStep>,
    state: BuildState,
    visited: Vec<BuildState>,
    applied: usize,
    current: Option<String>,
}

fn step_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Step (\d+)/(\d+)\s*:").expect("valid regex"))
}

impl<'a> StepTracker<'a> {
    pub fn new(dockerfile: &'a Dockerfile, steps: Vec<BuildStep>) -> Self {
        Self {
            dockerfile,
            steps,
            state: BuildState::Start,
            visited: vec![BuildState::Start],
            applied: 0,
            current: None,
        }
    }

    /// Name of the step currently executing, for error attribution
    pub fn current_step(&self) -> &str {
        self.current.as_deref().unwrap_or("start")
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// Feeds one output line; returns the progress event for a new instruction
    pub fn observe(&mut self, line: &str) -> Result<Option<ProgressEvent>, ImageError> {
        let Some(caps) = step_line().captures(line.trim_start()) else {
            return Ok(None);
        };

        let index: usize = caps[1].parse().unwrap_or(0);
        let total: usize = caps[2].parse().unwrap_or(0);

        let Some(instruction) = self.dockerfile.instruction_at(index) else {
            return Ok(None);
        };

        self.apply_through(instruction.step_index)?;
        self.current = Some(instruction.step.name().to_string());

        Ok(Some(ProgressEvent::InstructionStarted {
            index,
            total,
            step: instruction.step.name().to_string(),
            instruction: instruction.line.clone(),
        }))
    }

    /// Applies the remaining steps and moves to `Done`
    pub fn finish(mut self) -> Result<Vec<BuildState>, ImageError> {
        if !self.steps.is_empty() {
            self.apply_through(self.steps.len() - 1)?;
        }
        self.state = self.state.finish()?;
        self.visited.push(self.state);
        Ok(self.visited)
    }

    // Steps that render no instruction are applied when a later one starts
    fn apply_through(&mut self, index: usize) -> Result<(), ImageError> {
        while self.applied <= index && self.applied < self.steps.len() {
            let next = self.state.advance(&self.steps[self.applied])?;
            if next != self.state {
                self.visited.push(next);
            }
            self.state = next;
            self.applied += 1;
        }
        Ok(())
    }
}

/// Checks inspected image metadata against the recipe
pub fn verify_image(
    recipe: &ImageRecipe,
    exposed_ports: &[String],
    command: &[String],
) -> Result<(), ImageError> {
    let expected_port = format!("{}/tcp", recipe.port);
    if exposed_ports != [expected_port.clone()] {
        return Err(ImageError::Verification(format!(
            "expected exposed ports [{}], found {:?}",
            expected_port, exposed_ports
        )));
    }

    let expected_cmd = recipe.launch.argv();
    if command != expected_cmd.as_slice() {
        return Err(ImageError::Verification(format!(
            "expected command {:?}, found {:?}",
            expected_cmd, command
        )));
    }

    Ok(())
}

pub struct ImageBuilder {
    docker: Docker,
    recipe: ImageRecipe,
    context: BuildContext,
    no_cache: bool,
    progress: Arc<dyn ProgressHandler>,
}

impl ImageBuilder {
    pub fn new(docker: Docker, recipe: ImageRecipe, context: BuildContext) -> Self {
        Self {
            docker,
            recipe,
            context,
            no_cache: false,
            progress: Arc::new(NoOpHandler),
        }
    }

    pub fn connect(recipe: ImageRecipe, context: BuildContext) -> Result<Self, ImageError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(docker, recipe, context))
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub async fn build(&self, tag: &str) -> Result<BuildReport, ImageError> {
        match self.run_build(tag).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.progress.on_progress(&ProgressEvent::Failed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_build(&self, tag: &str) -> Result<BuildReport, ImageError> {
        let started_at = Utc::now();
        let start = Instant::now();

        let dockerfile = Dockerfile::render(&self.recipe, &self.context);
        let keys = layer_keys(&self.recipe, &self.context)?;
        let archive = stage_to_bytes(&self.recipe, &self.context)?;

        info!(
            tag,
            instructions = dockerfile.instructions().len(),
            context_bytes = archive.len(),
            "Building image"
        );
        self.progress.on_progress(&ProgressEvent::Started {
            tag: tag.to_string(),
            total_instructions: dockerfile.instructions().len(),
        });

        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: tag.to_string(),
            nocache: self.no_cache,
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        let mut tracker = StepTracker::new(
            &dockerfile,
            self.recipe.steps(self.context.env_files()),
        );
        let mut stream = self
            .docker
            .build_image(options, None, Some(Bytes::from(archive)));

        while let Some(item) = stream.next().await {
            let info = item.map_err(|e| ImageError::BuildFailed {
                step: tracker.current_step().to_string(),
                message: e.to_string(),
            })?;

            if let Some(message) = info.error {
                return Err(ImageError::BuildFailed {
                    step: tracker.current_step().to_string(),
                    message: message.trim().to_string(),
                });
            }

            if let Some(output) = info.stream {
                for line in output.lines().filter(|l| !l.trim().is_empty()) {
                    if let Some(event) = tracker.observe(line)? {
                        self.progress.on_progress(&event);
                    }
                    self.progress.on_progress(&ProgressEvent::Output {
                        line: line.to_string(),
                    });
                }
            }
        }

        let states = tracker.finish()?;

        let inspect = self.docker.inspect_image(tag).await?;
        let image_id = inspect.id.unwrap_or_default();
        let config = inspect.config.unwrap_or_default();

        let mut exposed_ports: Vec<String> = config
            .exposed_ports
            .map(|ports| ports.into_keys().collect())
            .unwrap_or_default();
        exposed_ports.sort();
        let command = config.cmd.unwrap_or_default();

        verify_image(&self.recipe, &exposed_ports, &command)?;
        self.progress.on_progress(&ProgressEvent::Verified {
            image_id: image_id.clone(),
        });

        let total_time = start.elapsed();
        self.progress.on_progress(&ProgressEvent::Completed {
            tag: tag.to_string(),
            total_time,
        });

        Ok(BuildReport {
            tag: tag.to_string(),
            image_id,
            states,
            layer_keys: keys,
            env_files: self.context.env_files().to_vec(),
            exposed_ports,
            command,
            started_at,
            finished_at: Utc::now(),
            duration_ms: total_time.as_millis(),
        })
    }
}
