//! One throwaway container per script
//!
//! The container idles on `sleep infinity`, receives the script and the
//! attachments as a tar upload, runs `python /tmp/script.py` through exec, and
//! is force-removed whatever happened.

use super::{Attachment, SandboxError, ScriptOutput, ScriptRunner};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    UploadToContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use bytes::Bytes;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

const SCRIPT_PATH: &str = "/tmp/script.py";

#[derive(Debug, Clone)]
pub struct SandboxSettings {
    pub image: String,
    pub workdir: String,
    pub timeout: Duration,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            image: "python:3.11".to_string(),
            workdir: "/workspace".to_string(),
            timeout: Duration::from_secs(90),
        }
    }
}

pub struct DockerSandbox {
    docker: Docker,
    settings: SandboxSettings,
    image_ready: OnceCell<()>,
}

impl DockerSandbox {
    pub fn new(docker: Docker, settings: SandboxSettings) -> Self {
        Self {
            docker,
            settings,
            image_ready: OnceCell::new(),
        }
    }

    pub fn connect(settings: SandboxSettings) -> Result<Self, SandboxError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self::new(docker, settings))
    }

    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    /// Pulls the sandbox image the first time it is needed
    async fn ensure_image(&self) -> Result<(), SandboxError> {
        self.image_ready
            .get_or_try_init(|| self.pull_if_missing())
            .await
            .map(|_| ())
    }

    async fn pull_if_missing(&self) -> Result<(), SandboxError> {
        if self.docker.inspect_image(&self.settings.image).await.is_ok() {
            return Ok(());
        }

        info!(image = %self.settings.image, "Pulling sandbox image");
        let options = CreateImageOptions {
            from_image: self.settings.image.clone(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            if let Some(status) = progress?.status {
                debug!(image = %self.settings.image, "{}", status);
            }
        }
        Ok(())
    }

    async fn create_container(&self) -> Result<String, SandboxError> {
        let name = format!("analyst-sandbox-{}", uuid::Uuid::new_v4());
        let config = Config {
            image: Some(self.settings.image.clone()),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            working_dir: Some(self.settings.workdir.clone()),
            ..Default::default()
        };

        let container = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: name.clone(),
                    platform: None,
                }),
                config,
            )
            .await?;

        debug!(container = %name, "Created sandbox container");
        Ok(container.id)
    }

    async fn execute(
        &self,
        container_id: &str,
        code: &str,
        attachments: &[Attachment],
    ) -> Result<ScriptOutput, SandboxError> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await?;

        let archive = script_archive(code, &self.settings.workdir, attachments)
            .map_err(SandboxError::Archive)?;
        self.docker
            .upload_to_container(
                container_id,
                Some(UploadToContainerOptions {
                    path: "/".to_string(),
                    ..Default::default()
                }),
                Bytes::from(archive),
            )
            .await?;

        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    cmd: Some(vec!["python".to_string(), SCRIPT_PATH.to_string()]),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    working_dir: Some(self.settings.workdir.clone()),
                    ..Default::default()
                },
            )
            .await?;

        let mut result = ScriptOutput::default();
        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(chunk) = output.next().await {
                match chunk? {
                    LogOutput::StdOut { message } => {
                        result.stdout.push_str(&String::from_utf8_lossy(&message))
                    }
                    LogOutput::StdErr { message } => {
                        result.stderr.push_str(&String::from_utf8_lossy(&message))
                    }
                    _ => {}
                }
            }
        }

        result.exit_code = self.docker.inspect_exec(&exec.id).await?.exit_code;
        Ok(result)
    }
}

#[async_trait]
impl ScriptRunner for DockerSandbox {
    async fn run(&self, code: &str, attachments: &[Attachment]) -> Result<ScriptOutput, SandboxError> {
        self.ensure_image().await?;
        let container = ContainerGuard::new(self.docker.clone(), self.create_container().await?);

        let outcome = tokio::time::timeout(
            self.settings.timeout,
            self.execute(container.id(), code, attachments),
        )
        .await;

        container.remove().await;

        match outcome {
            Ok(result) => {
                if let Ok(ref output) = result {
                    debug!(
                        exit_code = ?output.exit_code,
                        stdout_bytes = output.stdout.len(),
                        stderr_bytes = output.stderr.len(),
                        "Script finished"
                    );
                }
                result
            }
            Err(_) => Err(SandboxError::Timeout {
                seconds: self.settings.timeout.as_secs(),
            }),
        }
    }

    fn workdir(&self) -> &str {
        &self.settings.workdir
    }

    fn name(&self) -> &str {
        "docker"
    }
}

#[async_trait]
trait RemoveContainer: Clone + Send + Sync + 'static {
    async fn force_remove(&self, container_id: &str);
}

#[async_trait]
impl RemoveContainer for Docker {
    async fn force_remove(&self, container_id: &str) {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match Docker::remove_container(self, container_id, Some(options)).await {
            Ok(()) => debug!(container = %container_id, "Removed sandbox container"),
            Err(e) => {
                warn!(container = %container_id, error = %e, "Failed to remove sandbox container")
            }
        }
    }
}

/// Owns a sandbox container until it is removed
///
/// Dropping the guard without [`ContainerGuard::remove`] (a cancelled request,
/// an outer timeout) hands the forced removal to a background task.
struct ContainerGuard<R: RemoveContainer> {
    remover: R,
    id: String,
    armed: bool,
}

impl<R: RemoveContainer> ContainerGuard<R> {
    fn new(remover: R, id: String) -> Self {
        Self {
            remover,
            id,
            armed: true,
        }
    }

    fn id(&self) -> &str {
        &self.id
    }

    async fn remove(mut self) {
        self.armed = false;
        self.remover.force_remove(&self.id).await;
    }
}

impl<R: RemoveContainer> Drop for ContainerGuard<R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let id = std::mem::take(&mut self.id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(container = %id, "Sandbox run abandoned, removing container in background");
                let remover = self.remover.clone();
                handle.spawn(async move { remover.force_remove(&id).await });
            }
            Err(_) => warn!(container = %id, "No runtime left to remove sandbox container"),
        }
    }
}

/// Tar with the script under `/tmp` and attachments under `workdir`
fn script_archive(code: &str, workdir: &str, attachments: &[Attachment]) -> std::io::Result<Vec<u8>> {
    let mut archive = tar::Builder::new(Vec::new());
    let workdir = workdir.trim_matches('/');

    append(&mut archive, SCRIPT_PATH.trim_start_matches('/'), code.as_bytes())?;
    for attachment in attachments {
        let path = if workdir.is_empty() {
            attachment.name.clone()
        } else {
            format!("{}/{}", workdir, attachment.name)
        };
        append(&mut archive, &path, &attachment.data)?;
    }

    archive.into_inner()
}

fn append(archive: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8]) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    archive.append_data(&mut header, path, data)
}
