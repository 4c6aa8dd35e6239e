//! Build context resolution and staging
//!
//! [`BuildContext::resolve`] checks a host directory against a recipe before
//! anything is sent to Docker: every declared file must exist, the launch module
//! must bind the launch object, and env files are matched on the host so the
//! Dockerfile can list them explicitly.

use super::dockerfile::render_dockerfile;
use super::error::{ContextError, ImageError};
use super::recipe::ImageRecipe;
use flate2::write::GzEncoder;
use flate2::Compression;
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use regex::Regex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A context directory validated against a recipe
#[derive(Debug, Clone)]
pub struct BuildContext {
    root: PathBuf,
    manifest: String,
    sources: Vec<String>,
    env_files: Vec<String>,
    executable: Option<String>,
}

impl BuildContext {
    pub fn resolve(root: &Path, recipe: &ImageRecipe) -> Result<Self, ImageError> {
        recipe.validate()?;

        if !root.is_dir() {
            return Err(ContextError::NotADirectory(root.to_path_buf()).into());
        }

        require_file(root, "dependency manifest", &recipe.manifest)?;
        for source in &recipe.sources {
            require_file(root, "source file", source)?;
        }
        if let Some(ref exe) = recipe.executable {
            require_file(root, "executable", exe)?;
        }

        check_launch_target(root, recipe)?;

        if !recipe.launch_uses_executable() {
            if let Some(ref exe) = recipe.executable {
                warn!(
                    executable = %exe,
                    command = %recipe.launch.argv().join(" "),
                    "Executable is staged but not referenced by the launch command"
                );
            }
        }

        let env_files = match_env_files(root, &recipe.env_pattern)?;
        if env_files.is_empty() {
            debug!(pattern = %recipe.env_pattern, "No env files matched");
        }

        info!(
            root = %root.display(),
            sources = recipe.sources.len(),
            env_files = env_files.len(),
            "Build context resolved"
        );

        Ok(Self {
            root: root.to_path_buf(),
            manifest: recipe.manifest.clone(),
            sources: recipe.sources.clone(),
            env_files,
            executable: recipe.executable.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &str {
        &self.manifest
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Env files that matched the recipe pattern, sorted by name
    pub fn env_files(&self) -> &[String] {
        &self.env_files
    }

    pub fn executable(&self) -> Option<&str> {
        self.executable.as_deref()
    }

    /// Every file the image receives, in staging order
    pub fn staged_files(&self) -> Vec<&str> {
        let mut files = vec![self.manifest.as_str()];
        files.extend(self.sources.iter().map(String::as_str));
        files.extend(self.env_files.iter().map(String::as_str));
        files
    }

    pub fn read(&self, relative: &str) -> Result<Vec<u8>, ContextError> {
        let path = self.root.join(relative);
        std::fs::read(&path).map_err(|e| ContextError::io(path, e))
    }
}

fn require_file(root: &Path, role: &'static str, relative: &str) -> Result<(), ContextError> {
    if root.join(relative).is_file() {
        Ok(())
    } else {
        Err(ContextError::MissingSource {
            role,
            path: relative.to_string(),
        })
    }
}

fn match_env_files(root: &Path, pattern: &str) -> Result<Vec<String>, ContextError> {
    let invalid = |e: ignore::Error| ContextError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    };

    let mut builder = OverrideBuilder::new(root);
    builder.add(pattern).map_err(invalid)?;
    let overrides = builder.build().map_err(invalid)?;

    let mut matched = Vec::new();
    for result in WalkBuilder::new(root)
        .max_depth(Some(1))
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .overrides(overrides)
        .build()
    {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "Failed to read context entry");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            matched.push(name.to_string());
        }
    }

    matched.sort();
    Ok(matched)
}

/// Confirms the launch module binds the launch object at top level
fn check_launch_target(root: &Path, recipe: &ImageRecipe) -> Result<(), ContextError> {
    let launch = &recipe.launch;
    let module_path = launch.module_path();
    let missing = |reason: String| ContextError::LaunchTargetMissing {
        module: launch.module.clone(),
        object: launch.object.clone(),
        reason,
    };

    if !recipe.sources.contains(&module_path) {
        return Err(missing(format!(
            "module file {} is not among the staged sources",
            module_path
        )));
    }

    let path = root.join(&module_path);
    if !path.is_file() {
        return Err(missing(format!("module file {} not found", module_path)));
    }

    let source = std::fs::read_to_string(&path).map_err(|e| ContextError::io(&path, e))?;

    if binds_name(&source, &launch.object) {
        Ok(())
    } else {
        Err(missing(format!(
            "no top-level binding of '{}' in {}",
            launch.object, module_path
        )))
    }
}

/// Looks for an assignment, def, class or import binding `name` at column zero
fn binds_name(source: &str, name: &str) -> bool {
    let name = regex::escape(name);
    let patterns = [
        format!(r"^{name}\s*(:[^=\n]*)?=[^=]"),
        format!(r"^(async\s+)?def\s+{name}\s*\("),
        format!(r"^class\s+{name}\b"),
        format!(r"^(from\s+\S+\s+)?import\s+.*\bas\s+{name}\b"),
        format!(r"^from\s+\S+\s+import\s+(.*,\s*)?{name}\s*(,|$)"),
    ];

    patterns.iter().any(|p| {
        Regex::new(&format!("(?m){p}"))
            .map(|re| re.is_match(source))
            .unwrap_or(false)
    })
}

/// Writes the context as a tar archive: Dockerfile first, then staged files
pub fn stage_context<W: Write>(
    recipe: &ImageRecipe,
    context: &BuildContext,
    writer: W,
) -> Result<W, ImageError> {
    let dockerfile = render_dockerfile(recipe, context);
    let mut archive = tar::Builder::new(writer);

    let io = |path: &str, e: std::io::Error| ImageError::from(ContextError::io(path, e));

    append_entry(&mut archive, "Dockerfile", dockerfile.as_bytes(), 0o644)
        .map_err(|e| io("Dockerfile", e))?;

    for file in context.staged_files() {
        let data = context.read(file)?;
        let mode = if context.executable() == Some(file) {
            0o755
        } else {
            0o644
        };
        append_entry(&mut archive, file, &data, mode).map_err(|e| io(file, e))?;
        debug!(file, mode = format!("{:o}", mode), "Staged file");
    }

    archive.into_inner().map_err(|e| io("archive", e))
}

/// Stages the context into memory, as sent to the Docker daemon
pub fn stage_to_bytes(recipe: &ImageRecipe, context: &BuildContext) -> Result<Vec<u8>, ImageError> {
    stage_context(recipe, context, Vec::new())
}

/// Stages the context to a file, gzip-compressed when the name ends in `.gz`
pub fn stage_to_path(
    recipe: &ImageRecipe,
    context: &BuildContext,
    output: &Path,
) -> Result<(), ImageError> {
    let file = File::create(output).map_err(|e| ContextError::io(output, e))?;
    let writer = BufWriter::new(file);

    let compressed = output
        .extension()
        .is_some_and(|ext| ext == "gz" || ext == "tgz");

    let io = |e: std::io::Error| ImageError::from(ContextError::io(output, e));

    if compressed {
        let encoder = stage_context(recipe, context, GzEncoder::new(writer, Compression::default()))?;
        encoder.finish().map_err(io)?.flush().map_err(io)?;
    } else {
        stage_context(recipe, context, writer)?.flush().map_err(io)?;
    }

    info!(output = %output.display(), compressed, "Build context staged");
    Ok(())
}

fn append_entry<W: Write>(
    archive: &mut tar::Builder<W>,
    path: &str,
    data: &[u8],
    mode: u32,
) -> std::io::Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_entry_type(tar::EntryType::Regular);
    header.set_cksum();
    archive.append_data(&mut header, path, data)
}
