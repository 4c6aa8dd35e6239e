//! Dockerfile rendering
//!
//! Each [`BuildStep`] renders to zero or more instructions. The mapping is kept
//! so the Docker driver can translate `Step N/M` progress back to build steps.

use super::context::BuildContext;
use super::recipe::{BuildStep, ImageRecipe};

/// One rendered instruction and the build step that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Position of `step` in [`ImageRecipe::steps`]
    pub step_index: usize,
    pub step: BuildStep,
    pub line: String,
}

#[derive(Debug, Clone)]
pub struct Dockerfile {
    instructions: Vec<Instruction>,
}

impl Dockerfile {
    pub fn render(recipe: &ImageRecipe, context: &BuildContext) -> Self {
        let mut instructions = Vec::new();

        for (step_index, step) in recipe.steps(context.env_files()).into_iter().enumerate() {
            for line in instructions_for(&step) {
                instructions.push(Instruction {
                    step_index,
                    step: step.clone(),
                    line,
                });
            }
        }

        Self { instructions }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Instruction at the 1-based index Docker reports
    pub fn instruction_at(&self, index: usize) -> Option<&Instruction> {
        index.checked_sub(1).and_then(|i| self.instructions.get(i))
    }

    pub fn step_at(&self, index: usize) -> Option<&BuildStep> {
        self.instruction_at(index).map(|inst| &inst.step)
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        for inst in &self.instructions {
            out.push_str(&inst.line);
            out.push('\n');
        }
        out
    }
}

pub fn render_dockerfile(recipe: &ImageRecipe, context: &BuildContext) -> String {
    Dockerfile::render(recipe, context).text()
}

fn instructions_for(step: &BuildStep) -> Vec<String> {
    match step {
        BuildStep::SelectBase { image, workdir } => {
            vec![format!("FROM {}", image), format!("WORKDIR {}", workdir)]
        }
        BuildStep::InstallToolchain { packages } => {
            if packages.is_empty() {
                return Vec::new();
            }
            vec![format!(
                "RUN apt-get update && apt-get install -y --no-install-recommends {} && rm -rf /var/lib/apt/lists/*",
                packages.join(" ")
            )]
        }
        BuildStep::InstallDependencies { manifest } => {
            let mut lines = copy_lines(std::slice::from_ref(manifest));
            lines.push(format!(
                "RUN pip install --no-cache-dir -r {}",
                shell_quote(manifest)
            ));
            lines
        }
        BuildStep::StageSources { files } | BuildStep::CopyEnvFiles { files } => copy_lines(files),
        BuildStep::MarkExecutable { path } => vec![format!("RUN chmod +x {}", shell_quote(path))],
        BuildStep::DeclarePort { port } => vec![format!("EXPOSE {}", port)],
        BuildStep::RegisterCommand { argv } => vec![format!("CMD {}", json_array(argv))],
    }
}

/// One `COPY` per destination directory, so nested files keep their layout
fn copy_lines(files: &[String]) -> Vec<String> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for file in files {
        let dest = match file.rsplit_once('/') {
            Some((dir, _)) => format!("./{}/", dir),
            None => "./".to_string(),
        };
        match groups.iter_mut().find(|(d, _)| *d == dest) {
            Some((_, members)) => members.push(file.clone()),
            None => groups.push((dest, vec![file.clone()])),
        }
    }

    groups
        .into_iter()
        .map(|(dest, mut args)| {
            args.push(dest);
            if args.iter().all(|a| is_plain(a)) {
                format!("COPY {}", args.join(" "))
            } else {
                format!("COPY {}", json_array(&args))
            }
        })
        .collect()
}

fn json_array(args: &[String]) -> String {
    let quoted: Vec<String> = args
        .iter()
        .map(|arg| serde_json::Value::String(arg.clone()).to_string())
        .collect();
    format!("[{}]", quoted.join(", "))
}

/// Paths that need no quoting in either a `COPY` list or a shell word
fn is_plain(arg: &str) -> bool {
    !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./+=:@%,".contains(c))
}

fn shell_quote(arg: &str) -> String {
    if is_plain(arg) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
