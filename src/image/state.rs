//! Linear build state machine
//!
//! Every build step is only legal from the state the previous step produced.
//! `CopyEnvFiles` does not change state: env files are optional content staged
//! alongside the sources.

use super::error::ImageError;
use super::recipe::BuildStep;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Start,
    BaseSelected,
    ToolchainInstalled,
    DependenciesInstalled,
    SourcesStaged,
    PermissionsSet,
    MetadataDeclared,
    CommandRegistered,
    Done,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Start => "start",
            BuildState::BaseSelected => "base-selected",
            BuildState::ToolchainInstalled => "toolchain-installed",
            BuildState::DependenciesInstalled => "dependencies-installed",
            BuildState::SourcesStaged => "sources-staged",
            BuildState::PermissionsSet => "permissions-set",
            BuildState::MetadataDeclared => "metadata-declared",
            BuildState::CommandRegistered => "command-registered",
            BuildState::Done => "done",
        };
        f.write_str(name)
    }
}

impl BuildState {
    /// Applies `step`, returning the next state or `OutOfOrder`
    pub fn advance(self, step: &BuildStep) -> Result<BuildState, ImageError> {
        use BuildState::*;

        let next = match (self, step) {
            (Start, BuildStep::SelectBase { .. }) => BaseSelected,
            (BaseSelected, BuildStep::InstallToolchain { .. }) => ToolchainInstalled,
            (ToolchainInstalled, BuildStep::InstallDependencies { .. }) => DependenciesInstalled,
            (DependenciesInstalled, BuildStep::StageSources { .. }) => SourcesStaged,
            (SourcesStaged, BuildStep::CopyEnvFiles { .. }) => SourcesStaged,
            (SourcesStaged, BuildStep::MarkExecutable { .. }) => PermissionsSet,
            // Recipes without an executable skip straight to metadata
            (SourcesStaged | PermissionsSet, BuildStep::DeclarePort { .. }) => MetadataDeclared,
            (MetadataDeclared, BuildStep::RegisterCommand { .. }) => CommandRegistered,
            (from, step) => {
                return Err(ImageError::OutOfOrder {
                    from: from.to_string(),
                    step: step.name().to_string(),
                })
            }
        };

        Ok(next)
    }

    pub fn finish(self) -> Result<BuildState, ImageError> {
        match self {
            BuildState::CommandRegistered => Ok(BuildState::Done),
            from => Err(ImageError::OutOfOrder {
                from: from.to_string(),
                step: "finish".to_string(),
            }),
        }
    }

    /// Runs every step from `Start`, stopping at the first illegal transition
    pub fn walk(steps: &[BuildStep]) -> Result<Vec<BuildState>, ImageError> {
        let mut state = BuildState::Start;
        let mut visited = vec![state];

        for step in steps {
            let next = state.advance(step)?;
            if next != state {
                visited.push(next);
            }
            state = next;
        }

        visited.push(state.finish()?);
        Ok(visited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::recipe::ImageRecipe;

    #[test]
    fn test_default_recipe_walks_to_done() {
        let steps = ImageRecipe::default().steps(&[".env".to_string()]);
        let visited = BuildState::walk(&steps).unwrap();

        assert_eq!(
            visited,
            vec![
                BuildState::Start,
                BuildState::BaseSelected,
                BuildState::ToolchainInstalled,
                BuildState::DependenciesInstalled,
                BuildState::SourcesStaged,
                BuildState::PermissionsSet,
                BuildState::MetadataDeclared,
                BuildState::CommandRegistered,
                BuildState::Done,
            ]
        );
    }

    #[test]
    fn test_recipe_without_executable_still_completes() {
        let recipe = ImageRecipe {
            executable: None,
            ..Default::default()
        };
        let visited = BuildState::walk(&recipe.steps(&[])).unwrap();
        assert!(!visited.contains(&BuildState::PermissionsSet));
        assert_eq!(visited.last(), Some(&BuildState::Done));
    }

    #[test]
    fn test_out_of_order_step_is_rejected() {
        let err = BuildState::Start
            .advance(&BuildStep::StageSources { files: vec![] })
            .unwrap_err();

        match err {
            ImageError::OutOfOrder { from, step } => {
                assert_eq!(from, "start");
                assert_eq!(step, "stage-sources");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_steps_cannot_repeat() {
        let state = BuildState::Start
            .advance(&BuildStep::SelectBase {
                image: "python:3.11-slim".to_string(),
                workdir: "/app".to_string(),
            })
            .unwrap();

        assert!(state
            .advance(&BuildStep::SelectBase {
                image: "python:3.11-slim".to_string(),
                workdir: "/app".to_string(),
            })
            .is_err());
    }

    #[test]
    fn test_finish_requires_command() {
        assert!(BuildState::MetadataDeclared.finish().is_err());
        assert_eq!(
            BuildState::CommandRegistered.finish().unwrap(),
            BuildState::Done
        );
    }

    #[test]
    fn test_truncated_walk_fails() {
        let mut steps = ImageRecipe::default().steps(&[]);
        steps.pop();
        assert!(BuildState::walk(&steps).is_err());
    }
}
