//! Output formatting for recipes, build reports and health checks
//!
//! Every command that prints structured data goes through [`OutputFormatter`],
//! so JSON and YAML output share one shape and the human form stays consistent.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::AgentConfig;
use crate::image::{layer_keys, render_dockerfile, BuildContext, BuildReport, ImageRecipe};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
    /// Raw Dockerfile text; only meaningful for recipes
    Dockerfile,
}

/// Result of one health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub available: bool,
    pub message: String,
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn available(message: impl Into<String>) -> Self {
        Self {
            available: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Serialize)]
struct RecipeView<'a> {
    recipe: &'a ImageRecipe,
    steps: Vec<crate::image::BuildStep>,
    env_files: &'a [String],
    layer_keys: Vec<crate::image::LayerKey>,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_recipe(&self, recipe: &ImageRecipe, context: &BuildContext) -> Result<String> {
        if self.format == OutputFormat::Dockerfile {
            return Ok(render_dockerfile(recipe, context));
        }

        let view = RecipeView {
            recipe,
            steps: recipe.steps(context.env_files()),
            env_files: context.env_files(),
            layer_keys: layer_keys(recipe, context).context("Failed to compute layer keys")?,
        };

        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(&view).context("Failed to serialize recipe to JSON")
            }
            OutputFormat::Yaml => {
                serde_yaml::to_string(&view).context("Failed to serialize recipe to YAML")
            }
            OutputFormat::Human | OutputFormat::Dockerfile => {
                Ok(self.format_recipe_human(&view, context))
            }
        }
    }

    pub fn format_report(&self, report: &BuildReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report)
                .context("Failed to serialize build report to JSON"),
            OutputFormat::Yaml => {
                serde_yaml::to_string(report).context("Failed to serialize build report to YAML")
            }
            OutputFormat::Human => Ok(self.format_report_human(report)),
            OutputFormat::Dockerfile => bail!("Dockerfile format is only available for recipes"),
        }
    }

    pub fn format_health(
        &self,
        checks: &BTreeMap<String, HealthStatus>,
        config: &AgentConfig,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "health_status": checks,
                    "configuration": config.to_display_map(),
                });
                serde_json::to_string_pretty(&output)
                    .context("Failed to serialize health status to JSON")
            }
            OutputFormat::Yaml => {
                let output = serde_json::json!({
                    "health_status": checks,
                    "configuration": config.to_display_map(),
                });
                serde_yaml::to_string(&output).context("Failed to serialize health status to YAML")
            }
            OutputFormat::Human => Ok(self.format_health_human(checks, config)),
            OutputFormat::Dockerfile => bail!("Dockerfile format is only available for recipes"),
        }
    }

    fn format_recipe_human(&self, view: &RecipeView<'_>, context: &BuildContext) -> String {
        let recipe = view.recipe;
        let mut output = String::new();

        output.push_str("Image Recipe\n");
        output.push_str(RULE);
        output.push_str("\n\n");
        output.push_str(&format!("Context:    {}\n", context.root().display()));
        output.push_str(&format!("Base image: {}\n", recipe.base_image));
        output.push_str(&format!("Workdir:    {}\n", recipe.workdir));
        output.push_str(&format!("Port:       {}\n", recipe.port));
        output.push_str(&format!("Command:    {}\n", recipe.launch.argv().join(" ")));
        output.push_str(&format!(
            "Env files:  {}\n",
            if view.env_files.is_empty() {
                "(none)".to_string()
            } else {
                view.env_files.join(", ")
            }
        ));

        output.push_str("\nSteps:\n");
        for (i, key) in view.layer_keys.iter().enumerate() {
            output.push_str(&format!("  {}. {:<22} {}\n", i + 1, key.step, &key.key[..12]));
        }

        output
    }

    fn format_report_human(&self, report: &BuildReport) -> String {
        let mut output = String::new();

        output.push_str(&format!("\u{2713} Built {}\n", report.tag));
        output.push_str(RULE);
        output.push_str("\n\n");
        output.push_str(&format!("Image ID:  {}\n", report.image_id));
        output.push_str(&format!("Ports:     {}\n", report.exposed_ports.join(", ")));
        output.push_str(&format!("Command:   {}\n", report.command.join(" ")));
        output.push_str(&format!("Env files: {}\n", report.env_files.len()));
        output.push_str(&format!(
            "Duration:  {:.1}s\n",
            report.duration_ms as f64 / 1000.0
        ));

        output
    }

    fn format_health_human(
        &self,
        checks: &BTreeMap<String, HealthStatus>,
        config: &AgentConfig,
    ) -> String {
        let mut output = String::new();

        output.push_str("Health Status\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        for (name, status) in checks {
            let symbol = if status.available {
                "\u{2713}"
            } else {
                "\u{2717}"
            };
            output.push_str(&format!("{} {}\n", symbol, name));
            output.push_str(&format!(
                "  Status: {}\n",
                if status.available {
                    "Available"
                } else {
                    "Unavailable"
                }
            ));
            output.push_str(&format!("  Message: {}\n", status.message));
            if let Some(ref details) = status.details {
                output.push_str(&format!("  Details: {}\n", details));
            }
            output.push('\n');
        }

        output.push_str(&config.to_string());
        output
    }
}
