use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Data analyst agent service and its container image builder
#[derive(Parser, Debug)]
#[command(
    name = "analyst",
    about = "Data analyst agent service and its container image builder",
    version,
    author,
    long_about = "analyst answers data questions over HTTP by planning Python analyses with an LLM \
                  and running them in throwaway Docker containers. It also renders, stages and \
                  builds the container image the service is deployed in."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the analyst HTTP service",
        long_about = "Serves GET / and POST /api/. Configuration comes from the environment \
                      (GROQ_API_KEY, GROQ_MODEL_DEFAULT, AGENT_TIMEOUT_SEC, PORT, ...) and an \
                      optional .env file.\n\n\
                      Examples:\n  \
                      analyst serve\n  \
                      analyst serve --port 9000"
    )]
    Serve(ServeArgs),

    #[command(
        about = "Render the image recipe",
        long_about = "Validates a build context and prints the recipe as a Dockerfile, JSON, YAML \
                      or a human summary with layer keys.\n\n\
                      Examples:\n  \
                      analyst recipe\n  \
                      analyst recipe --context ./service --format json"
    )]
    Recipe(RecipeArgs),

    #[command(
        about = "Write the staged build context to a tar archive",
        long_about = "Validates the context and writes the Dockerfile plus every staged file to \
                      a tar archive, gzip-compressed when the name ends in .gz.\n\n\
                      Examples:\n  \
                      analyst stage --output context.tar.gz"
    )]
    Stage(StageArgs),

    #[command(
        about = "Build the image with the local Docker daemon",
        long_about = "Builds the image, follows each build step, and checks that the result \
                      exposes the declared port and runs the launch command.\n\n\
                      Examples:\n  \
                      analyst build --tag analyst:latest\n  \
                      analyst build --context ./service --tag analyst:dev --no-cache"
    )]
    Build(BuildArgs),

    #[command(
        about = "Check LLM and Docker availability",
        long_about = "Reports whether the configured LLM provider has credentials and a model, \
                      and whether a Docker daemon is reachable.\n\n\
                      Examples:\n  \
                      analyst health\n  \
                      analyst health --format json"
    )]
    Health(HealthArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, value_name = "HOST", help = "Bind host (overrides ANALYST_HOST)")]
    pub host: Option<String>,

    #[arg(short = 'p', long, value_name = "PORT", help = "Bind port (overrides PORT)")]
    pub port: Option<u16>,
}

/// Where the build context and recipe come from
#[derive(Parser, Debug, Clone)]
pub struct ContextArgs {
    #[arg(
        short = 'c',
        long,
        value_name = "DIR",
        help = "Build context directory (defaults to current directory)"
    )]
    pub context: Option<PathBuf>,

    #[arg(
        short = 'r',
        long,
        value_name = "FILE",
        help = "Recipe file in YAML or JSON (defaults to the built-in recipe)"
    )]
    pub recipe: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct RecipeArgs {
    #[command(flatten)]
    pub source: ContextArgs,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "dockerfile",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct StageArgs {
    #[command(flatten)]
    pub source: ContextArgs,

    #[arg(short = 'o', long, value_name = "FILE", help = "Archive to write (.tar or .tar.gz)")]
    pub output: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub source: ContextArgs,

    #[arg(short = 't', long, value_name = "TAG", help = "Image tag")]
    pub tag: String,

    #[arg(long, help = "Build without using cached layers")]
    pub no_cache: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Report format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
    Dockerfile,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
            OutputFormatArg::Dockerfile => super::output::OutputFormat::Dockerfile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let args = CliArgs::parse_from(["analyst", "serve"]);
        match args.command {
            Commands::Serve(serve) => {
                assert!(serve.host.is_none());
                assert!(serve.port.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_serve_overrides() {
        let args = CliArgs::parse_from(["analyst", "serve", "--host", "127.0.0.1", "-p", "9000"]);
        match args.command {
            Commands::Serve(serve) => {
                assert_eq!(serve.host.as_deref(), Some("127.0.0.1"));
                assert_eq!(serve.port, Some(9000));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_recipe_defaults_to_dockerfile() {
        let args = CliArgs::parse_from(["analyst", "recipe"]);
        match args.command {
            Commands::Recipe(recipe) => {
                assert_eq!(recipe.format, OutputFormatArg::Dockerfile);
                assert!(recipe.source.context.is_none());
                assert!(recipe.source.recipe.is_none());
            }
            _ => panic!("Expected Recipe command"),
        }
    }

    #[test]
    fn test_recipe_with_context_and_format() {
        let args = CliArgs::parse_from([
            "analyst", "recipe", "--context", "/srv/app", "--recipe", "r.yaml", "-f", "json",
        ]);
        match args.command {
            Commands::Recipe(recipe) => {
                assert_eq!(recipe.source.context, Some(PathBuf::from("/srv/app")));
                assert_eq!(recipe.source.recipe, Some(PathBuf::from("r.yaml")));
                assert_eq!(recipe.format, OutputFormatArg::Json);
            }
            _ => panic!("Expected Recipe command"),
        }
    }

    #[test]
    fn test_stage_requires_output() {
        assert!(CliArgs::try_parse_from(["analyst", "stage"]).is_err());

        let args = CliArgs::parse_from(["analyst", "stage", "-o", "ctx.tar.gz"]);
        match args.command {
            Commands::Stage(stage) => assert_eq!(stage.output, PathBuf::from("ctx.tar.gz")),
            _ => panic!("Expected Stage command"),
        }
    }

    #[test]
    fn test_build_args() {
        assert!(CliArgs::try_parse_from(["analyst", "build"]).is_err());

        let args = CliArgs::parse_from(["analyst", "build", "-t", "analyst:dev", "--no-cache"]);
        match args.command {
            Commands::Build(build) => {
                assert_eq!(build.tag, "analyst:dev");
                assert!(build.no_cache);
                assert_eq!(build.format, OutputFormatArg::Human);
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["analyst", "health", "-v"]);
        assert!(args.verbose);
        assert!(!args.quiet);

        let args = CliArgs::parse_from(["analyst", "--log-level", "debug", "health"]);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(CliArgs::try_parse_from(["analyst", "health", "-v", "-q"]).is_err());
    }
}
