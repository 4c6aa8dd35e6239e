use analyst::agent::Analyst;
use analyst::cli::commands::{
    BuildArgs, CliArgs, Commands, ContextArgs, HealthArgs, RecipeArgs, ServeArgs, StageArgs,
};
use analyst::cli::output::{HealthStatus, OutputFormat, OutputFormatter};
use analyst::config::{load_env_file, AgentConfig};
use analyst::image::{docker_available, stage_to_path, BuildContext, ImageBuilder, ImageRecipe};
use analyst::llm::{GenAIClient, LLMClient};
use analyst::progress::{LoggingHandler, ProgressBarHandler, ProgressHandler};
use analyst::sandbox::{DockerSandbox, SandboxSettings, ScriptRunner};
use analyst::server::{AnalystServer, AppState};
use analyst::util::logging::{init_logging, parse_level, LoggingConfig};
use analyst::{NAME, VERSION};

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info, warn, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // Before logging so ANALYST_LOG_* in .env apply
    let loaded = load_env_file(Path::new(".env"));

    init_logging_from_args(&args);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);
    match loaded {
        Ok(0) => {}
        Ok(n) => debug!("Loaded {} variables from .env", n),
        Err(e) => warn!("Failed to read .env: {:#}", e),
    }

    let exit_code = match &args.command {
        Commands::Serve(serve_args) => handle_serve(serve_args).await,
        Commands::Recipe(recipe_args) => handle_recipe(recipe_args),
        Commands::Stage(stage_args) => handle_stage(stage_args),
        Commands::Build(build_args) => handle_build(build_args, args.quiet).await,
        Commands::Health(health_args) => handle_health(health_args).await,
    };

    process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = LoggingConfig::from_env();

    // The server owns stdout, so structured logs can go there
    if config.use_json && matches!(args.command, Commands::Serve(_)) {
        config = LoggingConfig {
            level: config.level,
            ..LoggingConfig::production()
        };
    }

    if let Some(level_str) = &args.log_level {
        config.level = parse_level(level_str);
    } else if args.verbose {
        config.level = Level::DEBUG;
    } else if args.quiet {
        config.level = Level::ERROR;
    }

    init_logging(config);
}

async fn handle_serve(args: &ServeArgs) -> i32 {
    let mut config = AgentConfig::default();
    if let Some(ref host) = args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        return 1;
    }

    debug!("{}", config);

    if !config.has_credentials() {
        warn!(
            "{} credentials are not set; /api/ requests will fail until they are",
            config.provider.as_str()
        );
    }

    let llm = match GenAIClient::new(
        config.provider,
        config.model.clone(),
        config.request_timeout(),
        config.api_base_url.clone(),
    ) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create LLM client: {}", e);
            eprintln!("\nTroubleshooting:");
            eprintln!("  - Set GROQ_MODEL_DEFAULT to the model the analyst should use");
            eprintln!("  - Set GROQ_API_KEY (or the key for ANALYST_PROVIDER)");
            eprintln!("  - Run 'analyst health' to check the configuration");
            return 1;
        }
    };

    let sandbox = match DockerSandbox::connect(SandboxSettings {
        image: config.sandbox_image.clone(),
        timeout: config.script_timeout(),
        ..Default::default()
    }) {
        Ok(sandbox) => sandbox,
        Err(e) => {
            error!("Failed to connect to Docker: {}", e);
            return 1;
        }
    };

    let address: SocketAddr = match config.bind_address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid bind address {}: {}", config.bind_address(), e);
            return 1;
        }
    };

    let llm: Arc<dyn LLMClient> = Arc::new(llm);
    let runner: Arc<dyn ScriptRunner> = Arc::new(sandbox);

    info!(
        "Using backend: {} ({})",
        llm.name(),
        llm.model_info().unwrap_or_else(|| "default".to_string())
    );

    let state = AppState::new(Analyst::new(llm, runner), config.agent_timeout());

    match AnalystServer::new(state, address).run().await {
        Ok(()) => 0,
        Err(e) => {
            error!("Server error: {}", e);
            1
        }
    }
}

fn resolve_context(args: &ContextArgs) -> Result<(ImageRecipe, BuildContext)> {
    let recipe = match &args.recipe {
        Some(path) => ImageRecipe::from_file(path)?,
        None => ImageRecipe::default(),
    };

    let root: PathBuf = match &args.context {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("Failed to get current directory")?,
    };

    let context = BuildContext::resolve(&root, &recipe)
        .with_context(|| format!("Invalid build context {}", root.display()))?;

    Ok((recipe, context))
}

fn handle_recipe(args: &RecipeArgs) -> i32 {
    let (recipe, context) = match resolve_context(&args.source) {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let format: OutputFormat = args.format.into();
    let output = match OutputFormatter::new(format).format_recipe(&recipe, &context) {
        Ok(out) => out,
        Err(e) => {
            error!("Failed to format recipe: {:#}", e);
            return 1;
        }
    };

    write_output(&output, args.output.as_deref())
}

fn handle_stage(args: &StageArgs) -> i32 {
    let (recipe, context) = match resolve_context(&args.source) {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    match stage_to_path(&recipe, &context, &args.output) {
        Ok(()) => {
            info!("Build context written to {}", args.output.display());
            0
        }
        Err(e) => {
            error!("Failed to stage build context: {}", e);
            1
        }
    }
}

async fn handle_build(args: &BuildArgs, quiet: bool) -> i32 {
    let (recipe, context) = match resolve_context(&args.source) {
        Ok(resolved) => resolved,
        Err(e) => {
            error!("{:#}", e);
            return 1;
        }
    };

    let progress: Arc<dyn ProgressHandler> = match ProgressBarHandler::interactive() {
        Some(bar) if !quiet => Arc::new(bar),
        _ => Arc::new(LoggingHandler),
    };

    let builder = match ImageBuilder::connect(recipe, context) {
        Ok(builder) => builder
            .with_no_cache(args.no_cache)
            .with_progress(progress),
        Err(e) => {
            error!("Failed to connect to Docker: {}", e);
            return 1;
        }
    };

    let report = match builder.build(&args.tag).await {
        Ok(report) => report,
        Err(e) => {
            error!("Build failed: {}", e);
            return 1;
        }
    };

    match OutputFormatter::new(args.format.into()).format_report(&report) {
        Ok(out) => write_output(&out, None),
        Err(e) => {
            error!("Failed to format build report: {:#}", e);
            1
        }
    }
}

async fn handle_health(args: &HealthArgs) -> i32 {
    let config = AgentConfig::default();
    let mut checks = BTreeMap::new();

    let llm_status = if config.model.trim().is_empty() {
        HealthStatus::unavailable("No model configured (set GROQ_MODEL_DEFAULT)")
    } else if !config.has_credentials() {
        HealthStatus::unavailable(format!(
            "Missing credentials ({})",
            config
                .provider
                .default_key_env_name()
                .unwrap_or("api key")
        ))
    } else {
        HealthStatus::available("Model and credentials configured")
    };
    checks.insert(
        "llm".to_string(),
        llm_status.with_details(format!(
            "provider: {}, model: {}",
            config.provider.as_str(),
            if config.model.is_empty() {
                "(unset)"
            } else {
                config.model.as_str()
            }
        )),
    );

    let docker_status = if docker_available().await {
        HealthStatus::available("Docker daemon reachable")
    } else {
        HealthStatus::unavailable("Docker daemon not reachable")
    };
    checks.insert(
        "docker".to_string(),
        docker_status.with_details(format!("sandbox image: {}", config.sandbox_image)),
    );

    let healthy = checks.values().all(|s| s.available);

    let output = match OutputFormatter::new(args.format.into()).format_health(&checks, &config) {
        Ok(out) => out,
        Err(e) => {
            error!("Failed to format health status: {:#}", e);
            return 1;
        }
    };

    let code = write_output(&output, None);
    if code != 0 {
        return code;
    }
    if healthy {
        0
    } else {
        1
    }
}

fn write_output(output: &str, path: Option<&Path>) -> i32 {
    match path {
        Some(file) => match std::fs::write(file, output) {
            Ok(()) => {
                info!("Output written to {}", file.display());
                0
            }
            Err(e) => {
                error!("Failed to write output file {}: {}", file.display(), e);
                1
            }
        },
        None => {
            print!("{}", output);
            if !output.ends_with('\n') {
                println!();
            }
            0
        }
    }
}
