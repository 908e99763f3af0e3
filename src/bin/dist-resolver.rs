use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use dist_resolver::context::default_registry_root;
use dist_resolver::{registry, resolve, BuildContext, Requirements};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// API level used when neither a config file nor `--api` provides one.
const FALLBACK_API_LEVEL: u32 = 21;

#[derive(Parser)]
#[command(
    name = "dist-resolver",
    version,
    about = "Find, reuse, or allocate cross-compiled distributions"
)]
struct Cli {
    /// Build context TOML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry root directory (overrides the config file)
    #[arg(long, global = true)]
    registry_root: Option<PathBuf>,

    /// Default API level for new distributions (overrides the config file)
    #[arg(long, global = true)]
    api: Option<u32>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List distributions in the registry
    List,
    /// Resolve requirements to an existing or new distribution
    Resolve(ResolveArgs),
    /// Delete a distribution by name
    Delete { name: String },
}

#[derive(Args)]
struct ResolveArgs {
    /// Distribution name
    #[arg(long)]
    name: Option<String>,

    /// Target architectures
    #[arg(long = "arch", required = true, value_delimiter = ',')]
    archs: Vec<String>,

    /// Recipes the distribution must contain
    #[arg(long, value_delimiter = ',')]
    recipes: Vec<String>,

    /// Required API level
    #[arg(long)]
    ndk_api: Option<u32>,

    /// Always allocate a new distribution
    #[arg(long)]
    force_build: bool,

    /// Only reuse distributions with exactly the requested recipes
    #[arg(long)]
    require_perfect_match: bool,

    /// Fail instead of replacing a same-named incompatible distribution
    #[arg(long)]
    no_replace: bool,

    /// Additional directories to search for distributions
    #[arg(long = "extra-dist-dir")]
    extra_dist_dirs: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let ctx = load_context(&cli)?;
    match cli.command {
        Commands::List => list(&ctx),
        Commands::Resolve(args) => resolve_cmd(&ctx, args),
        Commands::Delete { name } => delete(&ctx, &name),
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_context(cli: &Cli) -> Result<BuildContext> {
    let mut ctx = match &cli.config {
        Some(path) => BuildContext::load(path)
            .with_context(|| format!("loading build context '{}'", path.display()))?,
        None => BuildContext::new(default_registry_root()?, FALLBACK_API_LEVEL),
    };
    if let Some(root) = &cli.registry_root {
        ctx.registry_root = root.clone();
    }
    if let Some(api) = cli.api {
        ctx.default_api_level = api;
    }
    Ok(ctx)
}

fn list(ctx: &BuildContext) -> Result<()> {
    let dists = registry::scan(&ctx.registry_root, &[]).with_context(|| {
        format!("scanning registry '{}'", ctx.registry_root.display())
    })?;

    if dists.is_empty() {
        println!("No distributions in {}", ctx.registry_root.display());
        return Ok(());
    }

    println!("Distributions in {}:", ctx.registry_root.display());
    for dist in &dists {
        println!("  {}", dist.summary());
    }
    Ok(())
}

fn resolve_cmd(ctx: &BuildContext, args: ResolveArgs) -> Result<()> {
    let mut req = Requirements::new(args.archs)
        .with_recipes(args.recipes)
        .force_build(args.force_build)
        .require_perfect_match(args.require_perfect_match)
        .allow_replace(!args.no_replace)
        .with_extra_dist_dirs(args.extra_dist_dirs);
    if let Some(name) = args.name {
        req = req.with_name(name);
    }
    if let Some(api) = args.ndk_api {
        req = req.with_api_level(api);
    }

    let dist = resolve(ctx, &req).context("resolving distribution")?;
    let json = serde_json::to_string_pretty(&dist).context("serializing distribution")?;
    println!("{json}");
    Ok(())
}

fn delete(ctx: &BuildContext, name: &str) -> Result<()> {
    let Some(dist) = registry::find_by_name(&ctx.registry_root, name)
        .with_context(|| format!("scanning registry '{}'", ctx.registry_root.display()))?
    else {
        bail!(
            "no distribution named '{}' in {}",
            name,
            ctx.registry_root.display()
        );
    };

    dist.delete()
        .with_context(|| format!("deleting distribution '{name}'"))?;
    println!("Deleted {} ({})", dist.name, dist.dist_dir.display());
    Ok(())
}
