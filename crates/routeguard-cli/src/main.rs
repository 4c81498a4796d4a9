//! `routeguard` - resolve one route from the command line and print it as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use routeguard_core::{maneuver_text, next_instruction, Coordinate, RoutingProfile};
use routeguard_engine::{EngineConfig, RouteResolutionEngine};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log debug output from the engine
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a route between two points
    Resolve {
        /// Start as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        from: Coordinate,

        /// Destination as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        to: Coordinate,

        /// Travel profile (foot or bicycle)
        #[arg(long, default_value = "foot")]
        profile: RoutingProfile,

        /// Skip the remote routing service entirely
        #[arg(long)]
        offline: bool,

        /// JSON file with known paths (array of coordinate arrays) for the offline graph
        #[arg(long)]
        paths: Option<PathBuf>,

        /// Include the tiers visited during resolution
        #[arg(long)]
        explain: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    match args.command {
        Command::Resolve {
            from,
            to,
            profile,
            offline,
            paths,
            explain,
        } => resolve(from, to, profile, offline, paths, explain).await,
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive(format!("routeguard_core={}", level).parse()?)
                .add_directive(format!("routeguard_engine={}", level).parse()?),
        )
        .init();
    Ok(())
}

async fn resolve(
    from: Coordinate,
    to: Coordinate,
    profile: RoutingProfile,
    offline: bool,
    paths: Option<PathBuf>,
    explain: bool,
) -> Result<()> {
    let mut config = EngineConfig::from_env();
    if offline {
        config.remote.foot_endpoints.clear();
        config.remote.bicycle_endpoints.clear();
    }

    let engine = RouteResolutionEngine::new(config).context("failed to build routing client")?;

    if let Some(path) = paths {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let known: Vec<Vec<Coordinate>> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        let edges = engine.replace_paths(&known);
        tracing::info!("Loaded {} paths ({} edges) into the offline graph", known.len(), edges);
    }

    let resolution = engine.resolve_detailed(from, to, profile).await?;
    let route = &resolution.route;

    let instruction = next_instruction(route, from);
    let steps: Vec<String> = route.maneuvers().iter().map(maneuver_text).collect();

    let mut output = json!({
        "route": route,
        "approximate": !route.source().is_authoritative(),
        "instruction": instruction,
        "steps": steps,
    });
    if explain {
        output["tiers"] = serde_json::to_value(&resolution.tiers)?;
        output["cached"] = json!(resolution.cached);
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
