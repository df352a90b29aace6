use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use concert_calendar::apis::build_adapters;
use concert_calendar::config::{credentials_from_env, AppConfig, DEFAULT_CONFIG_PATH};
use concert_calendar::pipeline::processing::normalize::central_today;
use concert_calendar::pipeline::{report, Orchestrator};
use concert_calendar::{logging, observability, ReliabilityRegistry, SourceContext};

#[derive(Parser)]
#[command(name = "concert_calendar")]
#[command(about = "Aggregates live-music listings into one deduplicated calendar")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every source, deduplicate, and write the run report
    Run {
        /// Path to the run configuration
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Print the calendar instead of writing files
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate the reliability registry and print a summary
    CheckRegistry {
        #[arg(long, default_value = "registry.toml")]
        registry: PathBuf,
    },
}

async fn run(config_path: PathBuf, dry_run: bool) -> anyhow::Result<()> {
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let registry = Arc::new(
        ReliabilityRegistry::load(&config.registry_path)
            .with_context(|| format!("loading {}", config.registry_path.display()))?,
    );

    let adapters = build_adapters(&config, &registry)?;
    let orchestrator = Orchestrator::new(Arc::clone(&registry), adapters, config.run_settings());

    let run_at = Utc::now();
    let ctx = credentials_from_env().into_iter().fold(
        SourceContext::new(run_at, central_today(run_at)),
        |ctx, (name, value)| ctx.with_credential(name, value),
    );

    let outcome = orchestrator.run(ctx).await;

    println!("\n📊 Run results for {}:", outcome.today);
    println!("   Raw listings: {}", outcome.raw_total);
    println!("   Normalized: {}", outcome.normalized_total);
    println!("   Merged events: {}", outcome.events.len());
    for source in &outcome.sources {
        println!(
            "   {:<28} {:<15} raw={:<4} kept={:<4} {}",
            source.source_id,
            source.status.as_str(),
            source.raw_count,
            source.normalized_count,
            source.error_detail.as_deref().unwrap_or("")
        );
    }

    if dry_run {
        println!("\nDRY RUN, not writing files\n");
        print!("{}", report::render_summary(&outcome.events));
    } else {
        let written = report::write_outputs(&outcome, &config.output_dir)?;
        println!("💾 Wrote {}", written.log_path.display());
        println!("💾 Wrote {}", written.events_path.display());
    }

    let failures = report::render_failures(&outcome.sources);
    if !failures.is_empty() {
        println!("\n⚠️  {} source(s) did not finish cleanly:", failures.len());
        for line in failures {
            println!("     - {}", line);
        }
    }
    Ok(())
}

fn check_registry(path: PathBuf) -> anyhow::Result<()> {
    let registry = ReliabilityRegistry::load(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    println!("✅ {} is valid", path.display());
    println!("   Default weight: {}", registry.default_weight());
    println!(
        "   Similarity threshold: {}",
        registry.matching().similarity_threshold
    );
    println!("   Sources:");
    for (id, weight) in registry.source_weights() {
        println!("     {:<20} {}", id, weight);
    }
    println!(
        "   Venues: {} ({} aliases, {} with calendars)",
        registry.venues().len(),
        registry.alias_count(),
        registry
            .venues()
            .iter()
            .filter(|v| v.calendar_url.is_some())
            .count()
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    logging::init_logging();
    observability::init_or_warn();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run { config, dry_run } => {
            info!(config = %config.display(), dry_run, "Starting run");
            run(config, dry_run).await
        }
        Commands::CheckRegistry { registry } => check_registry(registry),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        eprintln!("❌ {:#}", e);
        std::process::exit(1);
    }
}
