//! demoseed - seed a demo application instance with synthetic records
//!
//! Two subcommands: `generate` produces record files through the
//! completion API; `seed` pushes them into a running application instance
//! and backfills the fields its forms cannot set.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use demoseed_common::config::{EntityProfile, Settings};
use demoseed_common::datafile;
use demoseed_seeder::generate::generate_records;
use demoseed_seeder::models::CandidateRecord;
use demoseed_seeder::services::anthropic_client::AnthropicClient;
use demoseed_seeder::services::entity_adapter::ProfileAdapter;
use demoseed_seeder::services::orchestrator::SeedingOrchestrator;
use demoseed_seeder::SeedContext;

/// Command-line arguments for demoseed
#[derive(Parser, Debug)]
#[command(name = "demoseed")]
#[command(about = "Seed a demo application instance with synthetic records")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "DEMOSEED_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate record files through the completion API
    Generate {
        /// Restrict the run to one entity kind
        #[arg(long)]
        kind: Option<String>,
    },
    /// Submit record files to the application and backfill dates/owners
    Seed {
        /// Restrict the run to one entity kind
        #[arg(long)]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    info!("demoseed {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Generate { kind } => run_generate(settings, kind.as_deref()).await,
        Command::Seed { kind } => run_seed(settings, kind.as_deref()).await,
    }
}

fn selected_profiles(settings: &Settings, kind: Option<&str>) -> Vec<EntityProfile> {
    settings
        .entities
        .iter()
        .filter(|profile| kind.is_none() || kind == Some(profile.kind.as_str()))
        .cloned()
        .collect()
}

async fn run_generate(settings: Settings, kind: Option<&str>) -> Result<()> {
    let profiles = selected_profiles(&settings, kind);
    if profiles.is_empty() {
        bail!("no matching entity kinds configured");
    }

    let client = AnthropicClient::new(settings.anthropic_api_key.clone())?;

    // Kinds generate in configuration order; each later kind may reference
    // the records of the kind before it.
    let mut previous: Option<Vec<CandidateRecord>> = None;
    for profile in &profiles {
        let records = generate_records(&settings, &client, profile, previous.as_deref())
            .await
            .with_context(|| format!("generation failed for kind '{}'", profile.kind))?;
        previous = Some(records);
    }
    Ok(())
}

async fn run_seed(settings: Settings, kind: Option<&str>) -> Result<()> {
    let profiles = selected_profiles(&settings, kind);
    if profiles.is_empty() {
        bail!("no matching entity kinds configured");
    }

    let ctx = SeedContext::initialize(settings)
        .await
        .context("Run setup failed")?;

    let result = seed_profiles(&ctx, &profiles).await;

    // Teardown happens whether the batch completed or not.
    ctx.shutdown().await;
    result
}

async fn seed_profiles(ctx: &SeedContext, profiles: &[EntityProfile]) -> Result<()> {
    let mut summaries = Vec::new();

    for profile in profiles {
        let adapter = ProfileAdapter::from_profile(profile.clone())?;
        let path = ctx.settings.data_dir.join(&profile.data_file);
        let candidates: Vec<CandidateRecord> = datafile::load_records(&path)
            .into_iter()
            .map(CandidateRecord::new)
            .collect();
        if candidates.is_empty() {
            error!(kind = %profile.kind, path = %path.display(), "No records to seed");
            continue;
        }

        let orchestrator = SeedingOrchestrator::new(ctx);
        let summary = orchestrator
            .run(&adapter, candidates)
            .await
            .with_context(|| format!("seeding failed for kind '{}'", profile.kind))?;
        summaries.push(summary);
    }

    for summary in &summaries {
        info!(
            kind = %summary.kind,
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Run summary"
        );
    }
    Ok(())
}
