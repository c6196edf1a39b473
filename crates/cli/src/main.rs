//! # repodex CLI
//!
//! Builds the local index for a GitHub repository and searches it from the
//! terminal. Owner, repo and branch default to `REPODEX_OWNER`,
//! `REPODEX_REPO` and `REPODEX_BRANCH`.
//!
//! ```bash
//! repodex index --owner acme --repo notes
//! repodex search "docker compose" --field text --limit 3
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use repodex_client::Pipeline;
use repodex_core::{AppConfig, Field, Index, SearchResult};

#[derive(Parser)]
#[command(name = "repodex", version, about = "Index a GitHub repository locally and search it")]
struct Cli {
    #[command(flatten)]
    repo: RepoArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RepoArgs {
    /// Repository owner (defaults to REPODEX_OWNER).
    #[arg(long, global = true)]
    owner: Option<String>,

    /// Repository name (defaults to REPODEX_REPO).
    #[arg(long, global = true)]
    repo: Option<String>,

    /// Branch to index (defaults to REPODEX_BRANCH, then "master").
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Refetch from GitHub even if a valid cache exists.
    #[arg(long, global = true)]
    force_refresh: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the repository (or load it from cache) and build the index.
    Index,

    /// Search the repository index, building it first if needed.
    Search {
        query: String,

        /// Field to search; repeat for several (text, filename, id).
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<Field>,

        /// Maximum number of results (defaults to REPODEX_SEARCH_LIMIT, then 5).
        #[arg(long)]
        limit: Option<usize>,

        /// Characters of text to show per result.
        #[arg(long)]
        preview_chars: Option<usize>,

        /// Print results as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn parse_field(s: &str) -> Result<Field, String> {
    s.parse().map_err(|e: repodex_core::Error| e.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("failed to load configuration")?;
    let pipeline = Pipeline::from_config(&config)?;

    let index = build_index(&pipeline, &config, &cli.repo)?;

    match cli.command {
        Commands::Index => {
            println!("indexed {} documents", index.len());
        }
        Commands::Search { query, fields, limit, preview_chars, json } => {
            let limit = limit.unwrap_or(config.search_limit);
            let results = pipeline.search(&index, &query, &fields, limit)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results, preview_chars.unwrap_or(config.preview_chars));
            }
        }
    }

    Ok(())
}

fn build_index(pipeline: &Pipeline, config: &AppConfig, args: &RepoArgs) -> Result<Index> {
    let (owner, repo) = config.require_repo(args.owner.as_deref(), args.repo.as_deref())?;
    let branch = args.branch.as_deref().unwrap_or(&config.branch);
    tracing::debug!(%owner, %repo, branch, force_refresh = args.force_refresh, "resolving index");

    pipeline
        .index_data(&owner, &repo, args.force_refresh, branch)
        .with_context(|| format!("failed to index {owner}/{repo}@{branch}"))
}

fn print_results(results: &[SearchResult], preview_chars: usize) {
    if results.is_empty() {
        println!("no results");
        return;
    }

    for (rank, result) in results.iter().enumerate() {
        let score = result.score.map(|s| format!("{s:.3}")).unwrap_or_else(|| "-".into());
        println!("{}. {} (score {score})", rank + 1, result.id);
        for line in result.preview(preview_chars).lines().filter(|l| !l.trim().is_empty()).take(6) {
            println!("   {line}");
        }
        println!();
    }
}
