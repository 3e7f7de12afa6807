//! `bindora`: rank catalog molecules against a disease, gene or protein sequence.
//!
//! ```bash
//! bindora search KRAS --kind gene --max-results 5
//! bindora search "lung cancer" --kind disease
//! bindora details CHEMBL25
//! bindora similar CHEMBL25 -n 5
//! bindora similar "CC(=O)Oc1ccccc1C(=O)O" --structure
//! bindora target P01116
//! bindora explain --sequence MKTIIALSYIFCLVFA --structure "CC(=O)Oc1ccccc1C(=O)O"
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bindora_common::QueryKind;
use bindora_config::Config;
use bindora_search::SearchService;

#[derive(Parser, Debug)]
#[command(name = "bindora")]
#[command(about = "Drug/target search ranked by predicted binding affinity")]
#[command(version)]
struct Cli {
    /// Path to bindora.toml
    #[arg(short, long, env = "BINDORA_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank the catalog against a query.
    Search {
        query: String,
        #[arg(short, long, default_value = "gene")]
        kind: QueryKind,
        /// Defaults to `search.default_max_results`.
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },
    /// Show one catalog molecule with its properties.
    Details { id: String },
    /// Catalog molecules structurally closest to a molecule id or structure.
    Similar {
        query: String,
        /// Treat the query as a SMILES structure instead of a molecule id.
        #[arg(long)]
        structure: bool,
        #[arg(short = 'n', long)]
        max_results: Option<usize>,
    },
    /// Annotation for a target accession or gene symbol.
    Target { id: String },
    /// Break down the score of one sequence/structure pair.
    Explain {
        #[arg(long)]
        sequence: String,
        #[arg(long)]
        structure: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => Config::load()?,
    };
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("bindora=debug,info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(version = env!("CARGO_PKG_VERSION"), "Starting bindora");

    let config = load_config(cli.config.as_ref()).context("Could not load configuration")?;
    info!(
        encoder = ?config.encoder.mode,
        catalog = ?config.sources.catalog,
        cache = ?config.cache.backend,
        "Configuration loaded"
    );
    let default_max_results = config.search.default_max_results;
    let service = SearchService::from_config(config)?;

    match cli.command {
        Command::Search { query, kind, max_results } => {
            let max_results = max_results.unwrap_or(default_max_results);
            let results = service
                .search(&query, kind.as_str(), max_results)
                .await
                .with_context(|| format!("Search for {} '{}' failed", kind, query))?;
            print_json(&results)?;
        }
        Command::Details { id } => {
            let details = service.molecule_details(&id).await?;
            print_json(&details)?;
        }
        Command::Similar { query, structure, max_results } => {
            let max_results = max_results.unwrap_or(default_max_results);
            let similar = if structure {
                service.similar_molecules(&query, max_results).await?
            } else {
                service.similar_to_molecule(&query, max_results).await?
            };
            print_json(&similar)?;
        }
        Command::Target { id } => {
            let info = service.target_info(&id).await?;
            print_json(&info)?;
        }
        Command::Explain { sequence, structure } => {
            let explanation = service.explain(&sequence, &structure).await?;
            print_json(&explanation)?;
        }
    }

    Ok(())
}
