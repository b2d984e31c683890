//! pgstore - Property Graph Store CLI
//!
//! Runs the walkthrough or individual store operations against Neo4j or the
//! in-memory backend.

use anyhow::Result;
use clap::{Parser, Subcommand};
use property_graph_store::{
    graph::{LabelledNode, PropertyMap},
    walkthrough::run_walkthrough,
    AppState, Backend, Config,
};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pgstore")]
#[command(about = "Labelled property graph store CLI")]
struct Cli {
    /// Path to the YAML config file (defaults to ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store backend (overrides config and PGSTORE_BACKEND)
    #[arg(short, long, global = true, value_enum)]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, query and tear down a small example graph
    Walkthrough,

    /// Run a raw Cypher query
    Query {
        cypher: String,

        /// Query parameter as key=json (bare strings allowed)
        #[arg(short, long = "param", value_parser = parse_key_json)]
        params: Vec<(String, serde_json::Value)>,
    },

    /// Print nodes matching ids and/or properties
    Get {
        #[arg(long = "id")]
        ids: Vec<String>,

        /// Property filter as key=json
        #[arg(long = "prop", value_parser = parse_key_json)]
        props: Vec<(String, serde_json::Value)>,
    },

    /// Print relations reachable from a node
    RelMap {
        #[arg(long = "id", required = true)]
        ids: Vec<String>,

        #[arg(long, default_value = "2")]
        depth: usize,

        #[arg(long, default_value = "30")]
        limit: usize,

        /// Relation label to skip (repeatable)
        #[arg(long = "ignore")]
        ignore: Vec<String>,
    },

    /// Delete nodes by id or entity name, or relations by label
    Delete {
        #[arg(long = "id")]
        ids: Vec<String>,

        #[arg(long = "name")]
        names: Vec<String>,

        #[arg(long = "relation")]
        relations: Vec<String>,
    },

    /// Print the graph schema
    Schema {
        #[arg(long)]
        refresh: bool,
    },
}

impl Commands {
    /// Whether the command can change the store's contents
    fn mutates(&self) -> bool {
        matches!(self, Commands::Walkthrough | Commands::Delete { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,property_graph_store=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_yaml_and_env(cli.config.as_deref())?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    let state = AppState::new(config).await?;
    tracing::info!("Using {:?} backend", state.config.backend);

    let mutates = cli.command.mutates();
    match cli.command {
        Commands::Walkthrough => {
            let report = run_walkthrough(state.store.as_ref(), state.embedder.as_ref()).await?;
            println!("{}", report);
        }
        Commands::Query { cypher, params } => {
            let params: HashMap<String, serde_json::Value> = params.into_iter().collect();
            let rows = state.store.structured_query(&cypher, Some(&params)).await?;
            for row in rows {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Commands::Get { ids, props } => {
            let props: PropertyMap = props.into_iter().collect();
            let nodes = state
                .store
                .get(non_empty_map(&props), non_empty(&ids))
                .await?;
            print_nodes(&nodes)?;
        }
        Commands::RelMap {
            ids,
            depth,
            limit,
            ignore,
        } => {
            let start = state.store.get(None, Some(&ids)).await?;
            if start.is_empty() {
                tracing::warn!("No nodes found for {:?}", ids);
            }
            let triplets = state
                .store
                .get_rel_map(&start, depth, limit, &ignore)
                .await?;
            for triplet in triplets {
                println!("{}", triplet);
            }
        }
        Commands::Delete {
            ids,
            names,
            relations,
        } => {
            if ids.is_empty() && names.is_empty() && relations.is_empty() {
                anyhow::bail!("Nothing to delete: pass --id, --name or --relation");
            }
            state
                .store
                .delete(non_empty(&names), non_empty(&relations), None, non_empty(&ids))
                .await?;
            tracing::info!(
                "Deleted {} id(s), {} name(s), {} relation label(s)",
                ids.len(),
                names.len(),
                relations.len()
            );
        }
        Commands::Schema { refresh } => {
            println!("{}", state.store.get_schema_str(refresh).await?);
        }
    }

    if mutates {
        state.persist().await?;
    }
    Ok(())
}

/// Parse `key=value`, reading the value as JSON and falling back to a string
fn parse_key_json(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, raw) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    let value = serde_json::from_str(raw)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

fn non_empty(items: &[String]) -> Option<&[String]> {
    (!items.is_empty()).then_some(items)
}

fn non_empty_map(map: &PropertyMap) -> Option<&PropertyMap> {
    (!map.is_empty()).then_some(map)
}

fn print_nodes(nodes: &[LabelledNode]) -> Result<()> {
    for node in nodes {
        println!("{}", serde_json::to_string(node)?);
    }
    Ok(())
}
