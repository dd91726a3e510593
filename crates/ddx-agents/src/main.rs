use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ddx_agents::{DdxConfig, Pipeline};
use ddx_coordination::graph::{source_for_path, KnowledgeGraph, DEFAULT_MAX_HOPS};
use ddx_coordination::model::PatientContext;
use ddx_coordination::retrieval::{Corpus, DenseIndex, OpenAiEmbedder};
use tracing::info;

/// Multi-specialist differential diagnosis
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file (environment variables still take precedence)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every specialist over a patient context and print the result
    Diagnose {
        /// Normalised patient context (JSON)
        #[arg(long)]
        patient: PathBuf,
    },
    /// Embed the literature corpus and write the dense index
    BuildIndex,
    /// Print knowledge-graph paths between two entities
    Paths {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long, default_value_t = DEFAULT_MAX_HOPS)]
        max_hops: usize,
    },
    /// Print the next-best-test for a set of hypotheses
    NextTest {
        #[arg(long = "hypothesis", required = true)]
        hypotheses: Vec<String>,
        #[arg(long = "symptom")]
        symptoms: Vec<String>,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    // Logs go to stderr so stdout stays machine-readable.
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_graph(config: &DdxConfig) -> Result<KnowledgeGraph> {
    let source = source_for_path(&config.paths.graph);
    let snapshot = source
        .load()
        .with_context(|| format!("Failed to load knowledge graph from {}", source.describe()))?;
    Ok(KnowledgeGraph::from_snapshot(snapshot))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = DdxConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Diagnose { patient } => {
            let content = std::fs::read_to_string(&patient)
                .with_context(|| format!("Failed to read patient file {}", patient.display()))?;
            let patient: PatientContext =
                serde_json::from_str(&content).context("Failed to parse patient context JSON")?;

            let pipeline = Pipeline::from_config(&config)
                .await
                .context("Failed to initialise pipeline")?;
            let result = pipeline.diagnose(patient).await.context("Diagnose request failed")?;
            print_json(&result)?;
        }
        Command::BuildIndex => {
            let corpus = Corpus::load(&config.paths.literature).with_context(|| {
                format!("Failed to load corpus from {}", config.paths.literature.display())
            })?;
            let embedder = OpenAiEmbedder::new(
                config.embedding.base_url.clone(),
                config.embedding_api_key(),
                config.embedding.model.clone(),
                Duration::from_secs(config.embedding.timeout_secs),
            )?;
            info!(docs = corpus.len(), model = %config.embedding.model, "Building dense index");
            let index = DenseIndex::build(&corpus, &embedder)
                .await
                .context("Failed to embed corpus")?;
            index
                .save(&config.paths.dense_index)
                .context("Failed to write dense index")?;
            info!(
                path = %config.paths.dense_index.display(),
                vectors = index.len(),
                dim = index.dim(),
                "Dense index written"
            );
        }
        Command::Paths { from, to, max_hops } => {
            let graph = load_graph(&config)?;
            print_json(&graph.paths_between(&from, &to, max_hops))?;
        }
        Command::NextTest { hypotheses, symptoms } => {
            let graph = load_graph(&config)?;
            print_json(&graph.next_best_test(&hypotheses, &symptoms))?;
        }
    }

    Ok(())
}
