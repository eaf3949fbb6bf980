//! KGT CLI - Command-line interface
//!
//! Usage:
//!   kgt translate "Kiran is a good student." --target Hindi --compare
//!   kgt graph "Alice met Bob in Paris." --metrics
//!   kgt graph "Alice met Bob in Paris." --path Alice Paris
//!   kgt graph --file story.txt --csv
//!   kgt prompt --file story.txt

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use kgt_core::{AppConfig, LoggingConfig};
use kgt_graph::{GraphAnalyzer, GraphSnapshot};
use kgt_translate::{PipelineBackends, TranslationPipeline};

#[derive(Parser)]
#[command(name = "kgt")]
#[command(about = "Knowledge-graph-enriched translation CLI")]
#[command(version)]
struct Cli {
    /// TOML config file (environment variables still override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Target language (overrides config)
    #[arg(long, short, global = true)]
    target: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate text using knowledge graph context
    Translate {
        #[command(flatten)]
        input: Input,

        /// Also print a context-free translation for comparison
        #[arg(long)]
        compare: bool,

        /// Print the full run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the enriched knowledge graph as JSON
    Graph {
        #[command(flatten)]
        input: Input,

        /// Print graph metrics and centrality instead
        #[arg(long)]
        metrics: bool,

        /// Print all shortest paths between two entities
        #[arg(long, num_args = 2, value_names = ["SOURCE", "TARGET"])]
        path: Option<Vec<String>>,

        /// Print nodes and relationships as CSV tables
        #[arg(long, conflicts_with = "metrics")]
        csv: bool,
    },
    /// Print the composed translation prompt without translating
    Prompt {
        #[command(flatten)]
        input: Input,
    },
}

/// Source text: argument, file, or stdin
#[derive(Args)]
struct Input {
    /// Text to process (read from stdin when omitted)
    text: Option<String>,

    /// Read the text from a file
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,
}

impl Input {
    fn read(self) -> anyhow::Result<String> {
        if let Some(text) = self.text {
            return Ok(text);
        }
        if let Some(path) = self.file {
            return std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()));
        }

        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading stdin")?;
        Ok(text)
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_str().into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Pipeline for commands that never call the translator: if the LLM
/// cannot be configured, enrichment still runs on the remaining fallbacks.
fn enrichment_pipeline(config: &AppConfig) -> TranslationPipeline {
    let backends = PipelineBackends::from_config(config).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Backends unavailable, using offline enrichment");
        PipelineBackends::offline()
    });

    TranslationPipeline::new(
        backends,
        &config.pipeline,
        std::time::Duration::from_secs(config.backends.timeout_secs),
        std::time::Duration::from_secs(config.llm.timeout_secs),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    if let Some(target) = cli.target {
        config.pipeline.target_language = target;
    }
    init_tracing(&config.logging);

    match cli.command {
        Commands::Translate {
            input,
            compare,
            json,
        } => {
            let text = input.read()?;
            let pipeline = TranslationPipeline::from_config(&config)?;

            let report = pipeline.translate_with_report(&text).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.translation);
            }

            if compare {
                let plain = pipeline.translate_plain(&text).await?;
                println!();
                println!("Without context:");
                println!("{plain}");
            }
        }
        Commands::Graph {
            input,
            metrics,
            path,
            csv,
        } => {
            let text = input.read()?;
            let enrichment = enrichment_pipeline(&config).enrich_text(&text).await;
            let analyzer = GraphAnalyzer::new(&enrichment.graph);

            if let Some([source, target]) = path.as_deref() {
                let paths = analyzer.all_shortest_paths(source, target);
                if paths.is_empty() {
                    println!("No path from {source} to {target}");
                }
                for path in paths {
                    println!("{}", path.join(" -> "));
                }
            } else if metrics {
                let summary = serde_json::json!({
                    "strategy": enrichment.strategy,
                    "metrics": analyzer.metrics(),
                    "centrality": analyzer.centrality(),
                    "components": analyzer.components(),
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else if csv {
                let (nodes, edges) = GraphSnapshot::from(&enrichment.graph).to_csv()?;
                print!("{nodes}");
                println!();
                print!("{edges}");
            } else {
                println!("{}", GraphSnapshot::from(&enrichment.graph).to_json()?);
            }
        }
        Commands::Prompt { input } => {
            let text = input.read()?;
            let (_, prompt) = enrichment_pipeline(&config).prepare(&text).await;
            println!("{prompt}");
        }
    }

    Ok(())
}
