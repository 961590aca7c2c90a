use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use finsearch_core::{EnglishNormalizer, IndexCatalog, QueryEngine, Tokenizer, DEFAULT_RESULT_LIMIT};
use std::io;
use std::path::Path;
use tracing_subscriber::{fmt, EnvFilter};

mod ingest;
mod shell;

use ingest::ingest_path;
use shell::{write_results, Shell};

const DEFAULT_INDEX: &str = "financial_index";

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the financial news index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index article JSON/JSONL files from a file or directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Base path of the index artifacts
        #[arg(long, default_value = DEFAULT_INDEX)]
        output: String,
        /// Extra stopwords, whitespace separated
        #[arg(long)]
        stopwords: Option<String>,
        /// Keep raw term frequencies instead of rewriting them to TF-IDF
        #[arg(long, default_value_t = false)]
        raw_scores: bool,
    },
    /// Search a saved index; options go before the query
    Query {
        /// Base path of the index artifacts
        #[arg(long, default_value = DEFAULT_INDEX)]
        index: String,
        /// Maximum number of results
        #[arg(long, default_value_t = DEFAULT_RESULT_LIMIT)]
        limit: usize,
        /// Query clauses: words, ORG:Name, PERSON:Name, -word
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        terms: Vec<String>,
    },
    /// Interactive session
    Ui {
        /// Index to load at startup
        #[arg(long)]
        index: Option<String>,
        /// Extra stopwords, whitespace separated
        #[arg(long)]
        stopwords: Option<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, stopwords, raw_scores } => {
            build_index(&input, &output, stopwords.as_deref(), raw_scores)
        }
        Commands::Query { index, limit, terms } => run_query(&index, limit, &terms.join(" ")),
        Commands::Ui { index, stopwords } => run_ui(index.as_deref(), stopwords.as_deref()),
    }
}

fn tokenizer(stopwords: Option<&str>) -> Tokenizer {
    stopwords.map(Tokenizer::with_stopwords_file).unwrap_or_default()
}

fn build_index(input: &str, output: &str, stopwords: Option<&str>, raw_scores: bool) -> Result<()> {
    let tokenizer = tokenizer(stopwords);
    let mut catalog = IndexCatalog::new();
    let stats = ingest_path(&mut catalog, &tokenizer, Path::new(input))?;
    if !raw_scores {
        catalog.finalize_corpus();
    }
    catalog.save(output).with_context(|| format!("saving index to {output}"))?;

    println!("Processed {} files: {} documents indexed, {} failures", stats.files, stats.documents, stats.failures);
    println!("Indexed {} documents into {output}.", catalog.total_documents());
    tracing::info!(output, "index build complete");
    Ok(())
}

fn run_query(index: &str, limit: usize, query: &str) -> Result<()> {
    let catalog = IndexCatalog::open(index)
        .with_context(|| format!("loading index from {index}; create one with the 'build' command"))?;
    let engine = QueryEngine::new(&catalog, EnglishNormalizer);
    println!("Searching for: {query}");
    let results = engine.process(query, limit);
    write_results(&mut io::stdout().lock(), &results)?;
    Ok(())
}

fn run_ui(index: Option<&str>, stopwords: Option<&str>) -> Result<()> {
    let catalog = match index {
        Some(path) => IndexCatalog::open(path).with_context(|| format!("loading index from {path}"))?,
        None => IndexCatalog::new(),
    };
    let mut shell = Shell::new(catalog, tokenizer(stopwords));
    shell.run(io::stdin().lock(), io::stdout().lock())
}
