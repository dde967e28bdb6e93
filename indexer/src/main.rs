use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indexer::repl::{self, DEFAULT_QUIT_WORD};
use indexer::{load_documents, SourceFormat};
use search_core::persist::IndexPaths;
use search_core::{EngineConfig, SearchEngine, SearchRequest};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a full-text inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a text directory or a feed file, replacing any previous index
    Build {
        /// Input path (directory for text, JSON/JSONL file for feed)
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = SourceFormat::Feed)]
        format: SourceFormat,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Run one search against a built index
    Search {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Number of results (defaults to the configured k)
        #[arg(long)]
        k: Option<usize>,
        /// Free-text query; words prefixed with '-' are excluded
        #[arg(long, conflicts_with_all = ["in_title", "not_in_title", "in_description", "not_in_description", "start_date", "end_date"])]
        query: Option<String>,
        /// Field searched by --query (defaults to the content field)
        #[arg(long, requires = "query")]
        field: Option<String>,
        #[command(flatten)]
        request: RequestArgs,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Answer free-text queries read from stdin, one per line
    Repl {
        /// Index directory
        #[arg(long, default_value = "./index")]
        index: PathBuf,
        /// Number of results per query (defaults to the configured k)
        #[arg(long)]
        k: Option<usize>,
        /// Field searched (defaults to the content field)
        #[arg(long)]
        field: Option<String>,
        /// Line that ends the session
        #[arg(long, default_value = DEFAULT_QUIT_WORD)]
        quit: String,
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// JSON engine configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Drop English stop words while analyzing
    #[arg(long, default_value_t = false)]
    stop_words: bool,
    /// Apply English stemming while analyzing
    #[arg(long, default_value_t = false)]
    stem: bool,
}

impl EngineArgs {
    fn load(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
                EngineConfig::from_json(&text)?
            }
            None => EngineConfig::default(),
        };
        config.analyzer.stop_words |= self.stop_words;
        config.analyzer.stemming |= self.stem;
        Ok(config)
    }
}

#[derive(Args)]
struct RequestArgs {
    /// Words that must all appear in the title (comma-separated)
    #[arg(long, value_delimiter = ',')]
    in_title: Option<Vec<String>>,
    /// Words that must not appear in the title
    #[arg(long, value_delimiter = ',')]
    not_in_title: Option<Vec<String>>,
    /// Words that must all appear in the description
    #[arg(long, value_delimiter = ',')]
    in_description: Option<Vec<String>>,
    /// Words that must not appear in the description
    #[arg(long, value_delimiter = ',')]
    not_in_description: Option<Vec<String>>,
    /// First publication day, yyyy-mm-dd (inclusive)
    #[arg(long)]
    start_date: Option<String>,
    /// Last publication day, yyyy-mm-dd (inclusive)
    #[arg(long)]
    end_date: Option<String>,
}

impl From<RequestArgs> for SearchRequest {
    fn from(a: RequestArgs) -> Self {
        SearchRequest {
            in_title: a.in_title,
            not_in_title: a.not_in_title,
            in_description: a.in_description,
            not_in_description: a.not_in_description,
            start_date: a.start_date,
            end_date: a.end_date,
        }
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, format, engine } => build_index(input, output, format, engine.load()?),
        Commands::Search { index, k, query, field, request, engine } => {
            let engine = open_engine(&index, engine.load()?)?;
            let searcher = engine.searcher()?;
            let k = k.unwrap_or(engine.config().default_k);
            let top = match query {
                Some(text) => {
                    let field = field.unwrap_or_else(|| engine.config().fields.content.clone());
                    println!("Search ({field}: {text}):");
                    searcher.search_simple(&field, &text, k)
                }
                None => {
                    let request = SearchRequest::from(request);
                    println!("{request}:");
                    searcher.search_request(&request, k)?
                }
            };
            repl::write_results(&mut io::stdout().lock(), &searcher, engine.config(), &top)?;
            Ok(())
        }
        Commands::Repl { index, k, field, quit, engine } => {
            let engine = open_engine(&index, engine.load()?)?;
            let searcher = engine.searcher()?;
            let k = k.unwrap_or(engine.config().default_k);
            let field = field.unwrap_or_else(|| engine.config().fields.content.clone());
            repl::run(&searcher, engine.config(), &field, k, &quit, io::stdin().lock(), io::stdout().lock())?;
            Ok(())
        }
    }
}

fn open_engine(index: &Path, config: EngineConfig) -> Result<SearchEngine> {
    SearchEngine::open(config, &IndexPaths::new(index)).with_context(|| format!("opening index at {}", index.display()))
}

fn build_index(input: PathBuf, output: PathBuf, format: SourceFormat, config: EngineConfig) -> Result<()> {
    let docs = load_documents(format, &input, &config.fields);
    let engine = SearchEngine::new(config);
    let searcher = engine
        .rebuild_and_persist(&IndexPaths::new(&output), docs)
        .with_context(|| format!("writing index to {}", output.display()))?;
    tracing::info!(output = %output.display(), num_docs = searcher.index().document_count(), "index build complete");
    Ok(())
}
