use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dbgraph::config::PipelineConfig;
use dbgraph::pipeline::RunOptions;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "dbgraph")]
#[command(about = "Resolve DBpedia RDF dumps into dense-id graph tables")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, join, number and encode the source dumps into tables
    Encode(EncodeArgs),
    /// Merge sharded tables into single files for neo4j-admin import
    Merge(MergeArgs),
}

#[derive(Args)]
struct EncodeArgs {
    /// TOML file with source paths, profiles and headers
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Link-target source (foaf:primaryTopic triples)
    #[arg(long)]
    link_targets: Option<PathBuf>,

    /// Label source (rdfs:label triples)
    #[arg(long)]
    labels: Option<PathBuf>,

    /// Page-link source (wikiPageWikiLink triples)
    #[arg(long)]
    page_links: Option<PathBuf>,

    /// Category-membership source (dct:subject triples)
    #[arg(long)]
    categories: Option<PathBuf>,

    /// Output directory for generated tables
    #[arg(short, long)]
    output: PathBuf,

    /// Number of output shards per table (1 = single file)
    #[arg(long, default_value_t = 1)]
    shards: u32,

    /// Limit number of lines read from each source (for testing)
    #[arg(long)]
    limit: Option<u64>,

    /// Dry run - don't write output files
    #[arg(long)]
    dry_run: bool,

    /// Reuse the page checkpoint if the inputs have not changed
    #[arg(long)]
    resume: bool,

    /// Clear existing outputs before starting
    #[arg(long)]
    clean: bool,
}

#[derive(Args)]
struct MergeArgs {
    /// Output directory containing sharded tables (e.g., pages_000.tsv, pages_001.tsv)
    #[arg(short, long)]
    output: PathBuf,
}

fn run_encode(args: EncodeArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(path) = args.link_targets {
        config.sources.link_targets = Some(path);
    }
    if let Some(path) = args.labels {
        config.sources.labels = Some(path);
    }
    if let Some(path) = args.page_links {
        config.sources.page_links = Some(path);
    }
    if let Some(path) = args.categories {
        config.sources.categories = Some(path);
    }

    if args.clean && args.output.exists() {
        info!("Cleaning output directory: {}", args.output.display());
        fs::remove_dir_all(&args.output).with_context(|| {
            format!("Failed to clean output directory: {}", args.output.display())
        })?;
    }

    let options = RunOptions {
        output_dir: args.output,
        shards: args.shards.max(1),
        limit: args.limit,
        dry_run: args.dry_run,
        resume: args.resume && !args.clean,
    };

    let report = dbgraph::pipeline::run(&config, &options)?;
    let stats = &report.stats;

    println!();
    println!("=== Summary ===");
    println!("Total time:          {:.2}s", report.duration_secs);
    println!();
    println!("Lines scanned:       {}", stats.lines_scanned);
    println!("Lines rejected:      {}", stats.lines_rejected);
    println!("Pages:               {}", stats.pages_assigned);
    println!("Categories:          {}", stats.categories_assigned);
    println!("Links encoded:       {}", stats.links_encoded);
    println!("Links dropped:       {}", stats.links_dropped);
    println!("Memberships encoded: {}", stats.memberships_encoded);
    println!("Memberships dropped: {}", stats.memberships_dropped);
    println!("Rows written:        {}", stats.rows_written);
    if let Some(max) = report.max_page_id {
        println!("Max page id:         {}", max);
    }
    if let Some(first) = report.first_category_id {
        println!("First category id:   {}", first);
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Encode(args) => run_encode(args),
        Commands::Merge(args) => dbgraph::merge::merge_table_shards(&args.output),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
