use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use rootcause::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use tofexport::export::{self, ExportOptions};
use tofexport::search::{self, IndexOptions, MatchMode};

#[derive(Parser)]
#[command(name = "tofexport", version)]
#[command(about = "Extract and export Tower of Fantasy weapon data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract weapons from a datatable dump and export documents + images
    Export {
        /// Directory the asset dump was extracted into
        #[arg(short, long)]
        data_root: PathBuf,

        /// Where the run writes its output
        #[arg(short, long, default_value = "export")]
        output: PathBuf,

        /// Edit table applied to the linked weapons before writing
        #[arg(short, long)]
        edits: Option<PathBuf>,

        /// Skip the per-character documents and their images
        #[arg(long)]
        no_weapons: bool,

        /// Skip the element and category icon sets
        #[arg(long)]
        no_icons: bool,

        /// Pack the output directory into <output>.tar.zst
        #[arg(short, long)]
        compress: bool,

        /// With --compress, keep the output directory as well
        #[arg(long, requires = "compress")]
        keep_output: bool,
    },

    /// Build the full-text index over exported documents
    Index {
        /// Directory holding the exported json documents
        #[arg(short, long, default_value = "export")]
        root: PathBuf,

        /// Database file to create or replace
        #[arg(long, default_value = search::DEFAULT_DB_FILE)]
        db: PathBuf,

        /// Reader threads for file ingestion
        #[arg(long, default_value_t = search::DEFAULT_WORKERS)]
        workers: usize,

        /// Rows buffered between commits
        #[arg(long, default_value_t = search::BATCH_SIZE)]
        batch_size: usize,
    },

    /// Query the full-text index
    Search {
        /// Search terms, joined into one query
        #[arg(required = true)]
        terms: Vec<String>,

        /// Database file to query
        #[arg(long, default_value = search::DEFAULT_DB_FILE)]
        db: PathBuf,

        /// Match any term instead of the exact phrase
        #[arg(short, long, conflicts_with = "and_terms")]
        fuzzy: bool,

        /// Match only documents containing every term
        #[arg(short, long)]
        and_terms: bool,
    },
}

fn main() -> Result<(), Report> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tofexport=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            data_root,
            output,
            edits,
            no_weapons,
            no_icons,
            compress,
            keep_output,
        } => {
            let options = ExportOptions::builder()
                .data_root(data_root)
                .output_dir(output)
                .maybe_edits(edits)
                .weapons(!no_weapons)
                .icons(!no_icons)
                .compress(compress)
                .keep_output(keep_output)
                .build();
            export::export_assets(&options)?;
        }

        Commands::Index {
            root,
            db,
            workers,
            batch_size,
        } => {
            let options = IndexOptions::builder()
                .root(root)
                .db(db)
                .workers(workers)
                .batch_size(batch_size)
                .build();
            let count = search::build_index(&options)
                .map_err(|e| rootcause::report!("index build failed: {}", e.kind))?;
            println!("indexed {count} documents");
        }

        Commands::Search {
            terms,
            db,
            fuzzy,
            and_terms,
        } => {
            let mode = if fuzzy {
                MatchMode::Fuzzy
            } else if and_terms {
                MatchMode::AllTerms
            } else {
                MatchMode::Exact
            };
            run_search(&db, &terms.join(" "), mode)?;
        }
    }

    Ok(())
}

fn run_search(db: &Path, query: &str, mode: MatchMode) -> Result<(), Report> {
    let hits = search::search(db, query, mode)
        .map_err(|e| rootcause::report!("search failed: {}", e.kind))?;
    if hits.is_empty() {
        println!("No matches found");
        return Ok(());
    }

    let label = match mode {
        MatchMode::Exact => "exact",
        MatchMode::AllTerms => "and",
        MatchMode::Fuzzy => "fuzzy",
    };
    println!("Found {} matches ({label} search):\n", hits.len());

    let pattern = search::highlight_pattern(query, mode)
        .map_err(|e| rootcause::report!("search failed: {}", e.kind))?;
    for hit in &hits {
        println!("\x1b[35m{}\x1b[0m", hit.filepath);
        for (number, line) in hit.lines.iter().take(3) {
            let highlighted = pattern.replace_all(line, "\x1b[1;31m$0\x1b[0m");
            println!("\x1b[32m{number}\x1b[0m:{highlighted}");
        }
        if hit.lines.len() > 3 {
            let remaining = hit.lines.len() - 3;
            let plural = if remaining > 1 { "es" } else { "" };
            println!("\x1b[90m... and {remaining} more match{plural}\x1b[0m");
        }
        println!();
    }
    Ok(())
}
