//! Full-text search over exported documents.
//!
//! An export run leaves one json document per character behind; this
//! module builds a throwaway SQLite FTS5 index over them so the data can
//! be grepped by content without re-walking the tree. The index is
//! rebuilt from scratch on every run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use bon::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use rusqlite::{Connection, params};
use tracing::{debug, info, warn};

use crate::error::DataResult;

/// Database file an index run produces when no path is given.
pub const DEFAULT_DB_FILE: &str = "sqlite.db";

/// Rows buffered between commits.
pub const BATCH_SIZE: usize = 1000;

/// Reader threads for file ingestion.
pub const DEFAULT_WORKERS: usize = 4;

/// A batch is flushed early once its pending content exceeds this.
const MAX_BATCH_BYTES: usize = 50 * 1024 * 1024;

#[derive(Builder, Debug, Clone)]
pub struct IndexOptions {
    /// Directory whose json documents get indexed.
    pub root: PathBuf,
    /// Database file to create or replace.
    #[builder(default = PathBuf::from(DEFAULT_DB_FILE))]
    pub db: PathBuf,
    #[builder(default = DEFAULT_WORKERS)]
    pub workers: usize,
    #[builder(default = BATCH_SIZE)]
    pub batch_size: usize,
}

/// How query terms combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The whole query must appear as one phrase.
    Exact,
    /// Every term must appear somewhere in the document.
    AllTerms,
    /// Any term is enough; best matches rank first.
    Fuzzy,
}

/// One matching document, with every line the query pattern hit.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub filepath: String,
    /// 1-based line numbers paired with the line text.
    pub lines: Vec<(usize, String)>,
}

// ------------------------------------------------------------------------
// Index construction
// ------------------------------------------------------------------------

/// Build the FTS index from scratch and return how many documents went in.
///
/// Files that cannot be read as UTF-8 are skipped with a warning. The
/// table is dropped and recreated up front, so a rebuild never leaves
/// rows from documents that have since been deleted.
pub fn build_index(options: &IndexOptions) -> DataResult<usize> {
    let started = Instant::now();

    let mut conn = Connection::open(&options.db)?;
    conn.execute_batch(
        "DROP TABLE IF EXISTS files;
         CREATE VIRTUAL TABLE files USING fts5(filepath, content);",
    )?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;
    conn.pragma_update(None, "cache_size", -50000)?;
    conn.pragma_update(None, "mmap_size", 268_435_456)?;

    let files = document_paths(&options.root)?;
    if files.is_empty() {
        warn!("no json documents under {}", options.root.display());
        return Ok(0);
    }
    info!(
        "indexing {} documents from {}",
        files.len(),
        options.root.display()
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .build()
        .map_err(io::Error::other)?;

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, eta {eta}) {msg}",
            )
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut indexed = 0usize;
    let mut batch: Vec<(String, String)> = Vec::new();
    let mut batch_bytes = 0usize;

    // Read a bounded window of files at a time so the whole tree is never
    // resident at once.
    for chunk in files.chunks(options.workers.max(1) * 10) {
        let read: Vec<Option<(String, String)>> = pool.install(|| {
            chunk
                .par_iter()
                .map(|path| {
                    let result = match fs::read_to_string(path) {
                        Ok(content) => Some((path.display().to_string(), content)),
                        Err(e) => {
                            warn!("skipping {}: {e}", path.display());
                            None
                        }
                    };
                    bar.inc(1);
                    result
                })
                .collect()
        });

        for (filepath, content) in read.into_iter().flatten() {
            batch_bytes += content.len();
            batch.push((filepath, content));
            indexed += 1;

            if batch.len() >= options.batch_size || batch_bytes >= MAX_BATCH_BYTES {
                if batch_bytes >= MAX_BATCH_BYTES {
                    debug!(
                        "flushing large batch: {:.1}MB pending",
                        batch_bytes as f64 / 1024.0 / 1024.0
                    );
                }
                flush_batch(&mut conn, &mut batch)?;
                batch_bytes = 0;
            }
        }
    }
    if !batch.is_empty() {
        flush_batch(&mut conn, &mut batch)?;
    }
    bar.finish_with_message("done");

    // Fold the WAL back into the main file and merge the FTS b-trees so
    // the shipped database is a single compact file.
    conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
    conn.execute("INSERT INTO files(files) VALUES('optimize')", [])?;

    info!("indexed {indexed} documents in {:.1?}", started.elapsed());
    Ok(indexed)
}

fn document_paths(root: &Path) -> DataResult<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.json", root.display());
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).map_err(io::Error::other)? {
        match entry {
            Ok(path) => files.push(path),
            Err(e) => warn!("skipping unreadable path: {e}"),
        }
    }
    Ok(files)
}

fn flush_batch(conn: &mut Connection, batch: &mut Vec<(String, String)>) -> DataResult<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare_cached("INSERT OR REPLACE INTO files VALUES (?1, ?2)")?;
        for (filepath, content) in batch.drain(..) {
            stmt.execute(params![filepath, content])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ------------------------------------------------------------------------
// Queries
// ------------------------------------------------------------------------

/// Query the index, best matches first, capped at 100 documents.
pub fn search(db: &Path, query: &str, mode: MatchMode) -> DataResult<Vec<SearchHit>> {
    let conn = Connection::open(db)?;
    conn.pragma_update(None, "query_only", true)?;

    let fts = fts_query(query, mode);
    debug!("fts query: {fts}");

    let mut stmt = conn.prepare(
        "SELECT filepath, content FROM files WHERE content MATCH ?1 ORDER BY rank LIMIT 100",
    )?;
    let rows = stmt.query_map(params![fts], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let pattern = highlight_pattern(query, mode)?;
    let mut hits = Vec::new();
    for row in rows {
        let (filepath, content) = row?;
        let lines: Vec<(usize, String)> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| pattern.is_match(line))
            .map(|(idx, line)| (idx + 1, line.to_owned()))
            .collect();
        // FTS matches the whole document; a phrase can span lines and
        // then no single line contains it.
        if !lines.is_empty() {
            hits.push(SearchHit { filepath, lines });
        }
    }
    Ok(hits)
}

/// Case-insensitive pattern matching the same text the FTS query did,
/// for marking up hit lines in a terminal.
pub fn highlight_pattern(query: &str, mode: MatchMode) -> DataResult<Regex> {
    let source = match mode {
        MatchMode::Exact => regex::escape(query),
        MatchMode::AllTerms | MatchMode::Fuzzy => terms(query).map(regex::escape).join("|"),
    };
    let pattern = RegexBuilder::new(&source).case_insensitive(true).build()?;
    Ok(pattern)
}

fn fts_query(query: &str, mode: MatchMode) -> String {
    match mode {
        MatchMode::Exact => {
            if query.contains(' ') {
                format!("\"{query}\"")
            } else {
                quote_term(query)
            }
        }
        MatchMode::AllTerms => terms(query).map(quote_term).join(" AND "),
        MatchMode::Fuzzy => terms(query).map(quote_term).join(" OR "),
    }
}

fn terms(query: &str) -> impl Iterator<Item = &str> {
    query.trim_matches('"').split_whitespace()
}

/// Punctuation that FTS5 treats as syntax unless the term is quoted.
fn quote_term(term: &str) -> String {
    if term.chars().any(|c| ".,-_@".contains(c)) {
        format!("\"{term}\"")
    } else {
        term.to_owned()
    }
}
