//! Ingest command implementation

use crate::error::{Error, Result};
use crate::ingest::{GameRef, IngestPipeline};
use crate::meta::RulebookStatus;
use crate::progress::{advance_progress, finish_progress, start_progress_bar};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Per-file result of an ingest run
#[derive(Debug, Clone, Serialize)]
pub struct IngestedFile {
    pub path: String,
    pub rulebook_id: Option<i64>,
    pub game_id: Option<i64>,
    pub status: String,
    pub duplicate: bool,
    pub pages: Option<i64>,
    pub chunks: Option<i64>,
    pub error: Option<String>,
}

/// Ingest statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub processed: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub files: Vec<IngestedFile>,
}

/// Collect PDF files under `path` (or `path` itself), sorted
pub fn collect_pdf_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(Error::Validation(format!(
            "{} is neither a file nor a directory",
            path.display()
        )));
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| mime_guess::from_path(p).first_raw() == Some("application/pdf"))
        .collect();

    files.sort();
    Ok(files)
}

/// Ingest one PDF or every PDF in a directory into a game, processing inline
pub async fn cmd_ingest(pipeline: &IngestPipeline, path: &Path, target: GameRef) -> Result<IngestStats> {
    let files = collect_pdf_files(path)?;
    info!("Found {} PDF files to ingest", files.len());

    let mut stats = IngestStats::default();
    let progress = start_progress_bar(files.len(), "Ingesting rulebooks");

    for file in files {
        let shown = file.display().to_string();
        let filename = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("rulebook.pdf")
            .to_string();

        let result = match tokio::fs::read(&file).await {
            Ok(bytes) => pipeline.ingest(&bytes, target.clone(), &filename).await,
            Err(e) => Err(e.into()),
        };

        let entry = match result {
            Ok(outcome) => {
                let rulebook = outcome.rulebook;
                if outcome.duplicate {
                    stats.duplicates += 1;
                } else if rulebook.status()? == RulebookStatus::Failed {
                    stats.failed += 1;
                } else {
                    stats.processed += 1;
                }
                IngestedFile {
                    path: shown.clone(),
                    rulebook_id: Some(rulebook.rulebook_id),
                    game_id: Some(rulebook.game_id),
                    status: rulebook.processing_status,
                    duplicate: outcome.duplicate,
                    pages: rulebook.page_count,
                    chunks: rulebook.chunk_count,
                    error: rulebook.error_message,
                }
            }
            Err(e) => {
                warn!(path = %shown, "Ingest failed: {}", e);
                stats.failed += 1;
                IngestedFile {
                    path: shown.clone(),
                    rulebook_id: None,
                    game_id: None,
                    status: RulebookStatus::Failed.to_string(),
                    duplicate: false,
                    pages: None,
                    chunks: None,
                    error: Some(e.to_string()),
                }
            }
        };

        stats.files.push(entry);
        advance_progress(&progress, &filename);
    }

    finish_progress(progress, "Rulebooks ingested");
    info!(
        "Ingestion complete: {} processed, {} duplicates, {} failed",
        stats.processed, stats.duplicates, stats.failed
    );

    Ok(stats)
}

/// Print ingest statistics
pub fn print_ingest_stats(stats: &IngestStats) {
    println!("\n📥 Ingestion Complete\n");
    for file in &stats.files {
        let marker = match (file.duplicate, file.status.as_str()) {
            (true, _) => "=",
            (false, "processed") => "✓",
            _ => "✗",
        };
        print!("{} {}", marker, file.path);
        if let Some(id) = file.rulebook_id {
            print!("  [rulebook {}]", id);
        }
        if let (Some(pages), Some(chunks)) = (file.pages, file.chunks) {
            print!("  {} pages, {} chunks", pages, chunks);
        }
        if file.duplicate {
            print!("  (already ingested)");
        }
        println!();
        if let Some(ref error) = file.error {
            println!("    {}", error);
        }
    }

    println!(
        "\nProcessed: {}  Duplicates: {}  Failed: {}",
        stats.processed, stats.duplicates, stats.failed
    );
}
