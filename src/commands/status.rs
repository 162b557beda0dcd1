//! Status command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::{GlobalStats, MetaDb, Rulebook};
use crate::store::VectorIndex;
use serde::Serialize;
use tracing::{debug, info};

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub upload_dir: String,
    pub index_backend: String,
    pub index_reachable: bool,
    pub index_points: Option<usize>,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub db_stats: GlobalStats,
}

/// Get system status
pub async fn cmd_status(config: &Config, db: &MetaDb, index: &dyn VectorIndex) -> Result<StatusInfo> {
    info!("Getting status");

    let db_stats = db.get_global_stats().await?;

    let (index_reachable, index_points) = match index.health().await {
        Ok(()) => match index.count().await {
            Ok(count) => (true, Some(count)),
            Err(e) => {
                debug!("Index count error: {:?}", e);
                (true, None)
            }
        },
        Err(e) => {
            debug!("Index connection error: {:?}", e);
            (false, None)
        }
    };

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        upload_dir: config.paths.upload_dir.display().to_string(),
        index_backend: index.name().to_string(),
        index_reachable,
        index_points,
        embedding_model: config.embedding.model.clone(),
        embedding_dimension: index.dimension(),
        db_stats,
    })
}

/// Look up a single rulebook
pub async fn cmd_rulebook_status(db: &MetaDb, rulebook_id: i64) -> Result<Rulebook> {
    db.get_rulebook(rulebook_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("rulebook {}", rulebook_id)))
}

/// Print status to console
pub fn print_status(status: &StatusInfo) {
    println!("\n📊 boardgame-rag Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("Uploads: {}", status.upload_dir);
    println!("\nVector index ({}):", status.index_backend);
    println!(
        "  Status: {}",
        if status.index_reachable { "✓ Reachable" } else { "✗ Not reachable" }
    );
    match status.index_points {
        Some(points) => println!("  Points: {}", points),
        None => println!("  Points: unknown"),
    }
    println!(
        "\nEmbedding Model: {} ({} dimensions)",
        status.embedding_model, status.embedding_dimension
    );

    let stats = &status.db_stats;
    println!("\nDatabase Stats:");
    println!("  Games: {}", stats.game_count);
    println!("  Rulebooks: {}", stats.rulebook_count);
    println!(
        "    pending {}, processing {}, processed {}, failed {}",
        stats.pending, stats.processing, stats.processed, stats.failed
    );
    println!("  Chunks: {}", stats.chunk_count);
}

/// Print one rulebook's processing state
pub fn print_rulebook(rulebook: &Rulebook) {
    println!("\n📘 Rulebook {}\n", rulebook.rulebook_id);
    println!("Game: {}", rulebook.game_id);
    println!("File: {}", rulebook.original_filename);
    println!("Status: {}", rulebook.processing_status);
    if let Some(pages) = rulebook.page_count {
        println!("Pages: {}", pages);
    }
    if let Some(chunks) = rulebook.chunk_count {
        println!("Chunks: {}", chunks);
    }
    if let Some(ref model) = rulebook.embedding_model {
        println!("Embedding model: {}", model);
    }
    if let Some(ref processed) = rulebook.processed_date {
        println!("Processed: {}", processed);
    }
    if let Some(ref error) = rulebook.error_message {
        println!("Error: {}", error);
    }
}
