//! Prune command implementation

use crate::error::Result;
use crate::ingest::IngestPipeline;
use crate::meta::MetaDb;
use serde::Serialize;
use tracing::info;

/// Prune statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneStats {
    pub candidates: Vec<i64>,
    pub purged: Vec<i64>,
    pub errors: Vec<String>,
}

/// Delete leftover vectors of failed rulebooks
pub async fn cmd_prune(db: &MetaDb, pipeline: &IngestPipeline, dry_run: bool) -> Result<PruneStats> {
    let candidates: Vec<i64> = db
        .list_failed_unpurged()
        .await?
        .iter()
        .map(|r| r.rulebook_id)
        .collect();
    info!("{} failed rulebooks awaiting cleanup", candidates.len());

    if dry_run {
        return Ok(PruneStats {
            candidates,
            ..Default::default()
        });
    }

    let report = pipeline.purge_failed().await?;
    Ok(PruneStats {
        candidates,
        purged: report.purged,
        errors: report
            .errors
            .into_iter()
            .map(|(id, e)| format!("rulebook {}: {}", id, e))
            .collect(),
    })
}

pub fn print_prune_stats(stats: &PruneStats, dry_run: bool) {
    if dry_run {
        println!("\n🧹 Prune (dry run)\n");
        println!("Would purge vectors of {} failed rulebooks", stats.candidates.len());
        for id in &stats.candidates {
            println!("  rulebook {}", id);
        }
        return;
    }

    println!("\n🧹 Prune Complete\n");
    println!("Purged: {}", stats.purged.len());
    if !stats.errors.is_empty() {
        println!("Errors:");
        for error in &stats.errors {
            println!("  {}", error);
        }
    }
}
