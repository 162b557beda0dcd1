//! CLI commands implementation

pub mod ask;
pub mod games;
pub mod ingest;
pub mod init;
pub mod prune;
pub mod serve;
pub mod status;

pub use ask::*;
pub use games::*;
pub use ingest::*;
pub use init::*;
pub use prune::*;
pub use serve::*;
pub use status::*;

use crate::config::Config;
use crate::embed::{create_embedder, Embedder};
use crate::error::Result;
use crate::ingest::{IngestPipeline, IngestSettings};
use crate::meta::MetaDb;
use crate::parse::{PageExtractor, PdfExtractor};
use crate::retrieve::RetrievalEngine;
use crate::store::{connect_index, VectorIndex};
use std::sync::Arc;

/// Collaborators shared by the commands, built once from [`Config`]
pub struct Services {
    pub db: MetaDb,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn Embedder>,
    pub extractor: Arc<dyn PageExtractor>,
}

impl Services {
    /// Open the database and build the configured index, embedder and extractor
    pub async fn open(config: &Config) -> Result<Self> {
        let db = MetaDb::new(&config.paths.db_file).await?;
        let embedder = create_embedder(&config.embedding)?;
        let index = connect_index(config, embedder.dimension()).await?;
        Ok(Self {
            db,
            index,
            embedder,
            extractor: Arc::new(PdfExtractor::new()),
        })
    }

    pub fn pipeline(&self, config: &Config) -> IngestPipeline {
        IngestPipeline::new(
            self.db.clone(),
            self.index.clone(),
            self.embedder.clone(),
            self.extractor.clone(),
            IngestSettings::from_config(config),
        )
    }

    pub fn retrieval(&self, config: &Config) -> RetrievalEngine {
        RetrievalEngine::new(self.db.clone(), self.index.clone(), self.embedder.clone(), config)
    }
}
