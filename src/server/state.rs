//! Shared handles behind every request handler

use crate::config::Config;
use crate::embed::Embedder;
use crate::ingest::{IngestPipeline, IngestQueue, IngestSettings, QueueHandle};
use crate::meta::MetaDb;
use crate::parse::PageExtractor;
use crate::retrieve::RetrievalEngine;
use crate::store::VectorIndex;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: MetaDb,
    pub index: Arc<dyn VectorIndex>,
    pub pipeline: Arc<IngestPipeline>,
    pub retrieval: RetrievalEngine,
    pub queue: QueueHandle,
}

impl AppState {
    /// Wire the pipeline, retrieval engine and worker pool from their collaborators.
    ///
    /// The returned queue owns the workers; shut it down after the server stops.
    pub fn build(
        config: Config,
        db: MetaDb,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<dyn PageExtractor>,
    ) -> (Arc<Self>, IngestQueue) {
        let pipeline = Arc::new(IngestPipeline::new(
            db.clone(),
            index.clone(),
            embedder.clone(),
            extractor,
            IngestSettings::from_config(&config),
        ));
        let queue = IngestQueue::start(
            pipeline.clone(),
            config.ingest.workers,
            config.ingest.queue_capacity,
        );
        let retrieval = RetrievalEngine::new(db.clone(), index.clone(), embedder, &config);

        let state = Arc::new(Self {
            db,
            index,
            pipeline,
            retrieval,
            queue: queue.handle(),
            config,
        });
        (state, queue)
    }
}
