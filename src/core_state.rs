//! Shared application state.
//!
//! `CoreState` is built once at startup, wrapped in `Arc`, and handed to the
//! HTTP layer. Each operation opens its own database connection; the worker
//! pool does the same per job.

use std::sync::Arc;

use rusqlite::Connection;
use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use crate::db::{self, DatabaseError};
use crate::pipeline::extraction::{
    DocumentExtractor, ExtractionError, OcrEngine, OllamaVisionOcr, PdfTextExtractor,
    PdfiumRenderer, TextExtractor, UnavailableOcr,
};
use crate::pipeline::{recover_reports, JobContext, JobQueue, PipelineError, RecoverySummary, WorkerPool};
use crate::storage::{ObjectStore, StorageError};

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Extractor setup failed: {0}")]
    Extraction(#[from] ExtractionError),
    #[error("Startup recovery failed: {0}")]
    Recovery(#[from] PipelineError),
}

pub struct CoreState {
    config: AppConfig,
    store: Arc<dyn ObjectStore>,
    queue: JobQueue,
}

/// Everything `start` brings up. The pool is kept apart so the owner can
/// shut it down by value.
pub struct Started {
    pub core: Arc<CoreState>,
    pub pool: WorkerPool,
    pub recovery: RecoverySummary,
}

impl CoreState {
    pub fn new(config: AppConfig, store: Arc<dyn ObjectStore>, queue: JobQueue) -> Self {
        Self { config, store, queue }
    }

    /// Prepare the data dir and schema, start the workers, then run
    /// startup recovery before anything else can enqueue.
    pub async fn start(
        config: AppConfig,
        store: Arc<dyn ObjectStore>,
        extractor: Arc<dyn TextExtractor>,
    ) -> Result<Started, CoreError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let db_path = config.db_path();
        db::open_database(&db_path)?;

        let ctx = JobContext {
            db_path: db_path.clone(),
            store: Arc::clone(&store),
            extractor,
            extraction_timeout: config.extraction_timeout,
        };
        let (queue, pool) = WorkerPool::start(ctx, config.workers, config.queue_capacity);
        let recovery = recover_reports(db_path, &queue).await?;

        Ok(Started {
            core: Arc::new(Self::new(config, store, queue)),
            pool,
            recovery,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Open a connection to the application database.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        db::open_database(&self.config.db_path())
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }
}

/// Production extractor: PDF text layer and plain text, plus vision OCR for
/// images and scanned PDF pages when an endpoint is configured.
///
/// Builds a blocking HTTP client, so call it off the async runtime.
pub fn build_extractor(config: &AppConfig) -> Result<Arc<dyn TextExtractor>, CoreError> {
    let Some(url) = &config.ocr_url else {
        tracing::warn!("No OCR endpoint configured, image uploads and scanned PDFs will fail extraction");
        return Ok(Arc::new(DocumentExtractor::new(
            Box::new(UnavailableOcr),
            Box::new(PdfTextExtractor),
        )));
    };

    let engine = OllamaVisionOcr::new(url, &config.ocr_model, config.extraction_timeout.as_secs())?;
    tracing::info!(url = %url, model = engine.model_name(), "Vision OCR configured");
    let ocr: Box<dyn OcrEngine> = Box::new(engine);
    let extractor = DocumentExtractor::new(ocr, Box::new(PdfTextExtractor));

    match PdfiumRenderer::new(config.pdfium_path.as_deref()) {
        Ok(renderer) => {
            tracing::info!("PDFium available, scanned PDF pages are rendered for OCR");
            Ok(Arc::new(extractor.with_pdf_renderer(Box::new(renderer))))
        }
        Err(e) => {
            tracing::warn!(error = %e, "PDFium unavailable, scanned PDFs go to OCR whole");
            Ok(Arc::new(extractor))
        }
    }
}
