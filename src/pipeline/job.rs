//! Report processing job: drives one LabReport from `pending` to a terminal
//! status.
//!
//! claim → fetch bytes → extract (bounded) → record text → parse + commit.
//! Every error after the claim ends in `failed`; nothing is returned to a
//! caller. Blocking work runs on the blocking pool so panics surface as
//! `JoinError`s instead of tearing down the worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use uuid::Uuid;

use super::error::{JobStage, PipelineError};
use super::extraction::TextExtractor;
use super::parser;
use crate::db::{self, repository};
use crate::models::{Biomarker, LabReport};
use crate::storage::ObjectStore;

/// Collaborators shared by every job.
#[derive(Clone)]
pub struct JobContext {
    pub db_path: PathBuf,
    pub store: Arc<dyn ObjectStore>,
    pub extractor: Arc<dyn TextExtractor>,
    pub extraction_timeout: Duration,
}

/// Claim attempts before the job gives up on a database error.
const CLAIM_ATTEMPTS: u32 = 3;

/// Delay before the first claim retry; doubles on each further retry.
const CLAIM_RETRY_DELAY: Duration = Duration::from_millis(500);

/// How a job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { biomarker_count: usize },
    Failed { stage: JobStage },
    /// Report missing or already claimed (redelivery).
    Skipped,
}

/// Run the full state machine for `report_id`. Never panics, never errors.
pub async fn run_report_job(ctx: &JobContext, report_id: Uuid) -> JobOutcome {
    let report = match claim_with_retry(ctx, report_id).await {
        Ok(Some(report)) => report,
        Ok(None) => {
            tracing::debug!(report_id = %report_id, "Report already claimed or missing, skipping");
            return JobOutcome::Skipped;
        }
        Err(e) => {
            // Still pending: startup recovery re-enqueues it.
            tracing::error!(
                report_id = %report_id,
                stage = %JobStage::Claim,
                attempts = CLAIM_ATTEMPTS,
                error = %e,
                "Report left pending: claim failed on every attempt"
            );
            return JobOutcome::Failed { stage: JobStage::Claim };
        }
    };

    tracing::info!(
        report_id = %report_id,
        mime_type = %report.mime_type,
        file_size = report.file_size,
        "Report job started"
    );
    let start = std::time::Instant::now();

    match process(ctx, &report).await {
        Ok(biomarker_count) => {
            tracing::info!(
                report_id = %report_id,
                biomarker_count,
                elapsed_ms = %start.elapsed().as_millis(),
                "Report job completed"
            );
            JobOutcome::Completed { biomarker_count }
        }
        Err((stage, e)) => {
            tracing::error!(
                report_id = %report_id,
                stage = %stage,
                error = %e,
                "Report job failed"
            );
            mark_failed(ctx, report_id).await;
            JobOutcome::Failed { stage }
        }
    }
}

async fn process(ctx: &JobContext, report: &LabReport) -> Result<usize, (JobStage, PipelineError)> {
    let bytes = fetch(ctx, report)
        .await
        .map_err(|e| (JobStage::Fetch, e))?;
    let text = extract(ctx, bytes, report.mime_type.clone())
        .await
        .map_err(|e| (JobStage::Extract, e))?;
    record_text(ctx, report.id, text.clone())
        .await
        .map_err(|e| (JobStage::RecordText, e))?;
    parse_and_commit(ctx, report.id, text)
        .await
        .map_err(|e| (JobStage::Parse, e))
}

/// Claim, retrying database errors with a doubling delay. A report that
/// is missing or already claimed is not retried.
async fn claim_with_retry(ctx: &JobContext, report_id: Uuid) -> Result<Option<LabReport>, PipelineError> {
    let mut delay = CLAIM_RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match claim(ctx, report_id).await {
            Err(e) if attempt < CLAIM_ATTEMPTS => {
                tracing::warn!(
                    report_id = %report_id,
                    attempt,
                    retry_in_ms = %delay.as_millis(),
                    error = %e,
                    "Claim failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            result => return result,
        }
    }
}

async fn claim(ctx: &JobContext, report_id: Uuid) -> Result<Option<LabReport>, PipelineError> {
    let db_path = ctx.db_path.clone();
    run_blocking(JobStage::Claim, move || {
        let conn = db::open_database(&db_path)?;
        Ok(repository::claim_lab_report(&conn, &report_id)?)
    })
    .await
}

async fn fetch(ctx: &JobContext, report: &LabReport) -> Result<Vec<u8>, PipelineError> {
    let store = Arc::clone(&ctx.store);
    let locator = report.storage_locator.clone();
    run_blocking(JobStage::Fetch, move || Ok(store.fetch_bytes(&locator)?)).await
}

/// Extraction bounded by the configured timeout. On timeout the blocking
/// call is abandoned; its eventual result is dropped.
async fn extract(ctx: &JobContext, bytes: Vec<u8>, mime_type: String) -> Result<String, PipelineError> {
    let extractor = Arc::clone(&ctx.extractor);
    let task = tokio::task::spawn_blocking(move || {
        extractor
            .extract(&bytes, &mime_type)
            .map_err(PipelineError::from)
    });

    match tokio::time::timeout(ctx.extraction_timeout, task).await {
        Ok(joined) => flatten(JobStage::Extract, joined),
        Err(_) => Err(PipelineError::Timeout(ctx.extraction_timeout)),
    }
}

async fn record_text(ctx: &JobContext, report_id: Uuid, text: String) -> Result<(), PipelineError> {
    let db_path = ctx.db_path.clone();
    run_blocking(JobStage::RecordText, move || {
        let conn = db::open_database(&db_path)?;
        Ok(repository::record_extracted_text(&conn, &report_id, &text)?)
    })
    .await
}

async fn parse_and_commit(ctx: &JobContext, report_id: Uuid, text: String) -> Result<usize, PipelineError> {
    let db_path = ctx.db_path.clone();
    run_blocking(JobStage::Parse, move || {
        let test_date = parser::find_report_date(&text);
        let created_at = repository::now_utc();
        let biomarkers: Vec<Biomarker> = parser::parse(&text)
            .into_iter()
            .map(|c| c.into_biomarker(report_id, test_date, created_at))
            .collect();

        let conn = db::open_database(&db_path)?;
        repository::complete_with_biomarkers(&conn, &report_id, &biomarkers)
            .map_err(PipelineError::Parse)?;
        Ok(biomarkers.len())
    })
    .await
}

async fn mark_failed(ctx: &JobContext, report_id: Uuid) {
    let db_path = ctx.db_path.clone();
    let result = run_blocking(JobStage::MarkFailed, move || {
        let conn = db::open_database(&db_path)?;
        Ok(repository::mark_report_failed(&conn, &report_id)?)
    })
    .await;

    match result {
        Ok(true) => {}
        Ok(false) => tracing::warn!(
            report_id = %report_id,
            "Report was not in a failable state"
        ),
        Err(e) => tracing::error!(
            report_id = %report_id,
            stage = %JobStage::MarkFailed,
            error = %e,
            "Could not mark report failed"
        ),
    }
}

async fn run_blocking<T, F>(stage: JobStage, f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    flatten(stage, tokio::task::spawn_blocking(f).await)
}

fn flatten<T>(
    stage: JobStage,
    joined: Result<Result<T, PipelineError>, JoinError>,
) -> Result<T, PipelineError> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(PipelineError::Panicked(stage)),
        Err(e) => Err(PipelineError::Aborted {
            stage,
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::enums::ProcessingStatus;
    use crate::models::Caller;
    use crate::pipeline::extraction::pdf::tests::make_test_pdf;
    use crate::pipeline::extraction::{
        DocumentExtractor, ExtractionError, MockOcrEngine, PdfTextExtractor, UnavailableOcr,
    };
    use crate::storage::MemoryObjectStore;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    /// Extractor backed by a closure.
    pub(crate) struct FnExtractor<F>(pub F);

    impl<F> TextExtractor for FnExtractor<F>
    where
        F: Fn(&[u8], &str) -> Result<String, ExtractionError> + Send + Sync,
    {
        fn extract(&self, bytes: &[u8], mime_type: &str) -> Result<String, ExtractionError> {
            (self.0)(bytes, mime_type)
        }
    }

    pub(crate) struct Harness {
        _dir: TempDir,
        pub ctx: JobContext,
        pub store: Arc<MemoryObjectStore>,
        pub caller: Caller,
    }

    impl Harness {
        pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let db_path = dir.path().join("labinsight.db");
            db::open_database(&db_path).unwrap();
            let store = Arc::new(MemoryObjectStore::new());
            Self {
                ctx: JobContext {
                    db_path,
                    store: store.clone(),
                    extractor,
                    extraction_timeout: Duration::from_secs(5),
                },
                _dir: dir,
                store,
                caller: Caller::new(Uuid::new_v4(), Uuid::new_v4()),
            }
        }

        pub fn with_text_extractor() -> Self {
            Self::new(Arc::new(DocumentExtractor::new(
                Box::new(UnavailableOcr),
                Box::new(PdfTextExtractor),
            )))
        }

        pub fn upload(&self, bytes: &[u8], filename: &str, mime_type: &str) -> Uuid {
            let locator = self.store.put(bytes, filename).unwrap();
            let report = LabReport::new_pending(
                &self.caller,
                filename,
                &locator,
                mime_type,
                bytes.len() as u64,
                repository::now_utc(),
            );
            let conn = db::open_database(&self.ctx.db_path).unwrap();
            repository::insert_lab_report(&conn, &report).unwrap();
            report.id
        }

        pub fn report(&self, id: Uuid) -> LabReport {
            let conn = db::open_database(&self.ctx.db_path).unwrap();
            repository::get_lab_report(&conn, &id).unwrap().unwrap()
        }

        pub fn biomarkers(&self, id: Uuid) -> Vec<Biomarker> {
            let conn = db::open_database(&self.ctx.db_path).unwrap();
            repository::get_biomarkers_for_report(&conn, &id).unwrap()
        }
    }

    #[tokio::test]
    async fn text_report_completes_with_one_row_per_candidate() {
        let h = Harness::with_text_extractor();
        let text = "CITY LAB\nGlucose 95 mg/dL 70-100\n\nHIV: Negative\nnot a result\nLDL: 130 mg/dL";
        let id = h.upload(text.as_bytes(), "panel.txt", "text/plain");

        let outcome = run_report_job(&h.ctx, id).await;
        assert_eq!(outcome, JobOutcome::Completed { biomarker_count: 3 });

        let report = h.report(id);
        assert_eq!(report.processing_status, ProcessingStatus::Completed);
        assert_eq!(report.raw_extracted_text.as_deref(), Some(text));

        let rows = h.biomarkers(id);
        assert_eq!(rows.len(), 3);
        let lines: Vec<u32> = rows.iter().map(|b| b.line_number).collect();
        assert_eq!(lines, vec![2, 4, 6]);
        assert_eq!(rows[0].test_name, "Glucose");
        assert_eq!(rows[0].reference_range_high.as_deref(), Some("100"));
        assert!(rows.iter().all(|b| b.lab_report_id == id));
    }

    #[tokio::test]
    async fn extraction_error_fails_report_without_text_or_rows() {
        let h = Harness::new(Arc::new(FnExtractor(
            |_: &[u8], _: &str| -> Result<String, ExtractionError> {
                Err(ExtractionError::PdfParsing("corrupt xref table".into()))
            },
        )));
        let id = h.upload(b"%PDF-broken", "broken.pdf", "application/pdf");

        let outcome = run_report_job(&h.ctx, id).await;
        assert_eq!(outcome, JobOutcome::Failed { stage: JobStage::Extract });

        let report = h.report(id);
        assert_eq!(report.processing_status, ProcessingStatus::Failed);
        assert!(report.raw_extracted_text.is_none());
        assert!(h.biomarkers(id).is_empty());
    }

    #[tokio::test]
    async fn empty_text_completes_with_zero_biomarkers() {
        let h = Harness::new(Arc::new(FnExtractor(
            |_: &[u8], _: &str| -> Result<String, ExtractionError> { Ok(String::new()) },
        )));
        let id = h.upload(b"blank", "blank.png", "image/png");

        let outcome = run_report_job(&h.ctx, id).await;
        assert_eq!(outcome, JobOutcome::Completed { biomarker_count: 0 });
        let report = h.report(id);
        assert_eq!(report.processing_status, ProcessingStatus::Completed);
        assert_eq!(report.raw_extracted_text.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn slow_extraction_times_out_to_failed() {
        let mut h = Harness::new(Arc::new(FnExtractor(
            |_: &[u8], _: &str| -> Result<String, ExtractionError> {
                std::thread::sleep(Duration::from_millis(800));
                Ok("Glucose 95 mg/dL 70-100".to_string())
            },
        )));
        h.ctx.extraction_timeout = Duration::from_millis(50);
        let id = h.upload(b"slow", "slow.pdf", "application/pdf");

        let outcome = run_report_job(&h.ctx, id).await;
        assert_eq!(outcome, JobOutcome::Failed { stage: JobStage::Extract });
        let report = h.report(id);
        assert_eq!(report.processing_status, ProcessingStatus::Failed);
        assert!(report.raw_extracted_text.is_none());
        assert!(h.biomarkers(id).is_empty());
    }

    #[tokio::test]
    async fn panicking_extractor_is_contained() {
        let h = Harness::new(Arc::new(FnExtractor(
            |_: &[u8], _: &str| -> Result<String, ExtractionError> { panic!("decoder blew up") },
        )));
        let id = h.upload(b"boom", "boom.jpg", "image/jpeg");

        let outcome = run_report_job(&h.ctx, id).await;
        assert_eq!(outcome, JobOutcome::Failed { stage: JobStage::Extract });
        assert_eq!(h.report(id).processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn missing_object_fails_at_fetch() {
        let h = Harness::with_text_extractor();
        let id = h.upload(b"Glucose 95 mg/dL 70-100", "a.txt", "text/plain");
        let locator = h.report(id).storage_locator;
        h.store.delete(&locator).unwrap();

        let outcome = run_report_job(&h.ctx, id).await;
        assert_eq!(outcome, JobOutcome::Failed { stage: JobStage::Fetch });
        assert_eq!(h.report(id).processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn redelivered_job_is_skipped() {
        let h = Harness::with_text_extractor();
        let id = h.upload(b"Glucose 95 mg/dL 70-100", "a.txt", "text/plain");

        let first = run_report_job(&h.ctx, id).await;
        let second = run_report_job(&h.ctx, id).await;
        assert_eq!(first, JobOutcome::Completed { biomarker_count: 1 });
        assert_eq!(second, JobOutcome::Skipped);
        assert_eq!(h.biomarkers(id).len(), 1);
    }

    #[tokio::test]
    async fn unknown_report_is_skipped() {
        let h = Harness::with_text_extractor();
        assert_eq!(run_report_job(&h.ctx, Uuid::new_v4()).await, JobOutcome::Skipped);
    }

    #[tokio::test]
    async fn report_date_applied_to_every_biomarker() {
        let h = Harness::with_text_extractor();
        let text = "Collection Date: 2024-03-01\nGlucose 95 mg/dL 70-100\nHIV: Negative";
        let id = h.upload(text.as_bytes(), "dated.txt", "text/plain");

        run_report_job(&h.ctx, id).await;
        let rows = h.biomarkers(id);
        assert_eq!(rows.len(), 2);
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert!(rows.iter().all(|b| b.test_date == expected));
    }

    #[tokio::test]
    async fn unsupported_mime_fails_report() {
        let h = Harness::with_text_extractor();
        let id = h.upload(b"PK\x03\x04", "archive.zip", "application/zip");

        let outcome = run_report_job(&h.ctx, id).await;
        assert_eq!(outcome, JobOutcome::Failed { stage: JobStage::Extract });
    }

    #[tokio::test]
    async fn scanned_pdf_is_read_by_ocr() {
        let h = Harness::new(Arc::new(DocumentExtractor::new(
            Box::new(MockOcrEngine::new("Glucose 150 mg/dL 70-100", 0.9)),
            Box::new(PdfTextExtractor),
        )));
        let id = h.upload(&make_test_pdf(&[""]), "scan.pdf", "application/pdf");

        let outcome = run_report_job(&h.ctx, id).await;
        assert_eq!(outcome, JobOutcome::Completed { biomarker_count: 1 });
        assert_eq!(
            h.report(id).raw_extracted_text.as_deref(),
            Some("Glucose 150 mg/dL 70-100")
        );
        let rows = h.biomarkers(id);
        assert_eq!(rows[0].test_name, "Glucose");
        assert_eq!(rows[0].value, "150");
    }

    #[tokio::test]
    async fn scanned_pdf_without_ocr_fails_instead_of_completing_empty() {
        let h = Harness::with_text_extractor();
        let id = h.upload(&make_test_pdf(&[""]), "scan.pdf", "application/pdf");

        let outcome = run_report_job(&h.ctx, id).await;
        assert_eq!(outcome, JobOutcome::Failed { stage: JobStage::Extract });
        assert_eq!(h.report(id).processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn claim_retries_until_database_is_reachable() {
        let h = Harness::with_text_extractor();
        let id = h.upload(b"Glucose 95 mg/dL 70-100", "panel.txt", "text/plain");

        let late_dir = h._dir.path().join("late");
        let late_db = late_dir.join("labinsight.db");
        let ctx = JobContext {
            db_path: late_db.clone(),
            ..h.ctx.clone()
        };
        let job = tokio::spawn(async move { run_report_job(&ctx, id).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::create_dir_all(&late_dir).unwrap();
        std::fs::copy(&h.ctx.db_path, &late_db).unwrap();

        let outcome = job.await.unwrap();
        assert_eq!(outcome, JobOutcome::Completed { biomarker_count: 1 });
        let conn = db::open_database(&late_db).unwrap();
        let report = repository::get_lab_report(&conn, &id).unwrap().unwrap();
        assert_eq!(report.processing_status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn claim_failing_on_every_attempt_leaves_report_pending() {
        let h = Harness::with_text_extractor();
        let id = h.upload(b"Glucose 95 mg/dL 70-100", "panel.txt", "text/plain");
        let ctx = JobContext {
            db_path: h._dir.path().join("missing").join("labinsight.db"),
            ..h.ctx.clone()
        };

        let outcome = run_report_job(&ctx, id).await;
        assert_eq!(outcome, JobOutcome::Failed { stage: JobStage::Claim });
        assert_eq!(h.report(id).processing_status, ProcessingStatus::Pending);
    }
}
