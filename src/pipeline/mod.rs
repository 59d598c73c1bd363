pub mod error;
pub mod extraction;
pub mod job;
pub mod parser;
pub mod queue;

pub use error::{JobStage, PipelineError};
pub use job::{run_report_job, JobContext, JobOutcome};
pub use queue::{recover_reports, JobQueue, QueueError, RecoverySummary, ReportJob, WorkerPool};
