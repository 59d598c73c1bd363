pub mod enums;
pub mod lab_report;
pub mod biomarker;
pub mod insight;
pub mod result_terms;

pub use lab_report::*;
pub use biomarker::*;
pub use insight::*;
