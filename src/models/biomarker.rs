use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One named test result extracted from a LabReport. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biomarker {
    pub id: Uuid,
    pub lab_report_id: Uuid,
    pub test_name: String,
    /// Raw result as printed on the report; not necessarily numeric.
    pub value: String,
    pub unit: Option<String>,
    pub reference_range_low: Option<String>,
    pub reference_range_high: Option<String>,
    pub test_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// 1-based line of the extracted text this row came from.
    pub line_number: u32,
    pub created_at: NaiveDateTime,
}

/// Unpersisted parser output, one per recognised line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateBiomarker {
    pub test_name: String,
    pub value: String,
    pub unit: Option<String>,
    pub reference_low: Option<String>,
    pub reference_high: Option<String>,
    pub line_number: u32,
}

impl CandidateBiomarker {
    /// Materialise the candidate as a Biomarker row owned by `lab_report_id`.
    pub fn into_biomarker(
        self,
        lab_report_id: Uuid,
        test_date: Option<NaiveDate>,
        created_at: NaiveDateTime,
    ) -> Biomarker {
        Biomarker {
            id: Uuid::new_v4(),
            lab_report_id,
            test_name: self.test_name,
            value: self.value,
            unit: self.unit,
            reference_range_low: self.reference_low,
            reference_range_high: self.reference_high,
            test_date,
            notes: None,
            line_number: self.line_number,
            created_at,
        }
    }
}
