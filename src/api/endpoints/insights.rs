//! Insight endpoints.
//!
//! `GET /api/insights/summary`, `GET /api/reports/:id/insights`,
//! `GET /api/biomarkers/trend?test_name=&from=&to=`.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{parse_report_id, ApiContext};
use crate::insights;
use crate::models::{Caller, Insight, InsightSummary, TrendPoint};

#[derive(Deserialize)]
pub struct TrendQuery {
    pub test_name: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Serialize)]
pub struct TrendResponse {
    pub test_name: String,
    pub points: Vec<TrendPoint>,
}

/// `GET /api/insights/summary`: latest completed report, prioritized.
pub async fn summary(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<InsightSummary>, ApiError> {
    Ok(Json(insights::get_insights_summary(&ctx.core, &caller)?))
}

/// `GET /api/reports/:id/insights`
pub async fn for_report(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Insight>>, ApiError> {
    let id = parse_report_id(&id)?;
    Ok(Json(insights::get_insights_for_report(&ctx.core, &caller, &id)?))
}

/// `GET /api/biomarkers/trend`
pub async fn trend(
    State(ctx): State<ApiContext>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<TrendResponse>, ApiError> {
    let test_name = query.test_name.unwrap_or_default();
    let points = insights::get_biomarker_trend(
        &ctx.core,
        &caller,
        &test_name,
        query.from.as_deref(),
        query.to.as_deref(),
    )?;
    Ok(Json(TrendResponse {
        test_name: test_name.trim().to_string(),
        points,
    }))
}
