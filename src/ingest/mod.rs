//! Spreadsheet ingestion
//!
//! An upload flows through four stages: [`table`] decodes the file,
//! [`headers`] binds its columns to canonical fields, [`transform`] turns rows
//! into records and [`upsert`] writes them with a keyed upsert while keeping
//! the user directory in step.

pub mod headers;
pub mod table;
pub mod transform;
pub mod upsert;

use crate::error::{DashboardError, DashboardResult};
use crate::observability::metrics::metrics;
use crate::store::DocumentStore;
use chrono::{DateTime, Utc};
use headers::{validate_headers, CanonicalField};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use table::{decode, FileFormat};
use tracing::{info, warn};
use transform::{transform_rows, DbmResolver, RejectedRow, TransformContext};
use upsert::{write_records, UpsertReport};

/// An uploaded file plus the form fields that accompany it
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
    pub branch: String,
}

/// Settings applied to every upload
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub drive_name: String,
    pub default_fiscal_year: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub total_rows_in_file: usize,
    pub successful_rows: usize,
    pub rejected_rows: usize,
    pub success_rate: String,
    pub timestamp: DateTime<Utc>,
}

/// Report returned to the uploader
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub success: bool,
    pub message: String,
    pub file_name: String,
    pub branch: String,
    pub summary: UploadSummary,
    pub rejected_rows: Option<Vec<RejectedRow>>,
    pub required_headers: Vec<String>,
    pub header_mapping: BTreeMap<String, String>,
    pub upsert: UpsertReport,
}

/// Decode, validate, transform and write one upload
pub async fn process_upload(
    store: &dyn DocumentStore,
    request: UploadRequest,
    settings: &UploadSettings,
) -> DashboardResult<UploadReport> {
    let started = Instant::now();
    metrics().upload_received();

    let result = run_pipeline(store, request, settings).await;
    match &result {
        Ok(report) => metrics().upload_succeeded(
            report.summary.successful_rows,
            report.summary.rejected_rows,
            report.upsert.inserted,
            report.upsert.updated,
            started.elapsed(),
        ),
        Err(e) => {
            warn!(error = %e, "Upload failed");
            metrics().upload_failed();
        }
    }
    result
}

async fn run_pipeline(
    store: &dyn DocumentStore,
    request: UploadRequest,
    settings: &UploadSettings,
) -> DashboardResult<UploadReport> {
    let branch = request.branch.trim();
    if branch.is_empty() {
        return Err(DashboardError::invalid_input("Branch name not provided"));
    }

    info!(
        file = %request.file_name,
        size = request.bytes.len(),
        mime = request.mime.as_deref().unwrap_or("unknown"),
        branch,
        "Upload received"
    );

    let format = FileFormat::detect(&request.file_name, request.mime.as_deref())
        .map_err(|e| DashboardError::invalid_input(e.to_string()))?;
    let table = decode(&request.bytes, format).map_err(|e| DashboardError::decode(e.to_string()))?;

    let validation = validate_headers(&table.headers);
    if !validation.is_valid() {
        warn!(errors = ?validation.errors, "Header validation failed");
        return Err(DashboardError::InvalidHeaders {
            required: CanonicalField::required_labels(),
            missing: validation.missing_labels(),
            errors: validation.errors,
        });
    }

    let users = store.users().await?;
    let resolver = DbmResolver::from_users(&users, branch);
    let uploaded_at = Utc::now();
    let ctx = TransformContext {
        branch,
        drive: &settings.drive_name,
        default_fy: &settings.default_fiscal_year,
        uploaded_at,
        dbm_resolver: &resolver,
    };
    let outcome = transform_rows(&table, &validation, &ctx);
    info!(
        valid = outcome.summary.success_count,
        rejected = outcome.summary.rejected_count,
        "Rows transformed"
    );

    if outcome.records.is_empty() {
        return Err(DashboardError::NoValidRows {
            rejected: outcome.rejected,
            summary: outcome.summary,
        });
    }

    let accepted = outcome.records.len();
    let upsert = write_records(store, outcome.records, branch).await?;

    Ok(UploadReport {
        success: true,
        message: format!("Successfully uploaded {accepted} records to {branch}"),
        file_name: request.file_name.clone(),
        branch: branch.to_string(),
        summary: UploadSummary {
            total_rows_in_file: table.rows.len(),
            successful_rows: accepted,
            rejected_rows: outcome.rejected.len(),
            success_rate: outcome.summary.success_rate,
            timestamp: uploaded_at,
        },
        rejected_rows: (!outcome.rejected.is_empty()).then_some(outcome.rejected),
        required_headers: CanonicalField::required_labels(),
        header_mapping: validation.header_mapping(),
        upsert,
    })
}
