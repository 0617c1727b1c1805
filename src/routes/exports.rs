use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::export::{ExportEngine, ExportOutcome};
use crate::models::{Company, ExportRecord, PaginatedResponse, PersonLead};
use crate::query::{CompanyFilter, LeadFilter};
use rocket::serde::json::Json;
use rocket::State;
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: i64 = 25;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadExportRequest {
    /// Filter compiled into the export query; ignored when `ids` is set.
    pub filter: LeadFilter,
    /// Explicit ids to export, bypassing the filter entirely.
    pub ids: Vec<i64>,
    /// Optional row limit, clamped to the configured ceiling.
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyExportRequest {
    pub filter: CompanyFilter,
    pub ids: Vec<i64>,
    pub limit: Option<i64>,
}

fn filters_json<T: serde::Serialize>(filter: &T) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(filter)
        .map_err(|e| ApiError::Internal(format!("failed to serialize filter audit: {}", e)))
}

/// Export person leads matching a filter or id list. Costs one credit per
/// row for non-admin users; small results come back inline, large ones are
/// delivered by e-mail.
#[openapi(tag = "Exports")]
#[post("/leads/export", data = "<request>")]
pub async fn export_leads(
    user: AuthUser,
    engine: &State<ExportEngine>,
    request: Json<LeadExportRequest>,
) -> Result<Json<ExportOutcome>, ApiError> {
    let request = request.into_inner();
    let filters = filters_json(&request.filter)?;
    let pred = request.filter.compile();

    let outcome = engine
        .export::<PersonLead>(&user, &pred, &request.ids, request.limit, filters)
        .await?;
    Ok(Json(outcome))
}

/// Export companies matching a filter or id list.
#[openapi(tag = "Exports")]
#[post("/companies/export", data = "<request>")]
pub async fn export_companies(
    user: AuthUser,
    engine: &State<ExportEngine>,
    request: Json<CompanyExportRequest>,
) -> Result<Json<ExportOutcome>, ApiError> {
    let request = request.into_inner();
    let filters = filters_json(&request.filter)?;
    let pred = request.filter.compile();

    let outcome = engine
        .export::<Company>(&user, &pred, &request.ids, request.limit, filters)
        .await?;
    Ok(Json(outcome))
}

/// The caller's export history, newest first. Audit entries are append-only;
/// this is the read side.
#[openapi(tag = "Exports")]
#[get("/exports?<page>&<size>")]
pub async fn list_export_records(
    user: AuthUser,
    pool: &State<PgPool>,
    page: Option<i64>,
    size: Option<i64>,
) -> Result<Json<PaginatedResponse<ExportRecord>>, ApiError> {
    let page = page.unwrap_or(1).max(1);
    let size = size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * size;

    let records: Vec<ExportRecord> = sqlx::query_as(
        "SELECT * FROM export_records
         WHERE user_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(user.id)
    .bind(size)
    .bind(offset)
    .fetch_all(pool.inner())
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM export_records WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(pool.inner())
        .await?;

    Ok(Json(PaginatedResponse::new(records, page, size, total)))
}
