use crate::auth::RequireAdmin;
use crate::error::ApiError;
use crate::ingest::{BulkLoader, IncomingCompany, IncomingLead};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LeadBulkRequest {
    pub rows: Vec<IncomingLead>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CompanyBulkRequest {
    pub rows: Vec<IncomingCompany>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct BulkResponse {
    pub message: String,
    pub merged: u64,
}

/// Bulk-ingest person leads. The whole batch merges atomically; re-submitting
/// the same batch is safe because keyed rows upsert idempotently.
#[openapi(tag = "Ingest")]
#[post("/leads/bulk", data = "<request>")]
pub async fn bulk_ingest_leads(
    _admin: RequireAdmin,
    loader: &State<BulkLoader>,
    request: Json<LeadBulkRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    if request.rows.is_empty() {
        return Err(ApiError::BadRequest("rows must not be empty".to_string()));
    }

    let merged = loader.load_leads(&request.rows).await?;
    Ok(Json(BulkResponse {
        message: format!("Merged {} person leads", merged),
        merged,
    }))
}

/// Bulk-ingest companies.
#[openapi(tag = "Ingest")]
#[post("/companies/bulk", data = "<request>")]
pub async fn bulk_ingest_companies(
    _admin: RequireAdmin,
    loader: &State<BulkLoader>,
    request: Json<CompanyBulkRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    if request.rows.is_empty() {
        return Err(ApiError::BadRequest("rows must not be empty".to_string()));
    }

    let merged = loader.load_companies(&request.rows).await?;
    Ok(Json(BulkResponse {
        message: format!("Merged {} companies", merged),
        merged,
    }))
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct DeleteResponse {
    pub message: String,
    pub deleted: u64,
}

/// Explicit bulk delete of person leads, cascading to saved marks.
#[openapi(tag = "Ingest")]
#[post("/leads/delete", data = "<request>")]
pub async fn bulk_delete_leads(
    _admin: RequireAdmin,
    loader: &State<BulkLoader>,
    request: Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    if request.ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".to_string()));
    }

    let deleted = loader.delete_leads(&request.ids).await?;
    if deleted == 0 {
        return Err(ApiError::NotFound(
            "no person leads matched the given ids".to_string(),
        ));
    }

    Ok(Json(DeleteResponse {
        message: format!("Deleted {} person leads", deleted),
        deleted,
    }))
}
