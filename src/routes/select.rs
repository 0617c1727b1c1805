use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::EntityKind;
use crate::query::LeadFilter;
use crate::select::{select_leads, select_saved};
use rocket::serde::json::Json;
use rocket::State;
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

const DEFAULT_SELECTION: i64 = 100;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadSelectRequest {
    /// Filter for fresh selection; ignored when `useSaved` is set.
    pub filter: LeadFilter,
    /// Maximum number of ids to return.
    pub count: Option<i64>,
    /// Keep at most this many leads per company.
    pub per_company_contacts: Option<i64>,
    /// Reuse the caller's saved leads instead of running a fresh filter.
    pub use_saved: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SelectResponse {
    pub ids: Vec<i64>,
    pub count: usize,
}

/// Resolve a filter or the caller's saved set into an ordered lead id list,
/// most recent first, optionally capped per company.
#[openapi(tag = "Selection")]
#[post("/leads/select", data = "<request>")]
pub async fn select_lead_ids(
    user: AuthUser,
    pool: &State<PgPool>,
    request: Json<LeadSelectRequest>,
) -> Result<Json<SelectResponse>, ApiError> {
    let request = request.into_inner();
    let count = request.count.unwrap_or(DEFAULT_SELECTION);
    if count <= 0 {
        return Err(ApiError::BadRequest("count must be positive".to_string()));
    }

    let ids = if request.use_saved {
        select_saved(pool.inner(), user.id, EntityKind::Lead, count).await?
    } else {
        select_leads(
            pool.inner(),
            &request.filter,
            count,
            request.per_company_contacts,
        )
        .await?
    };

    let count = ids.len();
    Ok(Json(SelectResponse { ids, count }))
}
