use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Company, PaginatedResponse, PersonLead};
use crate::query::{fetch_companies, fetch_leads, CompanyFilter, LeadFilter};
use rocket::serde::json::Json;
use rocket::State;
use rocket_db_pools::sqlx::PgPool;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: i64 = 25;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadQueryRequest {
    pub filter: LeadFilter,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyQueryRequest {
    pub filter: CompanyFilter,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

fn page_window(page: Option<i64>, size: Option<i64>) -> (i64, i64) {
    (
        page.unwrap_or(1).max(1),
        size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    )
}

/// Filtered, paginated person-lead listing. `total` is exact when the page is
/// short and a planner estimate otherwise.
#[openapi(tag = "Listings")]
#[post("/leads/query", data = "<request>")]
pub async fn query_leads(
    _user: AuthUser,
    pool: &State<PgPool>,
    request: Json<LeadQueryRequest>,
) -> Result<Json<PaginatedResponse<PersonLead>>, ApiError> {
    let (page, size) = page_window(request.page, request.size);
    let response = fetch_leads(pool.inner(), &request.filter, page, size).await?;
    Ok(Json(response))
}

/// Filtered, paginated company listing.
#[openapi(tag = "Listings")]
#[post("/companies/query", data = "<request>")]
pub async fn query_companies(
    _user: AuthUser,
    pool: &State<PgPool>,
    request: Json<CompanyQueryRequest>,
) -> Result<Json<PaginatedResponse<Company>>, ApiError> {
    let (page, size) = page_window(request.page, request.size);
    let response = fetch_companies(pool.inner(), &request.filter, page, size).await?;
    Ok(Json(response))
}
