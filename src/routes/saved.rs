use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{DataResponse, EntityKind, PaginatedResponse, SavedMark};
use rocket::serde::json::Json;
use rocket::State;
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_SIZE: i64 = 25;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// `lead` or `company`.
    pub entity_type: String,
    pub entity_id: i64,
}

fn parse_kind(value: &str) -> Result<EntityKind, ApiError> {
    EntityKind::from_str(value)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown entity type '{}'", value)))
}

/// Save a lead or company for the caller. Re-saving refreshes the contact
/// flags and the save timestamp.
#[openapi(tag = "Saved")]
#[post("/saved", data = "<request>")]
pub async fn save_mark(
    user: AuthUser,
    pool: &State<PgPool>,
    request: Json<SaveRequest>,
) -> Result<Json<DataResponse<SavedMark>>, ApiError> {
    let kind = parse_kind(&request.entity_type)?;

    // Contact flags are denormalized from the entity row at save time.
    let sql = match kind {
        EntityKind::Lead => {
            "INSERT INTO saved_marks (user_id, entity_id, entity_type, has_email, has_phone)
             SELECT $1, id, 'lead',
                    COALESCE(email, '') <> '',
                    COALESCE(work_phone, '') <> ''
                    OR COALESCE(mobile_phone, '') <> ''
                    OR COALESCE(corporate_phone, '') <> ''
                    OR COALESCE(other_phone, '') <> ''
             FROM person_leads WHERE id = $2
             ON CONFLICT (user_id, entity_id, entity_type) DO UPDATE
             SET has_email = EXCLUDED.has_email,
                 has_phone = EXCLUDED.has_phone,
                 saved_at = NOW()
             RETURNING *"
        }
        EntityKind::Company => {
            "INSERT INTO saved_marks (user_id, entity_id, entity_type, has_email, has_phone)
             SELECT $1, id, 'company', FALSE, COALESCE(phone, '') <> ''
             FROM companies WHERE id = $2
             ON CONFLICT (user_id, entity_id, entity_type) DO UPDATE
             SET has_email = EXCLUDED.has_email,
                 has_phone = EXCLUDED.has_phone,
                 saved_at = NOW()
             RETURNING *"
        }
    };

    let mark: Option<SavedMark> = sqlx::query_as(sql)
        .bind(user.id)
        .bind(request.entity_id)
        .fetch_optional(pool.inner())
        .await?;

    let mark = mark.ok_or_else(|| {
        ApiError::NotFound(format!(
            "{} {} not found",
            kind.as_str(),
            request.entity_id
        ))
    })?;

    Ok(Json(DataResponse { data: mark }))
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct UnsaveResponse {
    pub message: String,
}

/// Remove a saved mark.
#[openapi(tag = "Saved")]
#[delete("/saved/<entity_type>/<entity_id>")]
pub async fn unsave_mark(
    user: AuthUser,
    pool: &State<PgPool>,
    entity_type: String,
    entity_id: i64,
) -> Result<Json<UnsaveResponse>, ApiError> {
    let kind = parse_kind(&entity_type)?;

    let result = sqlx::query(
        "DELETE FROM saved_marks WHERE user_id = $1 AND entity_id = $2 AND entity_type = $3",
    )
    .bind(user.id)
    .bind(entity_id)
    .bind(kind.as_str())
    .execute(pool.inner())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound(format!(
            "no saved {} with id {}",
            kind.as_str(),
            entity_id
        )));
    }

    Ok(Json(UnsaveResponse {
        message: format!("Removed saved {} {}", kind.as_str(), entity_id),
    }))
}

/// List the caller's saved marks of one kind, newest save first.
#[openapi(tag = "Saved")]
#[get("/saved/<entity_type>?<page>&<size>")]
pub async fn list_saved(
    user: AuthUser,
    pool: &State<PgPool>,
    entity_type: String,
    page: Option<i64>,
    size: Option<i64>,
) -> Result<Json<PaginatedResponse<SavedMark>>, ApiError> {
    let kind = parse_kind(&entity_type)?;
    let page = page.unwrap_or(1).max(1);
    let size = size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = (page - 1) * size;

    let marks: Vec<SavedMark> = sqlx::query_as(
        "SELECT * FROM saved_marks
         WHERE user_id = $1 AND entity_type = $2
         ORDER BY saved_at DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(user.id)
    .bind(kind.as_str())
    .bind(size)
    .bind(offset)
    .fetch_all(pool.inner())
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM saved_marks WHERE user_id = $1 AND entity_type = $2",
    )
    .bind(user.id)
    .bind(kind.as_str())
    .fetch_one(pool.inner())
    .await?;

    Ok(Json(PaginatedResponse::new(marks, page, size, total)))
}
