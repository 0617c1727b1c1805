//! Resolves a filter or a saved set into an ordered id list.
//!
//! Three modes: a user's saved marks (most recently saved first), a fresh
//! compiled filter (most recent first), and a fresh filter with a
//! per-company cap where rows are ranked within each company before the
//! global recency cut. Leads without a company form singleton partitions, so
//! the cap never collapses unaffiliated leads together.

use crate::error::ApiError;
use crate::models::EntityKind;
use crate::query::{bind_query_scalar, LeadFilter};
use rocket_db_pools::sqlx::{self, PgPool};

/// Ceiling on the number of ids a single selection may return.
pub const MAX_SELECTION: i64 = 10_000;

fn clamp_count(count: i64) -> i64 {
    count.clamp(1, MAX_SELECTION)
}

/// Most recently saved entity ids for a user, newest save first. Fails with
/// not-found when the user has no saved entities of this kind.
pub async fn select_saved(
    pool: &PgPool,
    user_id: i32,
    kind: EntityKind,
    count: i64,
) -> Result<Vec<i64>, ApiError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        "SELECT entity_id FROM saved_marks
         WHERE user_id = $1 AND entity_type = $2
         ORDER BY saved_at DESC
         LIMIT $3",
    )
    .bind(user_id)
    .bind(kind.as_str())
    .bind(clamp_count(count))
    .fetch_all(pool)
    .await?;

    if ids.is_empty() {
        return Err(ApiError::NotFound(format!(
            "no saved {} entities",
            kind.as_str()
        )));
    }

    Ok(ids)
}

/// Lead ids matching a compiled filter, most recent first, optionally capped
/// to at most `per_company_cap` ids per company.
pub async fn select_leads(
    pool: &PgPool,
    filter: &LeadFilter,
    count: i64,
    per_company_cap: Option<i64>,
) -> Result<Vec<i64>, ApiError> {
    let pred = filter.compile();
    let count = clamp_count(count);

    let sql = match per_company_cap {
        Some(cap) if cap > 0 => format!(
            "SELECT id FROM (
                 SELECT id,
                        ROW_NUMBER() OVER (
                            PARTITION BY COALESCE(company_id, -id)
                            ORDER BY id DESC
                        ) AS company_rank
                 FROM person_leads {}
             ) ranked
             WHERE company_rank <= {cap}
             ORDER BY id DESC
             LIMIT {count}",
            pred.where_sql()
        ),
        _ => format!(
            "SELECT id FROM person_leads {} ORDER BY id DESC LIMIT {count}",
            pred.where_sql()
        ),
    };

    let ids = bind_query_scalar(sqlx::query_scalar(&sql), pred.binds())
        .fetch_all(pool)
        .await?;

    Ok(ids)
}
