//! Dynamic filter/query compilation and paginated listing execution.
//!
//! [`predicate`] owns injection-safe clause assembly, [`filters`] maps the
//! wire-level filter dimension sets onto it, and this module runs the
//! compiled queries with recency ordering and page-window counting.

pub mod filters;
pub mod predicate;

pub use filters::{CompanyFilter, LeadFilter};
pub use predicate::{bind_query_as, bind_query_scalar, BindValue, SqlPredicate};

use crate::models::{Company, PaginatedResponse, PersonLead};
use rocket_db_pools::sqlx::{self, PgPool};

/// Fetch one page of person leads matching a compiled filter, ordered by
/// insertion recency (`id DESC`).
pub async fn fetch_leads(
    pool: &PgPool,
    filter: &LeadFilter,
    page: i64,
    size: i64,
) -> Result<PaginatedResponse<PersonLead>, sqlx::Error> {
    let pred = filter.compile();
    let offset = (page - 1) * size;

    let sql = format!(
        "SELECT * FROM person_leads {} ORDER BY id DESC LIMIT {size} OFFSET {offset}",
        pred.where_sql()
    );
    let rows = bind_query_as(sqlx::query_as::<_, PersonLead>(&sql), pred.binds())
        .fetch_all(pool)
        .await?;

    let total = resolve_total(pool, "person_leads", &pred, offset, size, rows.len()).await?;
    Ok(PaginatedResponse::new(rows, page, size, total))
}

/// Fetch one page of companies matching a compiled filter.
pub async fn fetch_companies(
    pool: &PgPool,
    filter: &CompanyFilter,
    page: i64,
    size: i64,
) -> Result<PaginatedResponse<Company>, sqlx::Error> {
    let pred = filter.compile();
    let offset = (page - 1) * size;

    let sql = format!(
        "SELECT * FROM companies {} ORDER BY id DESC LIMIT {size} OFFSET {offset}",
        pred.where_sql()
    );
    let rows = bind_query_as(sqlx::query_as::<_, Company>(&sql), pred.binds())
        .fetch_all(pool)
        .await?;

    let total = resolve_total(pool, "companies", &pred, offset, size, rows.len()).await?;
    Ok(PaginatedResponse::new(rows, page, size, total))
}

/// A short page signals the true end of the result set, so the count is
/// exact; a full page falls back to the planner's row estimate for
/// responsiveness, clamped so it never contradicts what was fetched.
async fn resolve_total(
    pool: &PgPool,
    table: &str,
    pred: &SqlPredicate,
    offset: i64,
    size: i64,
    fetched: usize,
) -> Result<i64, sqlx::Error> {
    let fetched = fetched as i64;
    if fetched < size {
        return Ok(offset + fetched);
    }

    let estimate = planner_estimate(pool, table, pred).await?;
    Ok(estimate.max(offset + fetched))
}

/// Ask the query planner how many rows the predicate is expected to match.
async fn planner_estimate(
    pool: &PgPool,
    table: &str,
    pred: &SqlPredicate,
) -> Result<i64, sqlx::Error> {
    let sql = format!(
        "EXPLAIN (FORMAT JSON) SELECT id FROM {table} {}",
        pred.where_sql()
    );
    let plan: serde_json::Value =
        bind_query_scalar(sqlx::query_scalar(&sql), pred.binds())
            .fetch_one(pool)
            .await?;

    let rows = plan
        .get(0)
        .and_then(|entry| entry.get("Plan"))
        .and_then(|plan| plan.get("Plan Rows"))
        .and_then(|rows| rows.as_f64())
        .unwrap_or(0.0);

    Ok(rows as i64)
}
