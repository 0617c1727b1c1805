//! The atomic export unit of work.

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::export::artifact::write_csv;
use crate::export::mailer::Mailer;
use crate::export::storage::ObjectStore;
use crate::models::Exportable;
use crate::query::{bind_query_as, SqlPredicate};
use rocket_db_pools::sqlx::{self, postgres::PgRow, FromRow, PgPool};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Tunables for the export engine.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Default bound on a filtered result set.
    pub row_cap: i64,
    /// Hard ceiling for explicitly requested limits.
    pub max_row_cap: i64,
    /// Result sets at or below this size are returned inline; larger sets go
    /// out by e-mail.
    pub inline_threshold: usize,
    /// Object-storage destination prefix for artifacts.
    pub destination: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            row_cap: 1_000,
            max_row_cap: 10_000,
            inline_threshold: 500,
            destination: "exports".to_string(),
        }
    }
}

impl ExportConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let env_i64 = |key: &str, fallback: i64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(fallback)
        };

        Self {
            row_cap: env_i64("LEADSTORE_EXPORT_ROW_CAP", defaults.row_cap),
            max_row_cap: env_i64("LEADSTORE_EXPORT_MAX_ROW_CAP", defaults.max_row_cap),
            inline_threshold: env_i64(
                "LEADSTORE_EXPORT_INLINE_THRESHOLD",
                defaults.inline_threshold as i64,
            ) as usize,
            destination: std::env::var("LEADSTORE_EXPORT_DESTINATION")
                .unwrap_or(defaults.destination),
        }
    }
}

/// How an export was delivered.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase", tag = "delivery")]
pub enum ExportOutcome {
    /// The artifact body, returned synchronously.
    Inline {
        file_name: String,
        content: String,
        row_count: usize,
        remaining_credits: i64,
    },
    /// The artifact went out by e-mail; the caller gets a confirmation.
    Emailed {
        message: String,
        row_count: usize,
        remaining_credits: i64,
    },
}

/// Runs exports as one transaction: row resolution, credit deduction,
/// saved-mark upsert, artifact persistence, audit record, then the delivery
/// branch.
pub struct ExportEngine {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
    mailer: Arc<dyn Mailer>,
    config: ExportConfig,
}

impl ExportEngine {
    pub fn new(
        pool: PgPool,
        store: Arc<dyn ObjectStore>,
        mailer: Arc<dyn Mailer>,
        config: ExportConfig,
    ) -> Self {
        Self {
            pool,
            store,
            mailer,
            config,
        }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Export rows matching a compiled predicate, or an explicit id list
    /// which bypasses filtering entirely.
    pub async fn export<T>(
        &self,
        user: &AuthUser,
        pred: &SqlPredicate,
        ids: &[i64],
        limit: Option<i64>,
        filters: serde_json::Value,
    ) -> Result<ExportOutcome, ApiError>
    where
        T: Exportable + for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let cap = limit
            .unwrap_or(self.config.row_cap)
            .clamp(1, self.config.max_row_cap);

        let mut tx = self.pool.begin().await?;

        // 1. Resolve the row set inside the transaction.
        let table = T::KIND.table();
        let rows: Vec<T> = if ids.is_empty() {
            let sql = format!(
                "SELECT * FROM {table} {} ORDER BY id DESC LIMIT {cap}",
                pred.where_sql()
            );
            bind_query_as(sqlx::query_as::<_, T>(&sql), pred.binds())
                .fetch_all(&mut *tx)
                .await?
        } else {
            let sql =
                format!("SELECT * FROM {table} WHERE id = ANY($1) ORDER BY id DESC LIMIT {cap}");
            sqlx::query_as::<_, T>(&sql)
                .bind(ids)
                .fetch_all(&mut *tx)
                .await?
        };

        // 2. Empty result: abort with no side effects.
        if rows.is_empty() {
            return Err(ApiError::NotFound(format!(
                "no matching {} records",
                T::KIND.as_str()
            )));
        }

        // 3. One credit per row, all-or-nothing; administrators are exempt.
        let cost = rows.len() as i32;
        let remaining_credits = if user.is_admin() {
            i64::from(user.credits)
        } else {
            let remaining: Option<i32> = sqlx::query_scalar(
                "UPDATE users SET credits = credits - $1
                 WHERE id = $2 AND credits >= $1
                 RETURNING credits",
            )
            .bind(cost)
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?;

            match remaining {
                Some(balance) => i64::from(balance),
                None => {
                    return Err(ApiError::Conflict(format!(
                        "insufficient credits: export needs {cost}"
                    )));
                }
            }
        };

        // 4. Refresh the user's saved marks for every exported row.
        let entity_ids: Vec<i64> = rows.iter().map(Exportable::entity_id).collect();
        let has_email: Vec<bool> = rows.iter().map(Exportable::has_email).collect();
        let has_phone: Vec<bool> = rows.iter().map(Exportable::has_phone).collect();

        sqlx::query(
            "INSERT INTO saved_marks (user_id, entity_id, entity_type, has_email, has_phone)
             SELECT $1, t.entity_id, $2, t.has_email, t.has_phone
             FROM UNNEST($3::bigint[], $4::bool[], $5::bool[]) AS t(entity_id, has_email, has_phone)
             ON CONFLICT (user_id, entity_id, entity_type) DO UPDATE
             SET has_email = EXCLUDED.has_email,
                 has_phone = EXCLUDED.has_phone,
                 saved_at = NOW()",
        )
        .bind(user.id)
        .bind(T::KIND.as_str())
        .bind(&entity_ids)
        .bind(&has_email)
        .bind(&has_phone)
        .execute(&mut *tx)
        .await?;

        // 5. Render the artifact.
        let values: Vec<Vec<String>> = rows.iter().map(Exportable::export_values).collect();
        let csv = write_csv(T::export_header(), &values);
        let file_name = format!("{}-export-{}.csv", T::KIND.as_str(), Uuid::new_v4());

        // 6. Persist the artifact, then the audit record. Storage failure
        // rolls the whole unit back.
        let file_url = self
            .store
            .store(csv.clone().into_bytes(), &file_name, &self.config.destination)
            .await
            .map_err(|e| ApiError::Integration(format!("artifact storage failed: {e}")))?;

        sqlx::query(
            "INSERT INTO export_records (user_id, entity_type, row_count, file_name, file_url, filters)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user.id)
        .bind(T::KIND.as_str())
        .bind(rows.len() as i64)
        .bind(&file_name)
        .bind(&file_url)
        .bind(&filters)
        .execute(&mut *tx)
        .await?;

        // 7. Delivery branch.
        let row_count = rows.len();
        tx.commit().await?;

        log::info!(
            "user {} exported {} {} rows ({})",
            user.id,
            row_count,
            T::KIND.as_str(),
            file_name
        );

        if row_count <= self.config.inline_threshold {
            Ok(ExportOutcome::Inline {
                file_name,
                content: csv,
                row_count,
                remaining_credits,
            })
        } else {
            // Committed already; a mail failure here is surfaced but the
            // credits and audit record stand (see DESIGN.md).
            let subject = format!("Your {} export is ready", T::KIND.as_str());
            let body = format!(
                "Your export of {row_count} records is ready for download: {file_url}"
            );
            self.mailer
                .send(&user.email, &subject, &body, None)
                .await
                .map_err(|e| ApiError::Integration(format!("export mail dispatch failed: {e}")))?;

            Ok(ExportOutcome::Emailed {
                message: format!("Export of {row_count} records sent to {}", user.email),
                row_count,
                remaining_credits,
            })
        }
    }
}
