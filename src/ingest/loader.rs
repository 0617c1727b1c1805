//! Staging and conflict-aware merge of upload batches.

use crate::ingest::clean::{copy_int, copy_text, normalize_phone, parse_count, parse_scaled};
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

/// Rows streamed per `COPY` data message. Bounds the in-memory staging
/// buffer; chunk boundaries are not commit points.
const STAGE_CHUNK_ROWS: usize = 500;

/// Mutable person-lead columns in staging order (`seq` excluded).
const LEAD_COLUMNS: &[&str] = &[
    "first_name",
    "last_name",
    "title",
    "company_name",
    "company_id",
    "email",
    "work_phone",
    "mobile_phone",
    "corporate_phone",
    "other_phone",
    "industry",
    "employee_count",
    "annual_revenue",
    "technologies",
    "total_funding",
    "latest_funding",
    "latest_funding_amount",
    "linkedin_url",
    "facebook_url",
    "twitter_url",
    "website",
    "city",
    "state",
    "country",
    "company_address",
    "company_city",
    "company_state",
    "company_country",
    "company_phone",
    "keywords",
    "seo_description",
];

/// Mutable company columns in staging order.
const COMPANY_COLUMNS: &[&str] = &[
    "name",
    "linkedin_url",
    "website",
    "phone",
    "employee_count",
    "industry",
    "address",
    "city",
    "state",
    "country",
    "zip_code",
    "founded_year",
    "total_funding",
    "latest_funding",
    "latest_funding_amount",
];

/// One loosely-typed person-lead row as uploaded. Every field is optional;
/// numeric-looking fields arrive as text and go through the cleaners.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IncomingLead {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub company_id: Option<i64>,
    pub email: Option<String>,
    pub work_phone: Option<String>,
    pub mobile_phone: Option<String>,
    pub corporate_phone: Option<String>,
    pub other_phone: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<String>,
    pub annual_revenue: Option<String>,
    pub technologies: Option<String>,
    pub total_funding: Option<String>,
    pub latest_funding: Option<String>,
    pub latest_funding_amount: Option<String>,
    pub linkedin_url: Option<String>,
    pub facebook_url: Option<String>,
    pub twitter_url: Option<String>,
    pub website: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub company_address: Option<String>,
    pub company_city: Option<String>,
    pub company_state: Option<String>,
    pub company_country: Option<String>,
    pub company_phone: Option<String>,
    pub keywords: Option<String>,
    pub seo_description: Option<String>,
}

/// One loosely-typed company row as uploaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct IncomingCompany {
    pub name: Option<String>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub employee_count: Option<String>,
    pub industry: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub founded_year: Option<String>,
    pub total_funding: Option<String>,
    pub latest_funding: Option<String>,
    pub latest_funding_amount: Option<String>,
}

impl IncomingLead {
    /// Render one tab-delimited `COPY` line, `seq` first.
    fn copy_line(&self, seq: usize) -> String {
        let columns = [
            seq.to_string(),
            copy_text(self.first_name.as_deref()),
            copy_text(self.last_name.as_deref()),
            copy_text(self.title.as_deref()),
            copy_text(self.company_name.as_deref()),
            copy_int(self.company_id),
            copy_text(self.email.as_deref()),
            copy_text(normalize_phone(self.work_phone.as_deref()).as_deref()),
            copy_text(normalize_phone(self.mobile_phone.as_deref()).as_deref()),
            copy_text(normalize_phone(self.corporate_phone.as_deref()).as_deref()),
            copy_text(normalize_phone(self.other_phone.as_deref()).as_deref()),
            copy_text(self.industry.as_deref()),
            copy_int(parse_count(self.employee_count.as_deref())),
            copy_int(parse_scaled(self.annual_revenue.as_deref())),
            copy_text(self.technologies.as_deref()),
            copy_int(parse_scaled(self.total_funding.as_deref())),
            copy_text(self.latest_funding.as_deref()),
            copy_int(parse_scaled(self.latest_funding_amount.as_deref())),
            copy_text(self.linkedin_url.as_deref()),
            copy_text(self.facebook_url.as_deref()),
            copy_text(self.twitter_url.as_deref()),
            copy_text(self.website.as_deref()),
            copy_text(self.city.as_deref()),
            copy_text(self.state.as_deref()),
            copy_text(self.country.as_deref()),
            copy_text(self.company_address.as_deref()),
            copy_text(self.company_city.as_deref()),
            copy_text(self.company_state.as_deref()),
            copy_text(self.company_country.as_deref()),
            copy_text(normalize_phone(self.company_phone.as_deref()).as_deref()),
            copy_text(self.keywords.as_deref()),
            copy_text(self.seo_description.as_deref()),
        ];
        columns.join("\t")
    }
}

impl IncomingCompany {
    fn copy_line(&self, seq: usize) -> String {
        let columns = [
            seq.to_string(),
            copy_text(self.name.as_deref()),
            copy_text(self.linkedin_url.as_deref()),
            copy_text(self.website.as_deref()),
            copy_text(normalize_phone(self.phone.as_deref()).as_deref()),
            copy_int(parse_count(self.employee_count.as_deref())),
            copy_text(self.industry.as_deref()),
            copy_text(self.address.as_deref()),
            copy_text(self.city.as_deref()),
            copy_text(self.state.as_deref()),
            copy_text(self.country.as_deref()),
            copy_text(self.zip_code.as_deref()),
            copy_int(parse_count(self.founded_year.as_deref())),
            copy_int(parse_scaled(self.total_funding.as_deref())),
            copy_text(self.latest_funding.as_deref()),
            copy_int(parse_scaled(self.latest_funding_amount.as_deref())),
        ];
        columns.join("\t")
    }
}

/// Merges upload batches into the canonical tables.
pub struct BulkLoader {
    pool: PgPool,
}

impl BulkLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stage and merge a batch of person leads, returning the number of rows
    /// the merge passes touched. The whole batch commits or rolls back as one.
    pub async fn load_leads(&self, rows: &[IncomingLead]) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "CREATE TEMP TABLE stage_person_leads (
                seq INTEGER,
                first_name TEXT, last_name TEXT, title TEXT, company_name TEXT,
                company_id BIGINT, email TEXT,
                work_phone TEXT, mobile_phone TEXT, corporate_phone TEXT, other_phone TEXT,
                industry TEXT, employee_count BIGINT, annual_revenue BIGINT,
                technologies TEXT, total_funding BIGINT, latest_funding TEXT,
                latest_funding_amount BIGINT,
                linkedin_url TEXT, facebook_url TEXT, twitter_url TEXT, website TEXT,
                city TEXT, state TEXT, country TEXT,
                company_address TEXT, company_city TEXT, company_state TEXT,
                company_country TEXT, company_phone TEXT,
                keywords TEXT, seo_description TEXT
            ) ON COMMIT DROP",
        )
        .execute(&mut *tx)
        .await?;

        let copy_stmt = format!(
            "COPY stage_person_leads (seq, {}) FROM STDIN",
            LEAD_COLUMNS.join(", ")
        );
        let mut copy = tx.copy_in_raw(&copy_stmt).await?;
        for (chunk_index, chunk) in rows.chunks(STAGE_CHUNK_ROWS).enumerate() {
            let mut buffer = String::new();
            for (offset, row) in chunk.iter().enumerate() {
                buffer.push_str(&row.copy_line(chunk_index * STAGE_CHUNK_ROWS + offset));
                buffer.push('\n');
            }
            copy.send(buffer.into_bytes()).await?;
        }
        let staged = copy.finish().await?;
        log::debug!("staged {} person lead rows", staged);

        // The keyed merge pass only ever probes the dedup key.
        sqlx::query("CREATE INDEX ON stage_person_leads (linkedin_url)")
            .execute(&mut *tx)
            .await?;

        let columns = LEAD_COLUMNS.join(", ");
        let overwrites = overwrite_assignments(LEAD_COLUMNS);

        // Keyed rows: in-batch last-wins, then full-overwrite upsert.
        let keyed = sqlx::query(&format!(
            "INSERT INTO person_leads ({columns}, created_at, updated_at)
             SELECT DISTINCT ON (linkedin_url) {columns}, NOW(), NOW()
             FROM stage_person_leads
             WHERE linkedin_url IS NOT NULL
             ORDER BY linkedin_url, seq DESC
             ON CONFLICT (linkedin_url) WHERE linkedin_url IS NOT NULL
             DO UPDATE SET {overwrites}, updated_at = NOW()"
        ))
        .execute(&mut *tx)
        .await?;

        // Unkeyed person rows are not deduplicated against peers.
        let unkeyed = sqlx::query(&format!(
            "INSERT INTO person_leads ({columns}, created_at, updated_at)
             SELECT {columns}, NOW(), NOW()
             FROM stage_person_leads
             WHERE linkedin_url IS NULL"
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let merged = keyed.rows_affected() + unkeyed.rows_affected();
        log::info!(
            "merged {} person leads ({} keyed, {} unkeyed)",
            merged,
            keyed.rows_affected(),
            unkeyed.rows_affected()
        );
        Ok(merged)
    }

    /// Stage and merge a batch of companies. Keyed rows upsert on the network
    /// URL; unkeyed rows fall back to first-writer-wins on `(name, address)`.
    pub async fn load_companies(&self, rows: &[IncomingCompany]) -> Result<u64, sqlx::Error> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "CREATE TEMP TABLE stage_companies (
                seq INTEGER,
                name TEXT, linkedin_url TEXT, website TEXT, phone TEXT,
                employee_count BIGINT, industry TEXT,
                address TEXT, city TEXT, state TEXT, country TEXT, zip_code TEXT,
                founded_year INTEGER, total_funding BIGINT,
                latest_funding TEXT, latest_funding_amount BIGINT
            ) ON COMMIT DROP",
        )
        .execute(&mut *tx)
        .await?;

        let copy_stmt = format!(
            "COPY stage_companies (seq, {}) FROM STDIN",
            COMPANY_COLUMNS.join(", ")
        );
        let mut copy = tx.copy_in_raw(&copy_stmt).await?;
        for (chunk_index, chunk) in rows.chunks(STAGE_CHUNK_ROWS).enumerate() {
            let mut buffer = String::new();
            for (offset, row) in chunk.iter().enumerate() {
                buffer.push_str(&row.copy_line(chunk_index * STAGE_CHUNK_ROWS + offset));
                buffer.push('\n');
            }
            copy.send(buffer.into_bytes()).await?;
        }
        let staged = copy.finish().await?;
        log::debug!("staged {} company rows", staged);

        // Both merge keys are probed for companies.
        sqlx::query("CREATE INDEX ON stage_companies (linkedin_url)")
            .execute(&mut *tx)
            .await?;
        sqlx::query("CREATE INDEX ON stage_companies (name, address)")
            .execute(&mut *tx)
            .await?;

        let columns = COMPANY_COLUMNS.join(", ");
        let overwrites = overwrite_assignments(COMPANY_COLUMNS);

        let keyed = sqlx::query(&format!(
            "INSERT INTO companies ({columns}, created_at, updated_at)
             SELECT DISTINCT ON (linkedin_url) {columns}, NOW(), NOW()
             FROM stage_companies
             WHERE linkedin_url IS NOT NULL
             ORDER BY linkedin_url, seq DESC
             ON CONFLICT (linkedin_url) WHERE linkedin_url IS NOT NULL
             DO UPDATE SET {overwrites}, updated_at = NOW()"
        ))
        .execute(&mut *tx)
        .await?;

        // Unkeyed rows: in-batch first-wins on (name, address), then insert
        // only when no canonical row already claims the pair. No overwrite, so
        // a record that later acquires a dedup key is never clobbered.
        let unkeyed = sqlx::query(&format!(
            "INSERT INTO companies ({columns}, created_at, updated_at)
             SELECT {columns}, NOW(), NOW()
             FROM (
                 SELECT DISTINCT ON (COALESCE(name, ''), COALESCE(address, '')) *
                 FROM stage_companies
                 WHERE linkedin_url IS NULL
                 ORDER BY COALESCE(name, ''), COALESCE(address, ''), seq ASC
             ) s
             WHERE NOT EXISTS (
                 SELECT 1 FROM companies c
                 WHERE COALESCE(c.name, '') = COALESCE(s.name, '')
                   AND COALESCE(c.address, '') = COALESCE(s.address, '')
             )"
        ))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let merged = keyed.rows_affected() + unkeyed.rows_affected();
        log::info!(
            "merged {} companies ({} keyed, {} unkeyed)",
            merged,
            keyed.rows_affected(),
            unkeyed.rows_affected()
        );
        Ok(merged)
    }

    /// Explicit bulk delete, cascading to saved marks.
    pub async fn delete_leads(&self, ids: &[i64]) -> Result<u64, sqlx::Error> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM saved_marks WHERE entity_type = 'lead' AND entity_id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM person_leads WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted.rows_affected())
    }
}

/// `col = EXCLUDED.col` assignments for the overwrite-on-conflict pass.
fn overwrite_assignments(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
