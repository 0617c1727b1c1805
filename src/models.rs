use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

// ===== Entity kinds =====

/// The two canonical entity tables. Serialized as `lead` / `company` on the
/// wire and stored verbatim in `saved_marks.entity_type` and
/// `export_records.entity_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Lead,
    Company,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Lead => "lead",
            EntityKind::Company => "company",
        }
    }

    /// Canonical table backing this entity kind.
    pub fn table(self) -> &'static str {
        match self {
            EntityKind::Lead => "person_leads",
            EntityKind::Company => "companies",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "lead" => Some(EntityKind::Lead),
            "company" => Some(EntityKind::Company),
            _ => None,
        }
    }
}

// ===== Canonical store models =====

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersonLead {
    pub id: i64,
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
    pub employee_count: Option<i64>,
    pub annual_revenue: Option<i64>,
    pub technologies: Option<String>,
    pub total_funding: Option<i64>,
    pub latest_funding: Option<String>,
    pub latest_funding_amount: Option<i64>,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: i64,
    pub name: Option<String>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub employee_count: Option<i64>,
    pub industry: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub zip_code: Option<String>,
    pub founded_year: Option<i32>,
    pub total_funding: Option<i64>,
    pub latest_funding: Option<String>,
    pub latest_funding_amount: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user's bookmark of a lead or company, refreshed on re-save.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedMark {
    pub user_id: i32,
    pub entity_id: i64,
    pub entity_type: String,
    pub has_email: bool,
    pub has_phone: bool,
    pub saved_at: DateTime<Utc>,
}

/// Immutable audit entry written once per successful export.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub id: i64,
    pub user_id: i32,
    pub entity_type: String,
    pub row_count: i64,
    pub file_name: String,
    pub file_url: String,
    pub filters: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

// ===== Export projection =====

/// A row that can be written into an export artifact.
///
/// The header and value order are fixed per entity kind; bookkeeping
/// timestamp columns are deliberately absent from both.
pub trait Exportable {
    const KIND: EntityKind;

    fn export_header() -> &'static [&'static str];
    fn export_values(&self) -> Vec<String>;
    fn entity_id(&self) -> i64;
    fn has_email(&self) -> bool;
    fn has_phone(&self) -> bool;
}

fn cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn cell_i64(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl Exportable for PersonLead {
    const KIND: EntityKind = EntityKind::Lead;

    fn export_header() -> &'static [&'static str] {
        &[
            "first_name",
            "last_name",
            "title",
            "company_name",
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
        ]
    }

    fn export_values(&self) -> Vec<String> {
        vec![
            cell(&self.first_name),
            cell(&self.last_name),
            cell(&self.title),
            cell(&self.company_name),
            cell(&self.email),
            cell(&self.work_phone),
            cell(&self.mobile_phone),
            cell(&self.corporate_phone),
            cell(&self.other_phone),
            cell(&self.industry),
            cell_i64(self.employee_count),
            cell_i64(self.annual_revenue),
            cell(&self.technologies),
            cell_i64(self.total_funding),
            cell(&self.latest_funding),
            cell_i64(self.latest_funding_amount),
            cell(&self.linkedin_url),
            cell(&self.facebook_url),
            cell(&self.twitter_url),
            cell(&self.website),
            cell(&self.city),
            cell(&self.state),
            cell(&self.country),
            cell(&self.company_address),
            cell(&self.company_city),
            cell(&self.company_state),
            cell(&self.company_country),
            cell(&self.company_phone),
            cell(&self.keywords),
            cell(&self.seo_description),
        ]
    }

    fn entity_id(&self) -> i64 {
        self.id
    }

    fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.is_empty())
    }

    fn has_phone(&self) -> bool {
        [
            &self.work_phone,
            &self.mobile_phone,
            &self.corporate_phone,
            &self.other_phone,
        ]
        .iter()
        .any(|p| p.as_deref().is_some_and(|v| !v.is_empty()))
    }
}

impl Exportable for Company {
    const KIND: EntityKind = EntityKind::Company;

    fn export_header() -> &'static [&'static str] {
        &[
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
        ]
    }

    fn export_values(&self) -> Vec<String> {
        vec![
            cell(&self.name),
            cell(&self.linkedin_url),
            cell(&self.website),
            cell(&self.phone),
            cell_i64(self.employee_count),
            cell(&self.industry),
            cell(&self.address),
            cell(&self.city),
            cell(&self.state),
            cell(&self.country),
            cell(&self.zip_code),
            self.founded_year.map(|y| y.to_string()).unwrap_or_default(),
            cell_i64(self.total_funding),
            cell(&self.latest_funding),
            cell_i64(self.latest_funding_amount),
        ]
    }

    fn entity_id(&self) -> i64 {
        self.id
    }

    fn has_email(&self) -> bool {
        false
    }

    fn has_phone(&self) -> bool {
        self.phone.as_deref().is_some_and(|v| !v.is_empty())
    }
}

// ===== Response envelopes =====

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub size: i64,
    pub total: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, size: i64, total: i64) -> Self {
        Self {
            data,
            page,
            size,
            total,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn lead() -> PersonLead {
        PersonLead {
            id: 1,
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            title: Some("CTO".into()),
            company_name: Some("Analytical Engines".into()),
            company_id: None,
            email: Some("ada@example.com".into()),
            work_phone: None,
            mobile_phone: Some("+15550102030".into()),
            corporate_phone: None,
            other_phone: None,
            industry: Some("Computing".into()),
            employee_count: Some(12),
            annual_revenue: None,
            technologies: None,
            total_funding: None,
            latest_funding: None,
            latest_funding_amount: None,
            linkedin_url: Some("https://linkedin.com/in/ada".into()),
            facebook_url: None,
            twitter_url: None,
            website: None,
            city: None,
            state: None,
            country: Some("UK".into()),
            company_address: None,
            company_city: None,
            company_state: None,
            company_country: None,
            company_phone: None,
            keywords: None,
            seo_description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn export_header_matches_value_count() {
        let row = lead();
        assert_eq!(PersonLead::export_header().len(), row.export_values().len());
    }

    #[test]
    fn export_strips_bookkeeping_timestamps() {
        assert!(!PersonLead::export_header().contains(&"created_at"));
        assert!(!PersonLead::export_header().contains(&"updated_at"));
        assert!(!Company::export_header().contains(&"created_at"));
    }

    #[test]
    fn contact_channel_flags() {
        let row = lead();
        assert!(row.has_email());
        assert!(row.has_phone());

        let mut bare = lead();
        bare.email = None;
        bare.mobile_phone = Some(String::new());
        assert!(!bare.has_email());
        assert!(!bare.has_phone());
    }
}
