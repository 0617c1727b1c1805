//! Filter dimension sets accepted by the listing, export, and selection
//! endpoints, and their compilation into predicates.
//!
//! Every dimension is optional; an absent or empty list means "no
//! constraint". Job-title dimensions are widened through the title expansion
//! index before compilation.

use crate::query::predicate::SqlPredicate;
use crate::titles::expand_titles;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

/// Columns the free-text `search` dimension matches against for person leads.
const LEAD_SEARCH_COLUMNS: &[&str] = &[
    "first_name",
    "last_name",
    "company_name",
    "email",
    "title",
    "industry",
];

/// Columns the free-text `search` dimension matches against for companies.
const COMPANY_SEARCH_COLUMNS: &[&str] = &["name", "website", "industry", "city", "country"];

/// Optional filter dimensions over person leads.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadFilter {
    /// Job titles to include (abbreviation-expanded).
    pub title: Vec<String>,
    /// Job titles to exclude (abbreviation-expanded).
    pub exclude_title: Vec<String>,
    pub company_name: Vec<String>,
    pub exclude_company_name: Vec<String>,
    pub industry: Vec<String>,
    pub exclude_industry: Vec<String>,
    pub country: Vec<String>,
    pub state: Vec<String>,
    pub city: Vec<String>,
    pub technologies: Vec<String>,
    pub latest_funding: Vec<String>,
    /// Range tokens such as `"50-100"` or `"500+"`.
    pub employee_count: Vec<String>,
    /// Scaled range tokens such as `"1M-5M"` or `"1B+"`.
    pub annual_revenue: Vec<String>,
    /// Scaled range tokens over total funding raised.
    pub total_funding: Vec<String>,
    /// Founding years of the employing company (joined through `company_id`).
    pub founded_year: Vec<i64>,
    /// Free-text search over name, company, email, title, and industry.
    pub search: Option<String>,
}

impl LeadFilter {
    /// Compile every populated dimension into one parameterized predicate.
    pub fn compile(&self) -> SqlPredicate {
        let mut pred = SqlPredicate::new();

        pred.include_like("title", &expand_titles(&self.title));
        pred.exclude_like("title", &expand_titles(&self.exclude_title));
        pred.include_like("company_name", &self.company_name);
        pred.exclude_like("company_name", &self.exclude_company_name);
        pred.include_like("industry", &self.industry);
        pred.exclude_like("industry", &self.exclude_industry);
        pred.include_like("country", &self.country);
        pred.include_like("state", &self.state);
        pred.include_like("city", &self.city);
        pred.include_like("technologies", &self.technologies);
        pred.include_like("latest_funding", &self.latest_funding);
        pred.ranges("employee_count", &self.employee_count, false);
        pred.ranges("annual_revenue", &self.annual_revenue, true);
        pred.ranges("total_funding", &self.total_funding, true);

        if !self.founded_year.is_empty() {
            let p = pred.bind_int_array(&self.founded_year);
            pred.push_clause(format!(
                "EXISTS (SELECT 1 FROM companies c \
                 WHERE c.id = person_leads.company_id \
                 AND c.founded_year::bigint = ANY({p}))"
            ));
        }

        if let Some(term) = &self.search {
            pred.search(LEAD_SEARCH_COLUMNS, term);
        }

        pred
    }
}

/// Optional filter dimensions over companies.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyFilter {
    pub name: Vec<String>,
    pub exclude_name: Vec<String>,
    pub industry: Vec<String>,
    pub exclude_industry: Vec<String>,
    pub country: Vec<String>,
    pub state: Vec<String>,
    pub city: Vec<String>,
    /// Range tokens such as `"50-100"` or `"500+"`.
    pub employee_count: Vec<String>,
    /// Scaled range tokens over total funding raised.
    pub total_funding: Vec<String>,
    pub founded_year: Vec<i64>,
    /// Free-text search over name, website, industry, city, and country.
    pub search: Option<String>,
}

impl CompanyFilter {
    pub fn compile(&self) -> SqlPredicate {
        let mut pred = SqlPredicate::new();

        pred.include_like("name", &self.name);
        pred.exclude_like("name", &self.exclude_name);
        pred.include_like("industry", &self.industry);
        pred.exclude_like("industry", &self.exclude_industry);
        pred.include_like("country", &self.country);
        pred.include_like("state", &self.state);
        pred.include_like("city", &self.city);
        pred.ranges("employee_count", &self.employee_count, false);
        pred.ranges("total_funding", &self.total_funding, true);
        pred.int_any("founded_year::bigint", &self.founded_year);

        if let Some(term) = &self.search {
            pred.search(COMPANY_SEARCH_COLUMNS, term);
        }

        pred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::predicate::BindValue;

    #[test]
    fn default_filter_compiles_to_no_constraint() {
        let pred = LeadFilter::default().compile();
        assert!(pred.is_empty());
    }

    #[test]
    fn title_filter_is_widened_before_compiling() {
        let filter = LeadFilter {
            title: vec!["CEO".to_string()],
            ..Default::default()
        };
        let pred = filter.compile();
        let patterns: Vec<&BindValue> = pred.binds().iter().collect();
        assert!(patterns.contains(&&BindValue::Text("%CEO%".to_string())));
        assert!(patterns.contains(&&BindValue::Text("%Chief Executive Officer%".to_string())));
    }

    #[test]
    fn founded_year_compiles_to_company_join() {
        let filter = LeadFilter {
            founded_year: vec![2018, 2021],
            ..Default::default()
        };
        let pred = filter.compile();
        assert!(pred.where_sql().contains("EXISTS (SELECT 1 FROM companies c"));
        assert!(pred.where_sql().contains("c.id = person_leads.company_id"));
        assert_eq!(pred.binds(), &[BindValue::IntArray(vec![2018, 2021])]);
    }

    #[test]
    fn search_binds_a_single_parameter() {
        let filter = LeadFilter {
            search: Some("acme".to_string()),
            ..Default::default()
        };
        let pred = filter.compile();
        assert_eq!(pred.binds().len(), 1);
        assert!(pred.where_sql().contains("company_name ILIKE $1"));
        assert!(pred.where_sql().contains("email ILIKE $1"));
    }

    #[test]
    fn company_filter_combines_dimensions() {
        let filter = CompanyFilter {
            industry: vec!["Software".to_string()],
            employee_count: vec!["11-50".to_string()],
            founded_year: vec![2020],
            ..Default::default()
        };
        let pred = filter.compile();
        let sql = pred.where_sql();
        assert!(sql.contains("industry ILIKE $1"));
        assert!(sql.contains("employee_count BETWEEN $2 AND $3"));
        assert!(sql.contains("founded_year::bigint = ANY($4)"));
    }
}
