//! Parameterized predicate assembly.
//!
//! Every filter dimension is an independent builder that appends zero or more
//! clauses plus their bound values to a [`SqlPredicate`]. Parameter numbering
//! is owned by the predicate, so user input never reaches the query text —
//! only `$n` placeholders do.

use crate::ingest::clean::{parse_count, parse_scaled};
use sqlx::postgres::PgArguments;
use sqlx::query::{QueryAs, QueryScalar};
use sqlx::Postgres;

/// A value bound to one `$n` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
    IntArray(Vec<i64>),
}

/// Accumulated WHERE clauses and their bound parameters.
#[derive(Debug, Default)]
pub struct SqlPredicate {
    clauses: Vec<String>,
    binds: Vec<BindValue>,
}

/// How a numeric range token parsed.
#[derive(Debug, Clone, PartialEq)]
enum RangeToken {
    Between(i64, i64),
    AtLeast(i64),
    /// Defensive fallback: malformed tokens match the column's text form.
    Literal(String),
}

fn parse_range_token(raw: &str, scaled: bool) -> RangeToken {
    let parse = |s: Option<&str>| if scaled { parse_scaled(s) } else { parse_count(s) };
    let raw = raw.trim();

    if let Some(min) = raw.strip_suffix('+') {
        if let Some(min) = parse(Some(min)) {
            return RangeToken::AtLeast(min);
        }
    } else if let Some((min, max)) = raw.split_once('-') {
        if let (Some(min), Some(max)) = (parse(Some(min)), parse(Some(max))) {
            return RangeToken::Between(min, max);
        }
    }

    RangeToken::Literal(raw.to_string())
}

impl SqlPredicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a bound value and return its `$n` placeholder.
    fn placeholder(&mut self, value: BindValue) -> String {
        self.binds.push(value);
        format!("${}", self.binds.len())
    }

    fn like_pattern(value: &str) -> BindValue {
        BindValue::Text(format!("%{}%", value.trim()))
    }

    /// Push an already-assembled clause. Used by domain-specific builders
    /// that need placeholders inside custom SQL shapes.
    pub fn push_clause(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    /// Include filter: OR of case-insensitive partial matches. Empty value
    /// lists mean no constraint.
    pub fn include_like(&mut self, column: &str, values: &[String]) {
        let values: Vec<&String> = values.iter().filter(|v| !v.trim().is_empty()).collect();
        match values.as_slice() {
            [] => {}
            [single] => {
                let p = self.placeholder(Self::like_pattern(single));
                self.clauses.push(format!("{column} ILIKE {p}"));
            }
            many => {
                let parts: Vec<String> = many
                    .iter()
                    .map(|v| {
                        let p = self.placeholder(Self::like_pattern(v));
                        format!("{column} ILIKE {p}")
                    })
                    .collect();
                self.clauses.push(format!("({})", parts.join(" OR ")));
            }
        }
    }

    /// Exclude filter: the record must fail every exclusion. `COALESCE` keeps
    /// rows with an absent field in the result set.
    pub fn exclude_like(&mut self, column: &str, values: &[String]) {
        let parts: Vec<String> = values
            .iter()
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                let p = self.placeholder(Self::like_pattern(v));
                format!("COALESCE({column}, '') NOT ILIKE {p}")
            })
            .collect();

        match parts.len() {
            0 => {}
            1 => self.clauses.push(parts.into_iter().next().unwrap()),
            _ => self.clauses.push(format!("({})", parts.join(" AND "))),
        }
    }

    /// Free-text search: OR of partial matches across a fixed column set,
    /// all reusing one bound parameter.
    pub fn search(&mut self, columns: &[&str], term: &str) {
        let term = term.trim();
        if term.is_empty() || columns.is_empty() {
            return;
        }
        let p = self.placeholder(Self::like_pattern(term));
        let parts: Vec<String> = columns.iter().map(|c| format!("{c} ILIKE {p}")).collect();
        self.clauses.push(format!("({})", parts.join(" OR ")));
    }

    /// Numeric range tokens (`"min-max"`, `"min+"`), OR'd together. `scaled`
    /// enables the `M`/`B` currency suffixes before range parsing.
    pub fn ranges(&mut self, column: &str, tokens: &[String], scaled: bool) {
        let parts: Vec<String> = tokens
            .iter()
            .filter(|t| !t.trim().is_empty())
            .map(|token| match parse_range_token(token, scaled) {
                RangeToken::Between(min, max) => {
                    let lo = self.placeholder(BindValue::Int(min));
                    let hi = self.placeholder(BindValue::Int(max));
                    format!("{column} BETWEEN {lo} AND {hi}")
                }
                RangeToken::AtLeast(min) => {
                    let lo = self.placeholder(BindValue::Int(min));
                    format!("{column} >= {lo}")
                }
                RangeToken::Literal(raw) => {
                    let p = self.placeholder(Self::like_pattern(&raw));
                    format!("{column}::text ILIKE {p}")
                }
            })
            .collect();

        match parts.len() {
            0 => {}
            1 => self.clauses.push(parts.into_iter().next().unwrap()),
            _ => self.clauses.push(format!("({})", parts.join(" OR "))),
        }
    }

    /// Exact membership against an integer list (`col = ANY($n)`).
    pub fn int_any(&mut self, column: &str, values: &[i64]) {
        if values.is_empty() {
            return;
        }
        let p = self.placeholder(BindValue::IntArray(values.to_vec()));
        self.clauses.push(format!("{column} = ANY({p})"));
    }

    /// Register a bound integer array and return its placeholder without
    /// pushing a clause; pair with [`push_clause`](Self::push_clause).
    pub fn bind_int_array(&mut self, values: &[i64]) -> String {
        self.placeholder(BindValue::IntArray(values.to_vec()))
    }

    /// Rendered `WHERE ...` fragment, or an empty string when unconstrained.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn clauses(&self) -> &[String] {
        &self.clauses
    }

    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Bind accumulated values onto a `query_as` in registration order.
pub fn bind_query_as<'q, O>(
    mut query: QueryAs<'q, Postgres, O, PgArguments>,
    binds: &'q [BindValue],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for bind in binds {
        query = match bind {
            BindValue::Text(v) => query.bind(v),
            BindValue::Int(v) => query.bind(v),
            BindValue::IntArray(v) => query.bind(v),
        };
    }
    query
}

/// Bind accumulated values onto a `query_scalar`.
pub fn bind_query_scalar<'q, O>(
    mut query: QueryScalar<'q, Postgres, O, PgArguments>,
    binds: &'q [BindValue],
) -> QueryScalar<'q, Postgres, O, PgArguments> {
    for bind in binds {
        query = match bind {
            BindValue::Text(v) => query.bind(v),
            BindValue::Int(v) => query.bind(v),
            BindValue::IntArray(v) => query.bind(v),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn empty_dimensions_add_no_constraint() {
        let mut pred = SqlPredicate::new();
        pred.include_like("title", &[]);
        pred.exclude_like("industry", &[]);
        pred.ranges("employee_count", &[], false);
        assert!(pred.is_empty());
        assert_eq!(pred.where_sql(), "");
    }

    #[test]
    fn single_include_is_one_partial_match() {
        let mut pred = SqlPredicate::new();
        pred.include_like("title", &strings(&["CEO"]));
        assert_eq!(pred.where_sql(), "WHERE title ILIKE $1");
        assert_eq!(pred.binds(), &[BindValue::Text("%CEO%".into())]);
    }

    #[test]
    fn multiple_includes_or_together() {
        let mut pred = SqlPredicate::new();
        pred.include_like("industry", &strings(&["Software", "Fintech"]));
        assert_eq!(
            pred.where_sql(),
            "WHERE (industry ILIKE $1 OR industry ILIKE $2)"
        );
    }

    #[test]
    fn excludes_and_together_and_keep_null_rows() {
        let mut pred = SqlPredicate::new();
        pred.exclude_like("title", &strings(&["Intern", "Assistant"]));
        assert_eq!(
            pred.where_sql(),
            "WHERE (COALESCE(title, '') NOT ILIKE $1 AND COALESCE(title, '') NOT ILIKE $2)"
        );
    }

    #[test]
    fn search_reuses_one_parameter() {
        let mut pred = SqlPredicate::new();
        pred.search(&["first_name", "email", "title"], "acme");
        assert_eq!(
            pred.where_sql(),
            "WHERE (first_name ILIKE $1 OR email ILIKE $1 OR title ILIKE $1)"
        );
        assert_eq!(pred.binds().len(), 1);
    }

    #[test]
    fn closed_range_token_compiles_to_between() {
        let mut pred = SqlPredicate::new();
        pred.ranges("employee_count", &strings(&["50-100"]), false);
        assert_eq!(pred.where_sql(), "WHERE employee_count BETWEEN $1 AND $2");
        assert_eq!(
            pred.binds(),
            &[BindValue::Int(50), BindValue::Int(100)]
        );
    }

    #[test]
    fn open_range_token_compiles_to_lower_bound() {
        let mut pred = SqlPredicate::new();
        pred.ranges("employee_count", &strings(&["500+"]), false);
        assert_eq!(pred.where_sql(), "WHERE employee_count >= $1");
        assert_eq!(pred.binds(), &[BindValue::Int(500)]);
    }

    #[test]
    fn scaled_tokens_multiply_before_range_parsing() {
        let mut pred = SqlPredicate::new();
        pred.ranges("annual_revenue", &strings(&["1M-5M", "1B+"]), true);
        assert_eq!(
            pred.binds(),
            &[
                BindValue::Int(1_000_000),
                BindValue::Int(5_000_000),
                BindValue::Int(1_000_000_000),
            ]
        );
    }

    #[test]
    fn malformed_token_falls_back_to_text_match() {
        let mut pred = SqlPredicate::new();
        pred.ranges("employee_count", &strings(&["lots"]), false);
        assert_eq!(pred.where_sql(), "WHERE employee_count::text ILIKE $1");
        assert_eq!(pred.binds(), &[BindValue::Text("%lots%".into())]);
    }

    #[test]
    fn int_any_binds_an_array() {
        let mut pred = SqlPredicate::new();
        pred.int_any("founded_year", &[2019, 2020]);
        assert_eq!(pred.where_sql(), "WHERE founded_year = ANY($1)");
        assert_eq!(pred.binds(), &[BindValue::IntArray(vec![2019, 2020])]);
    }

    #[test]
    fn independent_dimensions_and_together() {
        let mut pred = SqlPredicate::new();
        pred.include_like("title", &strings(&["VP"]));
        pred.ranges("employee_count", &strings(&["10-50"]), false);
        assert_eq!(
            pred.where_sql(),
            "WHERE title ILIKE $1 AND employee_count BETWEEN $2 AND $3"
        );
    }
}
