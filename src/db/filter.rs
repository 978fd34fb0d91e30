// src/db/filter.rs
//
// Dynamic WHERE construction for the filtered list endpoints. Every list
// resource takes the same family of query params (free-text contains, exact
// matches, date/amount ranges, a cross-field `search`), so the condition
// tree lives here and routes only decide which columns participate.

use chrono::NaiveDate;
use sqlx::{Postgres, QueryBuilder};

/// A bindable filter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Int(i64),
    Num(f64),
    Day(NaiveDate),
}

/// One condition of a WHERE clause. `Any` is an OR group.
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Eq(&'static str, Value),
    Contains(&'static str, String),
    Gte(&'static str, Value),
    Lte(&'static str, Value),
    Any(Vec<Cond>),
}

/// AND-ed conditions, applied onto a `QueryBuilder` with positional binds.
/// The tree is inspectable so the construction rules are testable without a
/// database.
#[derive(Debug, Default)]
pub struct Filter {
    conds: Vec<Cond>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cond: Cond) {
        if let Cond::Any(group) = &cond {
            if group.is_empty() {
                return;
            }
        }
        self.conds.push(cond);
    }

    /// Case-insensitive substring match when the param is present and
    /// non-blank.
    pub fn contains(&mut self, col: &'static str, v: &Option<String>) {
        if let Some(s) = v {
            let s = s.trim();
            if !s.is_empty() {
                self.push(Cond::Contains(col, s.to_string()));
            }
        }
    }

    pub fn eq_text(&mut self, col: &'static str, v: &Option<String>) {
        if let Some(s) = v {
            let s = s.trim();
            if !s.is_empty() {
                self.push(Cond::Eq(col, Value::Text(s.to_string())));
            }
        }
    }

    pub fn eq_int(&mut self, col: &'static str, v: Option<i64>) {
        if let Some(n) = v {
            self.push(Cond::Eq(col, Value::Int(n)));
        }
    }

    /// Inclusive `startDate`/`endDate` bounds.
    pub fn date_range(&mut self, col: &'static str, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        if let Some(d) = start {
            self.push(Cond::Gte(col, Value::Day(d)));
        }
        if let Some(d) = end {
            self.push(Cond::Lte(col, Value::Day(d)));
        }
    }

    /// Inclusive `minAmount`/`maxAmount` bounds.
    pub fn num_range(&mut self, col: &'static str, min: Option<f64>, max: Option<f64>) {
        if let Some(n) = min {
            self.push(Cond::Gte(col, Value::Num(n)));
        }
        if let Some(n) = max {
            self.push(Cond::Lte(col, Value::Num(n)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conds.is_empty()
    }

    pub fn conds(&self) -> &[Cond] {
        &self.conds
    }

    /// Appends ` WHERE …` to the builder; appends nothing when no condition
    /// was collected.
    pub fn apply(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        if self.conds.is_empty() {
            return;
        }
        qb.push(" WHERE ");
        for (i, cond) in self.conds.iter().enumerate() {
            if i > 0 {
                qb.push(" AND ");
            }
            push_cond(qb, cond);
        }
    }
}

fn push_cond(qb: &mut QueryBuilder<'_, Postgres>, cond: &Cond) {
    match cond {
        Cond::Eq(col, v) => {
            qb.push(*col);
            qb.push(" = ");
            push_value(qb, v);
        }
        Cond::Contains(col, needle) => {
            qb.push(*col);
            qb.push(" ILIKE ");
            qb.push_bind(like_pattern(needle));
        }
        Cond::Gte(col, v) => {
            qb.push(*col);
            qb.push(" >= ");
            push_value(qb, v);
        }
        Cond::Lte(col, v) => {
            qb.push(*col);
            qb.push(" <= ");
            push_value(qb, v);
        }
        Cond::Any(group) => {
            qb.push("(");
            for (i, inner) in group.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_cond(qb, inner);
            }
            qb.push(")");
        }
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, v: &Value) {
    match v {
        Value::Text(s) => {
            qb.push_bind(s.clone());
        }
        Value::Int(n) => {
            qb.push_bind(*n);
        }
        Value::Num(n) => {
            qb.push_bind(*n);
        }
        Value::Day(d) => {
            qb.push_bind(*d);
        }
    }
}

/// `%needle%` with ILIKE metacharacters escaped so user text matches
/// literally.
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

/// 1-based `page`/`limit` normalization shared by every list endpoint.
/// Returns `(page, limit, offset)`. The offset saturates so an absurd page
/// number yields an empty page rather than an overflowed OFFSET.
pub fn page_window(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(10).clamp(1, 500);
    (page, limit, (page - 1).saturating_mul(limit))
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

/// Resolves `sortBy`/`sortOrder` against a per-resource whitelist (column
/// names cannot be bound as parameters). Unknown keys fall back to
/// `default_col`; the primary key tiebreak keeps pagination stable.
pub fn sort_clause(
    allowed: &[(&str, &'static str)],
    sort_by: Option<&str>,
    sort_order: Option<&str>,
    default_col: &'static str,
    tiebreak: &'static str,
) -> String {
    let col = sort_by
        .and_then(|key| allowed.iter().find(|(k, _)| *k == key).map(|(_, c)| *c))
        .unwrap_or(default_col);
    let dir = match sort_order.map(|s| s.to_ascii_lowercase()) {
        Some(ref s) if s == "asc" => "ASC",
        _ => "DESC",
    };
    format!("{col} {dir}, {tiebreak} DESC")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_range_produces_inclusive_bounds() {
        let mut f = Filter::new();
        f.num_range("eoi_amt", Some(100_000.0), Some(1_500_000.0));
        assert_eq!(
            f.conds(),
            &[
                Cond::Gte("eoi_amt", Value::Num(100_000.0)),
                Cond::Lte("eoi_amt", Value::Num(1_500_000.0)),
            ]
        );
    }

    #[test]
    fn apply_renders_where_with_positional_binds() {
        let mut f = Filter::new();
        f.contains("applicant", &Some("shah".into()));
        f.eq_text("status", &Some("active".into()));
        f.num_range("eoi_amt", Some(1.0), None);

        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM eois");
        f.apply(&mut qb);
        assert_eq!(
            qb.into_sql(),
            "SELECT COUNT(*) FROM eois WHERE applicant ILIKE $1 AND status = $2 AND eoi_amt >= $3"
        );
    }

    #[test]
    fn or_group_is_parenthesized() {
        let mut f = Filter::new();
        f.push(Cond::Any(vec![
            Cond::Contains("applicant", "15".into()),
            Cond::Eq("eoi_no", Value::Int(15)),
        ]));

        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM eois");
        f.apply(&mut qb);
        assert_eq!(
            qb.into_sql(),
            "SELECT COUNT(*) FROM eois WHERE (applicant ILIKE $1 OR eoi_no = $2)"
        );
    }

    #[test]
    fn empty_filter_appends_nothing() {
        let f = Filter::new();
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM eois");
        f.apply(&mut qb);
        assert_eq!(qb.into_sql(), "SELECT * FROM eois");
        assert!(f.is_empty());
    }

    #[test]
    fn blank_params_are_ignored() {
        let mut f = Filter::new();
        f.contains("applicant", &Some("   ".into()));
        f.eq_text("status", &None);
        f.push(Cond::Any(vec![]));
        assert!(f.is_empty());
    }

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("raj"), "%raj%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c\\d"), "%c\\\\d%");
    }

    #[test]
    fn page_window_defaults_and_clamps() {
        assert_eq!(page_window(None, None), (1, 10, 0));
        assert_eq!(page_window(Some(3), Some(25)), (3, 25, 50));
        assert_eq!(page_window(Some(0), Some(0)), (1, 1, 0));
        assert_eq!(page_window(Some(-2), Some(9999)), (1, 500, 0));
        // a page number near i64::MAX saturates the offset, no overflow
        assert_eq!(
            page_window(Some(i64::MAX), Some(500)),
            (i64::MAX, 500, i64::MAX)
        );
    }

    #[test]
    fn total_pages_is_ceiling() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }

    #[test]
    fn sort_clause_whitelists_and_defaults() {
        let allowed = [("eoiNo", "eoi_no"), ("eoiDate", "eoi_date")];
        assert_eq!(
            sort_clause(&allowed, Some("eoiNo"), Some("asc"), "created_at", "eoi_id"),
            "eoi_no ASC, eoi_id DESC"
        );
        assert_eq!(
            sort_clause(&allowed, Some("drop table"), None, "created_at", "eoi_id"),
            "created_at DESC, eoi_id DESC"
        );
        assert_eq!(
            sort_clause(&allowed, None, Some("ASC"), "created_at", "eoi_id"),
            "created_at ASC, eoi_id DESC"
        );
    }
}
