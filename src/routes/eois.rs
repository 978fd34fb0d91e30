// src/routes/eois.rs

use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{query, query_as, Postgres, QueryBuilder};

use crate::db::{
    self,
    filter::{self, Cond, Filter, Value},
};
use crate::models::{ok, ApiData, Deleted, Eoi, EoiPage};
use crate::routes::{ApiError, Json, Query};
use crate::AppState;

const SORTABLE: &[(&str, &str)] = &[
    ("eoiNo", "eoi_no"),
    ("eoiDate", "eoi_date"),
    ("applicant", "applicant"),
    ("manager", "manager"),
    ("eoiAmt", "eoi_amt"),
    ("status", "status"),
    ("createdAt", "created_at"),
];

const STATUSES: &[&str] = &["active", "converted", "cancelled"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEoisQ {
    pub search: Option<String>,
    pub applicant: Option<String>,
    pub manager: Option<String>,
    pub config: Option<String>,
    pub eoi_no: Option<i64>,
    pub contact: Option<i64>,
    pub pan: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEoiBody {
    pub eoi_no: Option<i64>,
    pub eoi_date: Option<NaiveDate>,
    pub applicant: String,
    pub co_applicant: Option<String>,
    pub manager: Option<String>,
    pub config: Option<String>,
    pub project: Option<String>,
    pub contact: Option<i64>,
    pub alt: Option<i64>,
    pub email: Option<String>,
    pub pan: Option<String>,
    pub aadhar: Option<i64>,
    pub address: Option<String>,
    #[serde(default)]
    pub eoi_amt: f64,
    pub payment_mode: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    pub remarks: Option<String>,
}
fn default_status() -> String { "active".into() }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEoiBody {
    pub eoi_no: Option<i64>, // never updatable; its presence fails the request
    pub eoi_date: Option<NaiveDate>,
    pub applicant: Option<String>,
    pub co_applicant: Option<String>,
    pub manager: Option<String>,
    pub config: Option<String>,
    pub project: Option<String>,
    pub contact: Option<i64>,
    pub alt: Option<i64>,
    pub email: Option<String>,
    pub pan: Option<String>,
    pub aadhar: Option<i64>,
    pub address: Option<String>,
    pub eoi_amt: Option<f64>,
    pub payment_mode: Option<String>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

/// Cross-field search: substring over the free-text columns, plus equality on
/// the numeric columns when the term parses as a number.
fn search_conditions(term: &str) -> Cond {
    let mut group = vec![
        Cond::Contains("applicant", term.to_string()),
        Cond::Contains("co_applicant", term.to_string()),
        Cond::Contains("manager", term.to_string()),
        Cond::Contains("project", term.to_string()),
        Cond::Contains("pan", term.to_string()),
        Cond::Contains("email", term.to_string()),
        Cond::Contains("address", term.to_string()),
    ];
    if let Ok(n) = term.parse::<i64>() {
        group.push(Cond::Eq("eoi_no", Value::Int(n)));
        group.push(Cond::Eq("contact", Value::Int(n)));
        group.push(Cond::Eq("alt", Value::Int(n)));
        group.push(Cond::Eq("aadhar", Value::Int(n)));
    }
    if let Ok(n) = term.parse::<f64>() {
        group.push(Cond::Eq("eoi_amt", Value::Num(n)));
    }
    Cond::Any(group)
}

fn list_filter(q: &ListEoisQ) -> Filter {
    let mut f = Filter::new();
    if let Some(s) = &q.search {
        let s = s.trim();
        if !s.is_empty() {
            f.push(search_conditions(s));
        }
    }
    f.contains("applicant", &q.applicant);
    f.contains("manager", &q.manager);
    f.eq_text("config", &q.config);
    f.eq_int("eoi_no", q.eoi_no);
    f.eq_int("contact", q.contact);
    f.contains("pan", &q.pan);
    f.eq_text("status", &q.status);
    f.date_range("eoi_date", q.start_date, q.end_date);
    f.num_range("eoi_amt", q.min_amount, q.max_amount);
    f
}

fn validate_status(status: &str) -> Result<(), ApiError> {
    if STATUSES.contains(&status) {
        return Ok(());
    }
    Err(ApiError::validation(
        "status must be one of active, converted, cancelled",
    ))
}

fn validate_update(b: &UpdateEoiBody) -> Result<(), ApiError> {
    if b.eoi_no.is_some() {
        return Err(ApiError::validation("eoiNo cannot be changed"));
    }
    if let Some(status) = &b.status {
        validate_status(status)?;
    }
    Ok(())
}

pub async fn list_eois(
    State(state): State<AppState>,
    Query(q): Query<ListEoisQ>,
) -> Result<Json<EoiPage>, ApiError> {
    let (page, limit, offset) = filter::page_window(q.page, q.limit);
    let f = list_filter(&q);
    let order = filter::sort_clause(
        SORTABLE,
        q.sort_by.as_deref(),
        q.sort_order.as_deref(),
        "created_at",
        "eoi_id",
    );

    let mut count_q = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM eois");
    f.apply(&mut count_q);
    let total: i64 = count_q.build_query_scalar().fetch_one(&state.pool).await?;

    let mut data_q = QueryBuilder::<Postgres>::new("SELECT * FROM eois");
    f.apply(&mut data_q);
    data_q.push(" ORDER BY ");
    data_q.push(order);
    data_q.push(" LIMIT ");
    data_q.push_bind(limit);
    data_q.push(" OFFSET ");
    data_q.push_bind(offset);
    let rows: Vec<Eoi> = data_q.build_query_as().fetch_all(&state.pool).await?;

    Ok(Json(EoiPage {
        success: true,
        data: rows,
        current_page: page,
        limit_number: limit,
        total_eois: total,
        total_pages: filter::total_pages(total, limit),
    }))
}

pub async fn get_eoi(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Eoi>>, ApiError> {
    let row = query_as::<_, Eoi>(r#"SELECT * FROM eois WHERE eoi_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("eoi"))?;
    Ok(ok(row))
}

/// Number assignment and insert run in one transaction, so a failed insert
/// does not burn a sequence number.
pub async fn create_eoi(
    State(state): State<AppState>,
    Json(b): Json<CreateEoiBody>,
) -> Result<Json<ApiData<Eoi>>, ApiError> {
    if b.applicant.trim().is_empty() {
        return Err(ApiError::validation("applicant is required"));
    }
    validate_status(&b.status)?;
    let eoi_date = b.eoi_date.unwrap_or_else(|| chrono::Utc::now().date_naive());

    let mut tx = state.pool.begin().await?;
    let eoi_no = match b.eoi_no {
        Some(n) => n, // explicit number; a duplicate surfaces as 400
        None => db::next_number(&mut tx, "eoi_no", "eois", "eoi_no").await?,
    };

    let row = query_as::<_, Eoi>(
        r#"
        INSERT INTO eois
            (eoi_no, eoi_date, applicant, co_applicant, manager, config, project,
             contact, alt, email, pan, aadhar, address, eoi_amt, payment_mode, status, remarks)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)
        RETURNING *
        "#,
    )
    .bind(eoi_no)
    .bind(eoi_date)
    .bind(b.applicant)
    .bind(b.co_applicant)
    .bind(b.manager)
    .bind(b.config)
    .bind(b.project)
    .bind(b.contact)
    .bind(b.alt)
    .bind(b.email)
    .bind(b.pan)
    .bind(b.aadhar)
    .bind(b.address)
    .bind(b.eoi_amt)
    .bind(b.payment_mode)
    .bind(b.status)
    .bind(b.remarks)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(ok(row))
}

pub async fn update_eoi(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<UpdateEoiBody>,
) -> Result<Json<ApiData<Eoi>>, ApiError> {
    validate_update(&b)?;
    let row = query_as::<_, Eoi>(
        r#"
        UPDATE eois SET
            eoi_date = COALESCE($2, eoi_date),
            applicant = COALESCE($3, applicant),
            co_applicant = COALESCE($4, co_applicant),
            manager = COALESCE($5, manager),
            config = COALESCE($6, config),
            project = COALESCE($7, project),
            contact = COALESCE($8, contact),
            alt = COALESCE($9, alt),
            email = COALESCE($10, email),
            pan = COALESCE($11, pan),
            aadhar = COALESCE($12, aadhar),
            address = COALESCE($13, address),
            eoi_amt = COALESCE($14, eoi_amt),
            payment_mode = COALESCE($15, payment_mode),
            status = COALESCE($16, status),
            remarks = COALESCE($17, remarks),
            updated_at = now()
        WHERE eoi_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.eoi_date)
    .bind(b.applicant)
    .bind(b.co_applicant)
    .bind(b.manager)
    .bind(b.config)
    .bind(b.project)
    .bind(b.contact)
    .bind(b.alt)
    .bind(b.email)
    .bind(b.pan)
    .bind(b.aadhar)
    .bind(b.address)
    .bind(b.eoi_amt)
    .bind(b.payment_mode)
    .bind(b.status)
    .bind(b.remarks)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("eoi"))?;
    Ok(ok(row))
}

pub async fn delete_eoi(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Deleted>>, ApiError> {
    let res = query(r#"DELETE FROM eois WHERE eoi_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("eoi"));
    }
    Ok(ok(Deleted { deleted: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn numeric_search_expands_to_equality_arms() {
        let Cond::Any(group) = search_conditions("1500000") else {
            panic!("expected OR group");
        };
        assert!(group.contains(&Cond::Eq("eoi_amt", Value::Num(1_500_000.0))));
        assert!(group.contains(&Cond::Eq("contact", Value::Int(1_500_000))));
        assert!(group.contains(&Cond::Eq("alt", Value::Int(1_500_000))));
        assert!(group.contains(&Cond::Eq("aadhar", Value::Int(1_500_000))));
        assert!(group.contains(&Cond::Eq("eoi_no", Value::Int(1_500_000))));
        // text arms stay alongside the numeric ones
        assert!(group.contains(&Cond::Contains("applicant", "1500000".into())));
    }

    #[test]
    fn text_search_has_no_equality_arms() {
        let Cond::Any(group) = search_conditions("shah") else {
            panic!("expected OR group");
        };
        assert!(group.iter().all(|c| matches!(c, Cond::Contains(..))));
    }

    #[test]
    fn amount_range_bounds_eoi_amt() {
        let q: ListEoisQ =
            serde_json::from_value(json!({ "minAmount": 100000, "maxAmount": 1500000 })).unwrap();
        let f = list_filter(&q);
        assert_eq!(
            f.conds(),
            &[
                Cond::Gte("eoi_amt", Value::Num(100_000.0)),
                Cond::Lte("eoi_amt", Value::Num(1_500_000.0)),
            ]
        );
    }

    #[test]
    fn camel_case_params_map_to_columns() {
        let q: ListEoisQ = serde_json::from_value(json!({
            "eoiNo": 1001,
            "status": "active",
            "startDate": "2024-04-01",
            "endDate": "2024-04-30"
        }))
        .unwrap();
        let f = list_filter(&q);
        assert!(f.conds().contains(&Cond::Eq("eoi_no", Value::Int(1001))));
        assert!(f
            .conds()
            .contains(&Cond::Eq("status", Value::Text("active".into()))));
        assert_eq!(
            f.conds()
                .iter()
                .filter(|c| matches!(c, Cond::Gte("eoi_date", _) | Cond::Lte("eoi_date", _)))
                .count(),
            2
        );
    }

    #[test]
    fn update_with_eoi_no_is_rejected() {
        let b: UpdateEoiBody =
            serde_json::from_value(json!({ "eoiNo": 1001, "applicant": "A. Shah" })).unwrap();
        let err = validate_update(&b).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let b: UpdateEoiBody = serde_json::from_value(json!({ "applicant": "A. Shah" })).unwrap();
        assert!(validate_update(&b).is_ok());
    }

    #[test]
    fn status_values_are_constrained() {
        assert!(validate_status("active").is_ok());
        assert!(validate_status("converted").is_ok());
        assert!(validate_status("cancelled").is_ok());
        assert!(validate_status("wibble").is_err());

        let b: UpdateEoiBody = serde_json::from_value(json!({ "status": "paused" })).unwrap();
        let err = validate_update(&b).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
