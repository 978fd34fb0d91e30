// src/routes/bookings.rs

use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{query, query_as, Postgres, QueryBuilder, Transaction};

use crate::db::{
    self,
    filter::{self, Cond, Filter, Value},
};
use crate::models::{ok, ApiData, Booking, BookingPage, Deleted};
use crate::routes::{ApiError, Json, Query};
use crate::AppState;

const SORTABLE: &[(&str, &str)] = &[
    ("bookingNo", "booking_no"),
    ("bookingDate", "booking_date"),
    ("applicant", "applicant"),
    ("manager", "manager"),
    ("project", "project"),
    ("agreementValue", "agreement_value"),
    ("status", "status"),
    ("createdAt", "created_at"),
];

// `cancelled` is deliberately absent: that transition runs through the cancel
// endpoint so the unit release stays transactional.
const UPDATABLE_STATUSES: &[&str] = &["booked", "registered"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListBookingsQ {
    pub search: Option<String>,
    pub applicant: Option<String>,
    pub manager: Option<String>,
    pub booking_no: Option<i64>,
    pub contact: Option<i64>,
    pub pan: Option<String>,
    pub project: Option<String>,
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
pub struct CreateBookingBody {
    pub booking_no: Option<i64>,
    pub booking_date: Option<NaiveDate>,
    pub applicant: String,
    pub co_applicant: Option<String>,
    pub manager: Option<String>,
    pub contact: Option<i64>,
    pub pan: Option<String>,
    pub project: Option<String>,
    pub wing: Option<String>,
    pub floor: Option<String>,
    pub unit_number: Option<String>,
    pub configuration: Option<String>,
    pub area: Option<f64>,
    #[serde(default)]
    pub agreement_value: f64,
    pub unit_id: Option<i64>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingBody {
    pub booking_no: Option<i64>, // never updatable; its presence fails the request
    pub booking_date: Option<NaiveDate>,
    pub applicant: Option<String>,
    pub co_applicant: Option<String>,
    pub manager: Option<String>,
    pub contact: Option<i64>,
    pub pan: Option<String>,
    pub project: Option<String>,
    pub wing: Option<String>,
    pub floor: Option<String>,
    pub unit_number: Option<String>,
    pub configuration: Option<String>,
    pub area: Option<f64>,
    pub agreement_value: Option<f64>,
    pub status: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingBody {
    pub reason: Option<String>,
    pub unit_status: Option<String>,
}

fn search_conditions(term: &str) -> Cond {
    let mut group = vec![
        Cond::Contains("applicant", term.to_string()),
        Cond::Contains("co_applicant", term.to_string()),
        Cond::Contains("manager", term.to_string()),
        Cond::Contains("project", term.to_string()),
        Cond::Contains("wing", term.to_string()),
        Cond::Contains("unit_number", term.to_string()),
        Cond::Contains("pan", term.to_string()),
    ];
    if let Ok(n) = term.parse::<i64>() {
        group.push(Cond::Eq("booking_no", Value::Int(n)));
        group.push(Cond::Eq("contact", Value::Int(n)));
    }
    if let Ok(n) = term.parse::<f64>() {
        group.push(Cond::Eq("agreement_value", Value::Num(n)));
    }
    Cond::Any(group)
}

fn list_filter(q: &ListBookingsQ) -> Filter {
    let mut f = Filter::new();
    if let Some(s) = &q.search {
        let s = s.trim();
        if !s.is_empty() {
            f.push(search_conditions(s));
        }
    }
    f.contains("applicant", &q.applicant);
    f.contains("manager", &q.manager);
    f.eq_int("booking_no", q.booking_no);
    f.eq_int("contact", q.contact);
    f.contains("pan", &q.pan);
    f.contains("project", &q.project);
    f.eq_text("status", &q.status);
    f.date_range("booking_date", q.start_date, q.end_date);
    f.num_range("agreement_value", q.min_amount, q.max_amount);
    f
}

fn validate_update(b: &UpdateBookingBody) -> Result<(), ApiError> {
    if b.booking_no.is_some() {
        return Err(ApiError::validation("bookingNo cannot be changed"));
    }
    if let Some(status) = &b.status {
        if !UPDATABLE_STATUSES.contains(&status.as_str()) {
            return Err(ApiError::validation("status must be booked or registered"));
        }
    }
    Ok(())
}

/// Unit claims and releases count as inventory changes, so the owning
/// project's updated_at moves with them.
async fn touch_owning_project(
    tx: &mut Transaction<'_, Postgres>,
    unit_id: i64,
) -> Result<(), sqlx::Error> {
    query(
        r#"
        UPDATE projects SET updated_at = now()
         WHERE project_id = (SELECT f.project_id
                               FROM floors f
                               JOIN units u ON u.floor_id = f.floor_id
                              WHERE u.unit_id = $1)
        "#,
    )
    .bind(unit_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Query(q): Query<ListBookingsQ>,
) -> Result<Json<BookingPage>, ApiError> {
    let (page, limit, offset) = filter::page_window(q.page, q.limit);
    let f = list_filter(&q);
    let order = filter::sort_clause(
        SORTABLE,
        q.sort_by.as_deref(),
        q.sort_order.as_deref(),
        "created_at",
        "booking_id",
    );

    let mut count_q = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM bookings");
    f.apply(&mut count_q);
    let total: i64 = count_q.build_query_scalar().fetch_one(&state.pool).await?;

    let mut data_q = QueryBuilder::<Postgres>::new("SELECT * FROM bookings");
    f.apply(&mut data_q);
    data_q.push(" ORDER BY ");
    data_q.push(order);
    data_q.push(" LIMIT ");
    data_q.push_bind(limit);
    data_q.push(" OFFSET ");
    data_q.push_bind(offset);
    let rows: Vec<Booking> = data_q.build_query_as().fetch_all(&state.pool).await?;

    Ok(Json(BookingPage {
        success: true,
        data: rows,
        current_page: page,
        limit_number: limit,
        total_bookings: total,
        total_pages: filter::total_pages(total, limit),
    }))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Booking>>, ApiError> {
    let row = query_as::<_, Booking>(r#"SELECT * FROM bookings WHERE booking_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("booking"))?;
    Ok(ok(row))
}

/// Creates the booking and, when a unit is linked, claims it in the same
/// transaction. A unit id that matches no unit aborts the whole thing.
pub async fn create_booking(
    State(state): State<AppState>,
    Json(b): Json<CreateBookingBody>,
) -> Result<Json<ApiData<Booking>>, ApiError> {
    if b.applicant.trim().is_empty() {
        return Err(ApiError::validation("applicant is required"));
    }
    let booking_date = b.booking_date.unwrap_or_else(|| chrono::Utc::now().date_naive());

    let mut tx = state.pool.begin().await?;
    let booking_no = match b.booking_no {
        Some(n) => n, // explicit number; a duplicate surfaces as 400
        None => db::next_number(&mut tx, "booking_no", "bookings", "booking_no").await?,
    };

    let row = query_as::<_, Booking>(
        r#"
        INSERT INTO bookings
            (booking_no, booking_date, applicant, co_applicant, manager, contact, pan,
             project, wing, floor, unit_number, configuration, area, agreement_value,
             unit_id, remarks)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
        RETURNING *
        "#,
    )
    .bind(booking_no)
    .bind(booking_date)
    .bind(&b.applicant)
    .bind(b.co_applicant)
    .bind(b.manager)
    .bind(b.contact)
    .bind(b.pan)
    .bind(b.project)
    .bind(b.wing)
    .bind(b.floor)
    .bind(b.unit_number)
    .bind(b.configuration)
    .bind(b.area)
    .bind(b.agreement_value)
    .bind(b.unit_id)
    .bind(b.remarks)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(unit_id) = b.unit_id {
        let claimed = query(
            r#"
            UPDATE units
               SET status = 'booked', reserved_by_or_reason = $2, reference_id = $3
             WHERE unit_id = $1
            "#,
        )
        .bind(unit_id)
        .bind(&b.applicant)
        .bind(row.booking_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(ApiError::not_found("unit"));
        }
        touch_owning_project(&mut tx, unit_id).await?;
    }

    tx.commit().await?;
    Ok(ok(row))
}

pub async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<UpdateBookingBody>,
) -> Result<Json<ApiData<Booking>>, ApiError> {
    validate_update(&b)?;
    let row = query_as::<_, Booking>(
        r#"
        UPDATE bookings SET
            booking_date = COALESCE($2, booking_date),
            applicant = COALESCE($3, applicant),
            co_applicant = COALESCE($4, co_applicant),
            manager = COALESCE($5, manager),
            contact = COALESCE($6, contact),
            pan = COALESCE($7, pan),
            project = COALESCE($8, project),
            wing = COALESCE($9, wing),
            floor = COALESCE($10, floor),
            unit_number = COALESCE($11, unit_number),
            configuration = COALESCE($12, configuration),
            area = COALESCE($13, area),
            agreement_value = COALESCE($14, agreement_value),
            status = COALESCE($15, status),
            remarks = COALESCE($16, remarks),
            updated_at = now()
        WHERE booking_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.booking_date)
    .bind(b.applicant)
    .bind(b.co_applicant)
    .bind(b.manager)
    .bind(b.contact)
    .bind(b.pan)
    .bind(b.project)
    .bind(b.wing)
    .bind(b.floor)
    .bind(b.unit_number)
    .bind(b.configuration)
    .bind(b.area)
    .bind(b.agreement_value)
    .bind(b.status)
    .bind(b.remarks)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("booking"))?;
    Ok(ok(row))
}

/// Cancels the booking and releases its unit (if still present) in one
/// transaction. The unit goes to the requested status, `available` by default,
/// with the reservation fields cleared. A unit deleted since the booking was
/// made is fine; only the booking row itself is required.
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<CancelBookingBody>,
) -> Result<Json<ApiData<Booking>>, ApiError> {
    let mut tx = state.pool.begin().await?;

    let existing = query_as::<_, Booking>(
        r#"SELECT * FROM bookings WHERE booking_id = $1 FOR UPDATE"#,
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("booking"))?;
    if existing.status == "cancelled" {
        return Err(ApiError::validation("booking is already cancelled"));
    }

    let row = query_as::<_, Booking>(
        r#"
        UPDATE bookings
           SET status = 'cancelled', cancel_reason = $2, cancelled_at = now(), updated_at = now()
         WHERE booking_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.reason)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(unit_id) = existing.unit_id {
        let unit_status = b.unit_status.unwrap_or_else(|| "available".to_string());
        query(
            r#"
            UPDATE units
               SET status = $2, reserved_by_or_reason = NULL, reference_id = NULL
             WHERE unit_id = $1
            "#,
        )
        .bind(unit_id)
        .bind(unit_status)
        .execute(&mut *tx)
        .await?;
        touch_owning_project(&mut tx, unit_id).await?;
    }

    tx.commit().await?;
    Ok(ok(row))
}

pub async fn delete_booking(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Deleted>>, ApiError> {
    let res = query(r#"DELETE FROM bookings WHERE booking_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("booking"));
    }
    Ok(ok(Deleted { deleted: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn numeric_search_matches_number_and_amount_columns() {
        let Cond::Any(group) = search_conditions("1002") else {
            panic!("expected OR group");
        };
        assert!(group.contains(&Cond::Eq("booking_no", Value::Int(1002))));
        assert!(group.contains(&Cond::Eq("contact", Value::Int(1002))));
        assert!(group.contains(&Cond::Eq("agreement_value", Value::Num(1002.0))));
        assert!(group.contains(&Cond::Contains("unit_number", "1002".into())));
    }

    #[test]
    fn amount_range_bounds_agreement_value() {
        let q: ListBookingsQ =
            serde_json::from_value(json!({ "minAmount": 2500000, "status": "booked" })).unwrap();
        let f = list_filter(&q);
        assert!(f
            .conds()
            .contains(&Cond::Gte("agreement_value", Value::Num(2_500_000.0))));
        assert!(f
            .conds()
            .contains(&Cond::Eq("status", Value::Text("booked".into()))));
    }

    #[test]
    fn update_with_booking_no_is_rejected() {
        let b: UpdateBookingBody =
            serde_json::from_value(json!({ "bookingNo": 1005, "manager": "R. Mehta" })).unwrap();
        let err = validate_update(&b).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let b: UpdateBookingBody =
            serde_json::from_value(json!({ "manager": "R. Mehta" })).unwrap();
        assert!(validate_update(&b).is_ok());
    }

    #[test]
    fn update_status_rejects_cancelled_and_unknown_values() {
        let b: UpdateBookingBody =
            serde_json::from_value(json!({ "status": "cancelled" })).unwrap();
        let err = validate_update(&b).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let b: UpdateBookingBody = serde_json::from_value(json!({ "status": "wibble" })).unwrap();
        assert!(validate_update(&b).is_err());

        let b: UpdateBookingBody =
            serde_json::from_value(json!({ "status": "registered" })).unwrap();
        assert!(validate_update(&b).is_ok());
    }

    #[test]
    fn cancel_body_defaults_are_empty() {
        let b: CancelBookingBody = serde_json::from_value(json!({})).unwrap();
        assert!(b.reason.is_none());
        assert!(b.unit_status.is_none());
    }
}
