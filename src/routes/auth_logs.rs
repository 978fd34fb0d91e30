// src/routes/auth_logs.rs

use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{query, query_as, Postgres, QueryBuilder};

use crate::db::filter::{self, Cond, Filter};
use crate::models::{ok, ApiData, AuthLog, AuthLogPage, Deleted};
use crate::routes::{ApiError, Json, Query};
use crate::AppState;

const SORTABLE: &[(&str, &str)] = &[
    ("userName", "user_name"),
    ("action", "action"),
    ("createdAt", "created_at"),
];

const ACTIONS: &[&str] = &["login", "logout", "login-failed"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAuthLogsQ {
    pub search: Option<String>,
    pub action: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthLogBody {
    pub user_name: String,
    pub email: Option<String>,
    pub action: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuthLogBody {
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub action: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

fn validate_action(action: &str) -> Result<(), ApiError> {
    if ACTIONS.contains(&action) {
        return Ok(());
    }
    Err(ApiError::validation(
        "action must be one of login, logout, login-failed",
    ))
}

fn list_filter(q: &ListAuthLogsQ) -> Filter {
    let mut f = Filter::new();
    if let Some(s) = &q.search {
        let s = s.trim();
        if !s.is_empty() {
            f.push(Cond::Any(vec![
                Cond::Contains("user_name", s.to_string()),
                Cond::Contains("email", s.to_string()),
            ]));
        }
    }
    f.eq_text("action", &q.action);
    f.date_range("created_at::date", q.start_date, q.end_date);
    f
}

pub async fn list_auth_logs(
    State(state): State<AppState>,
    Query(q): Query<ListAuthLogsQ>,
) -> Result<Json<AuthLogPage>, ApiError> {
    let (page, limit, offset) = filter::page_window(q.page, q.limit);
    let f = list_filter(&q);
    let order = filter::sort_clause(
        SORTABLE,
        q.sort_by.as_deref(),
        q.sort_order.as_deref(),
        "created_at",
        "log_id",
    );

    let mut count_q = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM auth_logs");
    f.apply(&mut count_q);
    let total: i64 = count_q.build_query_scalar().fetch_one(&state.pool).await?;

    let mut data_q = QueryBuilder::<Postgres>::new("SELECT * FROM auth_logs");
    f.apply(&mut data_q);
    data_q.push(" ORDER BY ");
    data_q.push(order);
    data_q.push(" LIMIT ");
    data_q.push_bind(limit);
    data_q.push(" OFFSET ");
    data_q.push_bind(offset);
    let rows: Vec<AuthLog> = data_q.build_query_as().fetch_all(&state.pool).await?;

    Ok(Json(AuthLogPage {
        success: true,
        data: rows,
        current_page: page,
        limit_number: limit,
        total_logs: total,
        total_pages: filter::total_pages(total, limit),
    }))
}

pub async fn get_auth_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<AuthLog>>, ApiError> {
    let row = query_as::<_, AuthLog>(r#"SELECT * FROM auth_logs WHERE log_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("auth log"))?;
    Ok(ok(row))
}

pub async fn create_auth_log(
    State(state): State<AppState>,
    Json(b): Json<CreateAuthLogBody>,
) -> Result<Json<ApiData<AuthLog>>, ApiError> {
    if b.user_name.trim().is_empty() {
        return Err(ApiError::validation("userName is required"));
    }
    validate_action(&b.action)?;
    let row = query_as::<_, AuthLog>(
        r#"
        INSERT INTO auth_logs (user_name, email, action, ip, user_agent)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING *
        "#,
    )
    .bind(b.user_name)
    .bind(b.email)
    .bind(b.action)
    .bind(b.ip)
    .bind(b.user_agent)
    .fetch_one(&state.pool)
    .await?;
    Ok(ok(row))
}

pub async fn update_auth_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<UpdateAuthLogBody>,
) -> Result<Json<ApiData<AuthLog>>, ApiError> {
    if let Some(action) = &b.action {
        validate_action(action)?;
    }
    let row = query_as::<_, AuthLog>(
        r#"
        UPDATE auth_logs SET
            user_name = COALESCE($2, user_name),
            email = COALESCE($3, email),
            action = COALESCE($4, action),
            ip = COALESCE($5, ip),
            user_agent = COALESCE($6, user_agent)
        WHERE log_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.user_name)
    .bind(b.email)
    .bind(b.action)
    .bind(b.ip)
    .bind(b.user_agent)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("auth log"))?;
    Ok(ok(row))
}

pub async fn delete_auth_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Deleted>>, ApiError> {
    let res = query(r#"DELETE FROM auth_logs WHERE log_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("auth log"));
    }
    Ok(ok(Deleted { deleted: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::filter::Value;
    use serde_json::json;

    #[test]
    fn action_values_are_constrained() {
        assert!(validate_action("login").is_ok());
        assert!(validate_action("logout").is_ok());
        assert!(validate_action("login-failed").is_ok());
        assert!(validate_action("signup").is_err());
    }

    #[test]
    fn date_range_filters_on_day() {
        let q: ListAuthLogsQ = serde_json::from_value(json!({
            "action": "login",
            "startDate": "2024-05-01",
            "endDate": "2024-05-31"
        }))
        .unwrap();
        let f = list_filter(&q);
        assert!(f
            .conds()
            .contains(&Cond::Eq("action", Value::Text("login".into()))));
        assert_eq!(
            f.conds()
                .iter()
                .filter(|c| matches!(
                    c,
                    Cond::Gte("created_at::date", _) | Cond::Lte("created_at::date", _)
                ))
                .count(),
            2
        );
    }
}
