// src/routes/clients.rs

use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::{query, query_as, Postgres, QueryBuilder};

use crate::db::filter::{self, Cond, Filter, Value};
use crate::models::{ok, ApiData, Client, ClientPage, Deleted};
use crate::routes::{ApiError, Json, Query};
use crate::AppState;

const SORTABLE: &[(&str, &str)] = &[
    ("name", "name"),
    ("manager", "manager"),
    ("occupation", "occupation"),
    ("createdAt", "created_at"),
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClientsQ {
    pub search: Option<String>,
    pub name: Option<String>,
    pub manager: Option<String>,
    pub occupation: Option<String>,
    pub contact: Option<i64>,
    pub pan: Option<String>,
    pub partner_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientBody {
    pub name: String,
    pub contact: Option<i64>,
    pub alt: Option<i64>,
    pub email: Option<String>,
    pub pan: Option<String>,
    pub aadhar: Option<i64>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub manager: Option<String>,
    pub partner_id: Option<i64>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientBody {
    pub name: Option<String>,
    pub contact: Option<i64>,
    pub alt: Option<i64>,
    pub email: Option<String>,
    pub pan: Option<String>,
    pub aadhar: Option<i64>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub manager: Option<String>,
    pub partner_id: Option<i64>,
    pub remarks: Option<String>,
}

fn search_conditions(term: &str) -> Cond {
    let mut group = vec![
        Cond::Contains("name", term.to_string()),
        Cond::Contains("manager", term.to_string()),
        Cond::Contains("email", term.to_string()),
        Cond::Contains("pan", term.to_string()),
        Cond::Contains("address", term.to_string()),
        Cond::Contains("occupation", term.to_string()),
    ];
    if let Ok(n) = term.parse::<i64>() {
        group.push(Cond::Eq("contact", Value::Int(n)));
        group.push(Cond::Eq("alt", Value::Int(n)));
        group.push(Cond::Eq("aadhar", Value::Int(n)));
    }
    Cond::Any(group)
}

fn list_filter(q: &ListClientsQ) -> Filter {
    let mut f = Filter::new();
    if let Some(s) = &q.search {
        let s = s.trim();
        if !s.is_empty() {
            f.push(search_conditions(s));
        }
    }
    f.contains("name", &q.name);
    f.contains("manager", &q.manager);
    f.contains("occupation", &q.occupation);
    f.eq_int("contact", q.contact);
    f.contains("pan", &q.pan);
    f.eq_int("partner_id", q.partner_id);
    f.date_range("created_at::date", q.start_date, q.end_date);
    f
}

pub async fn list_clients(
    State(state): State<AppState>,
    Query(q): Query<ListClientsQ>,
) -> Result<Json<ClientPage>, ApiError> {
    let (page, limit, offset) = filter::page_window(q.page, q.limit);
    let f = list_filter(&q);
    let order = filter::sort_clause(
        SORTABLE,
        q.sort_by.as_deref(),
        q.sort_order.as_deref(),
        "created_at",
        "client_id",
    );

    let mut count_q = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM clients");
    f.apply(&mut count_q);
    let total: i64 = count_q.build_query_scalar().fetch_one(&state.pool).await?;

    let mut data_q = QueryBuilder::<Postgres>::new("SELECT * FROM clients");
    f.apply(&mut data_q);
    data_q.push(" ORDER BY ");
    data_q.push(order);
    data_q.push(" LIMIT ");
    data_q.push_bind(limit);
    data_q.push(" OFFSET ");
    data_q.push_bind(offset);
    let rows: Vec<Client> = data_q.build_query_as().fetch_all(&state.pool).await?;

    Ok(Json(ClientPage {
        success: true,
        data: rows,
        current_page: page,
        limit_number: limit,
        total_clients: total,
        total_pages: filter::total_pages(total, limit),
    }))
}

pub async fn get_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Client>>, ApiError> {
    let row = query_as::<_, Client>(r#"SELECT * FROM clients WHERE client_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("client"))?;
    Ok(ok(row))
}

pub async fn create_client(
    State(state): State<AppState>,
    Json(b): Json<CreateClientBody>,
) -> Result<Json<ApiData<Client>>, ApiError> {
    if b.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let row = query_as::<_, Client>(
        r#"
        INSERT INTO clients
            (name, contact, alt, email, pan, aadhar, address, occupation, manager, partner_id, remarks)
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
        RETURNING *
        "#,
    )
    .bind(b.name)
    .bind(b.contact)
    .bind(b.alt)
    .bind(b.email)
    .bind(b.pan)
    .bind(b.aadhar)
    .bind(b.address)
    .bind(b.occupation)
    .bind(b.manager)
    .bind(b.partner_id)
    .bind(b.remarks)
    .fetch_one(&state.pool)
    .await?;
    Ok(ok(row))
}

pub async fn update_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<UpdateClientBody>,
) -> Result<Json<ApiData<Client>>, ApiError> {
    let row = query_as::<_, Client>(
        r#"
        UPDATE clients SET
            name = COALESCE($2, name),
            contact = COALESCE($3, contact),
            alt = COALESCE($4, alt),
            email = COALESCE($5, email),
            pan = COALESCE($6, pan),
            aadhar = COALESCE($7, aadhar),
            address = COALESCE($8, address),
            occupation = COALESCE($9, occupation),
            manager = COALESCE($10, manager),
            partner_id = COALESCE($11, partner_id),
            remarks = COALESCE($12, remarks),
            updated_at = now()
        WHERE client_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name)
    .bind(b.contact)
    .bind(b.alt)
    .bind(b.email)
    .bind(b.pan)
    .bind(b.aadhar)
    .bind(b.address)
    .bind(b.occupation)
    .bind(b.manager)
    .bind(b.partner_id)
    .bind(b.remarks)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("client"))?;
    Ok(ok(row))
}

pub async fn delete_client(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Deleted>>, ApiError> {
    let res = query(r#"DELETE FROM clients WHERE client_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("client"));
    }
    Ok(ok(Deleted { deleted: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_covers_text_and_numeric_columns() {
        let Cond::Any(group) = search_conditions("9898989898") else {
            panic!("expected OR group");
        };
        assert!(group.contains(&Cond::Eq("contact", Value::Int(9_898_989_898))));
        assert!(group.contains(&Cond::Contains("name", "9898989898".into())));
    }

    #[test]
    fn partner_filter_is_exact() {
        let q: ListClientsQ = serde_json::from_value(json!({ "partnerId": 7 })).unwrap();
        let f = list_filter(&q);
        assert_eq!(f.conds(), &[Cond::Eq("partner_id", Value::Int(7))]);
    }
}
