// src/routes/client_partners.rs
//
// Channel partners plus their employees. Employees are a child table but the
// partner responses embed them wholesale, so reads group the two queries here
// rather than forcing a second round trip on the caller.

use std::collections::HashMap;

use axum::extract::{Path, State};
use serde::Deserialize;
use sqlx::{query, query_as, PgPool, Postgres, QueryBuilder};

use crate::db::filter::{self, Cond, Filter, Value};
use crate::models::{
    ok, ApiData, ClientPartner, Deleted, PartnerEmployee, PartnerPage, PartnerWithEmployees,
};
use crate::routes::{ApiError, Json, Query};
use crate::AppState;

const SORTABLE: &[(&str, &str)] = &[
    ("name", "name"),
    ("contactPerson", "contact_person"),
    ("createdAt", "created_at"),
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPartnersQ {
    pub search: Option<String>,
    pub name: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePartnerBody {
    pub name: String,
    pub contact_person: Option<String>,
    pub contact: Option<i64>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePartnerBody {
    pub name: Option<String>,
    pub contact_person: Option<String>,
    pub contact: Option<i64>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeBody {
    pub name: String,
    pub designation: Option<String>,
    pub contact: Option<i64>,
    pub email: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployeeBody {
    pub name: Option<String>,
    pub designation: Option<String>,
    pub contact: Option<i64>,
    pub email: Option<String>,
}

fn search_conditions(term: &str) -> Cond {
    let mut group = vec![
        Cond::Contains("name", term.to_string()),
        Cond::Contains("contact_person", term.to_string()),
        Cond::Contains("email", term.to_string()),
    ];
    if let Ok(n) = term.parse::<i64>() {
        group.push(Cond::Eq("contact", Value::Int(n)));
    }
    Cond::Any(group)
}

fn list_filter(q: &ListPartnersQ) -> Filter {
    let mut f = Filter::new();
    if let Some(s) = &q.search {
        let s = s.trim();
        if !s.is_empty() {
            f.push(search_conditions(s));
        }
    }
    f.contains("name", &q.name);
    f
}

async fn employees_of(pool: &PgPool, partner_id: i64) -> Result<Vec<PartnerEmployee>, sqlx::Error> {
    query_as::<_, PartnerEmployee>(
        r#"SELECT * FROM partner_employees WHERE partner_id = $1 ORDER BY employee_id"#,
    )
    .bind(partner_id)
    .fetch_all(pool)
    .await
}

pub async fn list_partners(
    State(state): State<AppState>,
    Query(q): Query<ListPartnersQ>,
) -> Result<Json<PartnerPage>, ApiError> {
    let (page, limit, offset) = filter::page_window(q.page, q.limit);
    let f = list_filter(&q);
    let order = filter::sort_clause(
        SORTABLE,
        q.sort_by.as_deref(),
        q.sort_order.as_deref(),
        "created_at",
        "partner_id",
    );

    let mut count_q = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM client_partners");
    f.apply(&mut count_q);
    let total: i64 = count_q.build_query_scalar().fetch_one(&state.pool).await?;

    let mut data_q = QueryBuilder::<Postgres>::new("SELECT * FROM client_partners");
    f.apply(&mut data_q);
    data_q.push(" ORDER BY ");
    data_q.push(order);
    data_q.push(" LIMIT ");
    data_q.push_bind(limit);
    data_q.push(" OFFSET ");
    data_q.push_bind(offset);
    let partners: Vec<ClientPartner> = data_q.build_query_as().fetch_all(&state.pool).await?;

    // One query for the whole page's employees, grouped in memory.
    let ids: Vec<i64> = partners.iter().map(|p| p.partner_id).collect();
    let employees: Vec<PartnerEmployee> = query_as(
        r#"SELECT * FROM partner_employees WHERE partner_id = ANY($1) ORDER BY employee_id"#,
    )
    .bind(&ids)
    .fetch_all(&state.pool)
    .await?;
    let mut by_partner: HashMap<i64, Vec<PartnerEmployee>> = HashMap::new();
    for e in employees {
        by_partner.entry(e.partner_id).or_default().push(e);
    }
    let data = partners
        .into_iter()
        .map(|partner| {
            let employees = by_partner.remove(&partner.partner_id).unwrap_or_default();
            PartnerWithEmployees { partner, employees }
        })
        .collect();

    Ok(Json(PartnerPage {
        success: true,
        data,
        current_page: page,
        limit_number: limit,
        total_partners: total,
        total_pages: filter::total_pages(total, limit),
    }))
}

pub async fn get_partner(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<PartnerWithEmployees>>, ApiError> {
    let partner = query_as::<_, ClientPartner>(
        r#"SELECT * FROM client_partners WHERE partner_id = $1"#,
    )
    .bind(id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("client partner"))?;
    let employees = employees_of(&state.pool, id).await?;
    Ok(ok(PartnerWithEmployees { partner, employees }))
}

pub async fn create_partner(
    State(state): State<AppState>,
    Json(b): Json<CreatePartnerBody>,
) -> Result<Json<ApiData<PartnerWithEmployees>>, ApiError> {
    if b.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let partner = query_as::<_, ClientPartner>(
        r#"
        INSERT INTO client_partners (name, contact_person, contact, email, address, remarks)
        VALUES ($1,$2,$3,$4,$5,$6)
        RETURNING *
        "#,
    )
    .bind(b.name)
    .bind(b.contact_person)
    .bind(b.contact)
    .bind(b.email)
    .bind(b.address)
    .bind(b.remarks)
    .fetch_one(&state.pool)
    .await?;
    Ok(ok(PartnerWithEmployees { partner, employees: Vec::new() }))
}

pub async fn update_partner(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<UpdatePartnerBody>,
) -> Result<Json<ApiData<PartnerWithEmployees>>, ApiError> {
    let partner = query_as::<_, ClientPartner>(
        r#"
        UPDATE client_partners SET
            name = COALESCE($2, name),
            contact_person = COALESCE($3, contact_person),
            contact = COALESCE($4, contact),
            email = COALESCE($5, email),
            address = COALESCE($6, address),
            remarks = COALESCE($7, remarks),
            updated_at = now()
        WHERE partner_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name)
    .bind(b.contact_person)
    .bind(b.contact)
    .bind(b.email)
    .bind(b.address)
    .bind(b.remarks)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("client partner"))?;
    let employees = employees_of(&state.pool, id).await?;
    Ok(ok(PartnerWithEmployees { partner, employees }))
}

pub async fn delete_partner(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Deleted>>, ApiError> {
    // employees go with the partner via ON DELETE CASCADE
    let res = query(r#"DELETE FROM client_partners WHERE partner_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("client partner"));
    }
    Ok(ok(Deleted { deleted: true }))
}

// ───────────────────────────────────────
// Nested employee routes
// ───────────────────────────────────────

async fn partner_exists(pool: &PgPool, id: i64) -> Result<(), ApiError> {
    let found: Option<i64> =
        sqlx::query_scalar(r#"SELECT partner_id FROM client_partners WHERE partner_id = $1"#)
            .bind(id)
            .fetch_optional(pool)
            .await?;
    found.map(|_| ()).ok_or_else(|| ApiError::not_found("client partner"))
}

pub async fn list_employees(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Vec<PartnerEmployee>>>, ApiError> {
    partner_exists(&state.pool, id).await?;
    let employees = employees_of(&state.pool, id).await?;
    Ok(ok(employees))
}

pub async fn add_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<CreateEmployeeBody>,
) -> Result<Json<ApiData<PartnerEmployee>>, ApiError> {
    partner_exists(&state.pool, id).await?;
    if b.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    let row = query_as::<_, PartnerEmployee>(
        r#"
        INSERT INTO partner_employees (partner_id, name, designation, contact, email)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name)
    .bind(b.designation)
    .bind(b.contact)
    .bind(b.email)
    .fetch_one(&state.pool)
    .await?;
    Ok(ok(row))
}

pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<UpdateEmployeeBody>,
) -> Result<Json<ApiData<PartnerEmployee>>, ApiError> {
    let row = query_as::<_, PartnerEmployee>(
        r#"
        UPDATE partner_employees SET
            name = COALESCE($2, name),
            designation = COALESCE($3, designation),
            contact = COALESCE($4, contact),
            email = COALESCE($5, email)
        WHERE employee_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.name)
    .bind(b.designation)
    .bind(b.contact)
    .bind(b.email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("employee"))?;
    Ok(ok(row))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Deleted>>, ApiError> {
    let res = query(r#"DELETE FROM partner_employees WHERE employee_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("employee"));
    }
    Ok(ok(Deleted { deleted: true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_covers_partner_columns() {
        let Cond::Any(group) = search_conditions("meridian") else {
            panic!("expected OR group");
        };
        assert_eq!(
            group,
            vec![
                Cond::Contains("name", "meridian".into()),
                Cond::Contains("contact_person", "meridian".into()),
                Cond::Contains("email", "meridian".into()),
            ]
        );
    }

    #[test]
    fn blank_search_is_ignored() {
        let q = ListPartnersQ {
            search: Some("   ".into()),
            name: None,
            page: None,
            limit: None,
            sort_by: None,
            sort_order: None,
        };
        assert!(list_filter(&q).is_empty());
    }
}
