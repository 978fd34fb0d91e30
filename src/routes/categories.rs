// src/routes/categories.rs
//
// Unit-status taxonomy. Small enough that the list endpoint returns everything
// in display order; ordering is precedence first, newest first within a tie.
// The rows seeded by the migration (available/reserved/booked) are immutable:
// workflows write those status strings onto units, so they cannot be deleted.

use axum::extract::{Path, State};
use serde::Deserialize;
use sqlx::{query, query_as};

use crate::models::{ok, ApiData, Category, Deleted};
use crate::routes::{ApiError, Json};
use crate::AppState;

const ORDERED: &str = r#"SELECT * FROM categories ORDER BY precedence ASC, created_at DESC"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryBody {
    pub name: String,
    pub display_name: String,
    pub color_hex: String,
    pub precedence: Option<i32>,
    #[serde(default = "default_type", rename = "type")]
    pub category_type: String,
}
fn default_type() -> String { "mutable".into() }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryBody {
    pub display_name: Option<String>,
    pub color_hex: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecedenceItem {
    pub id: i64,
    pub precedence: i32,
}

fn validate_type(t: &str) -> Result<(), ApiError> {
    if t == "mutable" || t == "immutable" {
        return Ok(());
    }
    Err(ApiError::validation("type must be mutable or immutable"))
}

fn deletable(cat: &Category) -> Result<(), ApiError> {
    if cat.category_type == "immutable" {
        return Err(ApiError::validation("immutable categories cannot be deleted"));
    }
    Ok(())
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiData<Vec<Category>>>, ApiError> {
    let rows = query_as::<_, Category>(ORDERED).fetch_all(&state.pool).await?;
    Ok(ok(rows))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(b): Json<CreateCategoryBody>,
) -> Result<Json<ApiData<Category>>, ApiError> {
    if b.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    validate_type(&b.category_type)?;
    // omitted precedence puts the category at the end of the current order
    let row = query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, display_name, color_hex, precedence, type)
        VALUES ($1, $2, $3,
                COALESCE($4, (SELECT COALESCE(MAX(precedence) + 1, 0) FROM categories)),
                $5)
        RETURNING *
        "#,
    )
    .bind(b.name)
    .bind(b.display_name)
    .bind(b.color_hex)
    .bind(b.precedence)
    .bind(b.category_type)
    .fetch_one(&state.pool)
    .await?;
    Ok(ok(row))
}

/// The machine name and type are fixed after create; only the presentation
/// fields move here.
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<UpdateCategoryBody>,
) -> Result<Json<ApiData<Category>>, ApiError> {
    let row = query_as::<_, Category>(
        r#"
        UPDATE categories SET
            display_name = COALESCE($2, display_name),
            color_hex = COALESCE($3, color_hex),
            updated_at = now()
        WHERE category_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(b.display_name)
    .bind(b.color_hex)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::not_found("category"))?;
    Ok(ok(row))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Deleted>>, ApiError> {
    let cat = query_as::<_, Category>(r#"SELECT * FROM categories WHERE category_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("category"))?;
    deletable(&cat)?;
    query(r#"DELETE FROM categories WHERE category_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    Ok(ok(Deleted { deleted: true }))
}

/// Batch precedence rewrite from a drag-reorder: all rows move or none do.
pub async fn reorder_categories(
    State(state): State<AppState>,
    Json(items): Json<Vec<PrecedenceItem>>,
) -> Result<Json<ApiData<Vec<Category>>>, ApiError> {
    let mut tx = state.pool.begin().await?;
    for item in &items {
        let res = query(
            r#"UPDATE categories SET precedence = $2, updated_at = now() WHERE category_id = $1"#,
        )
        .bind(item.id)
        .bind(item.precedence)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() == 0 {
            return Err(ApiError::not_found("category"));
        }
    }
    tx.commit().await?;

    let rows = query_as::<_, Category>(ORDERED).fetch_all(&state.pool).await?;
    Ok(ok(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn type_values_are_constrained() {
        assert!(validate_type("mutable").is_ok());
        assert!(validate_type("immutable").is_ok());
        assert!(validate_type("system").is_err());
    }

    #[test]
    fn create_body_defaults_to_mutable() {
        let b: CreateCategoryBody = serde_json::from_value(json!({
            "name": "on-hold",
            "displayName": "On Hold",
            "colorHex": "#94a3b8"
        }))
        .unwrap();
        assert_eq!(b.category_type, "mutable");
        assert!(b.precedence.is_none());
    }

    #[test]
    fn precedence_batch_parses() {
        let items: Vec<PrecedenceItem> = serde_json::from_value(json!([
            { "id": 3, "precedence": 0 },
            { "id": 1, "precedence": 1 }
        ]))
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, 3);
        assert_eq!(items[0].precedence, 0);
    }

    fn sample(category_type: &str) -> Category {
        Category {
            category_id: 1,
            name: "available".into(),
            display_name: "Available".into(),
            color_hex: "#4ade80".into(),
            precedence: 0,
            category_type: category_type.into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn seeded_rows_cannot_be_deleted() {
        let err = deletable(&sample("immutable")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(deletable(&sample("mutable")).is_ok());
    }
}
