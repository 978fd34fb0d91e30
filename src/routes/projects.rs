// src/routes/projects.rs
//
// Inventory: projects with nested wings, floors and units. Write bodies carry
// the whole tree and are applied in one transaction, with child positions
// taken from array order and unit spans clamped to what the floor has left.
// Also hosts the per-unit status endpoint and the availability-chart layout.

use std::collections::HashMap;

use axum::extract::{Path, State};
use serde::Deserialize;
use sqlx::{query, query_as, PgPool, Postgres, QueryBuilder, Transaction};

use crate::db::filter::{self, Cond, Filter};
use crate::layout::{self, LayoutDoc};
use crate::models::{
    ok, ApiData, Category, Deleted, Floor, FloorTree, Project, ProjectPage, ProjectTree, Unit,
    Wing, WingTree,
};
use crate::routes::{ApiError, Json, Query};
use crate::AppState;

const SORTABLE: &[(&str, &str)] = &[
    ("name", "name"),
    ("developer", "developer"),
    ("location", "location"),
    ("status", "status"),
    ("createdAt", "created_at"),
];

const PROJECT_STATUSES: &[&str] = &["planning", "under-construction", "completed"];
const PLACEMENTS: &[&str] = &["projectLevel", "wingLevel"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProjectsQ {
    pub search: Option<String>,
    pub name: Option<String>,
    pub developer: Option<String>,
    pub location: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBody {
    pub name: String,
    pub developer: Option<String>,
    pub location: Option<String>,
    #[serde(default = "default_project_status")]
    pub status: String,
    #[serde(default = "default_placement")]
    pub commercial_unit_placement: String,
    #[serde(default)]
    pub wings: Vec<WingBody>,
    #[serde(default)]
    pub commercial_floors: Vec<FloorBody>,
}
fn default_project_status() -> String { "planning".into() }
fn default_placement() -> String { "wingLevel".into() }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WingBody {
    pub name: String,
    pub units_per_floor: i32,
    pub header_floor_index: Option<i32>,
    #[serde(default)]
    pub floors: Vec<FloorBody>,
    #[serde(default)]
    pub commercial_floors: Vec<FloorBody>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorBody {
    #[serde(default)]
    pub display_number: i32,
    #[serde(default = "default_floor_type", rename = "type")]
    pub floor_type: String,
    #[serde(default)]
    pub show_area: bool,
    #[serde(default)]
    pub units: Vec<UnitBody>,
}
fn default_floor_type() -> String { "residential".into() }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitBody {
    pub unit_number: String,
    pub configuration: Option<String>,
    pub area: Option<f64>,
    #[serde(default = "default_span")]
    pub unit_span: i32,
    #[serde(default = "default_unit_status")]
    pub status: String,
    pub reserved_by_or_reason: Option<String>,
    pub reference_id: Option<i64>,
}
fn default_span() -> i32 { 1 }
fn default_unit_status() -> String { "available".into() }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStatusBody {
    pub status: String,
    pub reserved_by_or_reason: Option<String>,
    pub reference_id: Option<i64>,
}

fn search_conditions(term: &str) -> Cond {
    Cond::Any(vec![
        Cond::Contains("name", term.to_string()),
        Cond::Contains("developer", term.to_string()),
        Cond::Contains("location", term.to_string()),
    ])
}

fn list_filter(q: &ListProjectsQ) -> Filter {
    let mut f = Filter::new();
    if let Some(s) = &q.search {
        let s = s.trim();
        if !s.is_empty() {
            f.push(search_conditions(s));
        }
    }
    f.contains("name", &q.name);
    f.contains("developer", &q.developer);
    f.contains("location", &q.location);
    f.eq_text("status", &q.status);
    f
}

fn validate_project(b: &ProjectBody) -> Result<(), ApiError> {
    if b.name.trim().is_empty() {
        return Err(ApiError::validation("name is required"));
    }
    if !PROJECT_STATUSES.contains(&b.status.as_str()) {
        return Err(ApiError::validation(
            "status must be one of planning, under-construction, completed",
        ));
    }
    if !PLACEMENTS.contains(&b.commercial_unit_placement.as_str()) {
        return Err(ApiError::validation(
            "commercialUnitPlacement must be projectLevel or wingLevel",
        ));
    }
    for wing in &b.wings {
        if wing.name.trim().is_empty() {
            return Err(ApiError::validation("wing name is required"));
        }
        if wing.units_per_floor < 1 {
            return Err(ApiError::validation("unitsPerFloor must be at least 1"));
        }
    }
    Ok(())
}

/// Resolves the span a unit actually occupies. Regular wing floors clamp
/// against the wing capacity and accumulate; commercial floors have no
/// capacity and take the request as-is (min 1). `None` means the floor was
/// already full.
fn span_for(requested: i32, capacity: Option<i32>, used: &mut i32) -> Option<i32> {
    match capacity {
        Some(cap) => {
            let span = layout::clamp_span(requested, cap, *used)?;
            *used += span;
            Some(span)
        }
        None => Some(requested.max(1)),
    }
}

// ───────────────────────────────────────
// Tree writes
// ───────────────────────────────────────

async fn insert_floor(
    tx: &mut Transaction<'_, Postgres>,
    project_id: i64,
    wing_id: Option<i64>,
    section: &str,
    floor: &FloorBody,
    position: i32,
    capacity: Option<i32>,
) -> Result<(), ApiError> {
    let floor_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO floors (project_id, wing_id, section, display_number, type, show_area, position)
        VALUES ($1,$2,$3,$4,$5,$6,$7)
        RETURNING floor_id
        "#,
    )
    .bind(project_id)
    .bind(wing_id)
    .bind(section)
    .bind(floor.display_number)
    .bind(&floor.floor_type)
    .bind(floor.show_area)
    .bind(position)
    .fetch_one(&mut **tx)
    .await?;

    let mut used = 0;
    for (idx, unit) in floor.units.iter().enumerate() {
        let span = span_for(unit.unit_span, capacity, &mut used).ok_or_else(|| {
            ApiError::validation(format!(
                "floor {} is full; unit {} does not fit",
                floor.display_number, unit.unit_number
            ))
        })?;
        query(
            r#"
            INSERT INTO units
                (floor_id, unit_number, configuration, area, unit_span, status,
                 reserved_by_or_reason, reference_id, position)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
            "#,
        )
        .bind(floor_id)
        .bind(&unit.unit_number)
        .bind(&unit.configuration)
        .bind(unit.area)
        .bind(span)
        .bind(&unit.status)
        .bind(&unit.reserved_by_or_reason)
        .bind(unit.reference_id)
        .bind(idx as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

async fn insert_children(
    tx: &mut Transaction<'_, Postgres>,
    project_id: i64,
    wings: &[WingBody],
    commercial_floors: &[FloorBody],
) -> Result<(), ApiError> {
    for (wi, wing) in wings.iter().enumerate() {
        let wing_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO wings (project_id, name, units_per_floor, header_floor_index, position)
            VALUES ($1,$2,$3,$4,$5)
            RETURNING wing_id
            "#,
        )
        .bind(project_id)
        .bind(&wing.name)
        .bind(wing.units_per_floor)
        .bind(wing.header_floor_index)
        .bind(wi as i32)
        .fetch_one(&mut **tx)
        .await?;

        for (fi, floor) in wing.floors.iter().enumerate() {
            insert_floor(
                tx,
                project_id,
                Some(wing_id),
                "wing",
                floor,
                fi as i32,
                Some(wing.units_per_floor),
            )
            .await?;
        }
        for (fi, floor) in wing.commercial_floors.iter().enumerate() {
            insert_floor(tx, project_id, Some(wing_id), "wing-commercial", floor, fi as i32, None)
                .await?;
        }
    }
    for (fi, floor) in commercial_floors.iter().enumerate() {
        insert_floor(tx, project_id, None, "project-commercial", floor, fi as i32, None).await?;
    }
    Ok(())
}

// ───────────────────────────────────────
// Tree reads
// ───────────────────────────────────────

/// Wings in position order plus every floor with its units grouped in, two
/// indexed queries regardless of tree size.
async fn fetch_children(
    pool: &PgPool,
    project_id: i64,
) -> Result<(Vec<Wing>, Vec<(Floor, Vec<Unit>)>), sqlx::Error> {
    let wings: Vec<Wing> =
        query_as(r#"SELECT * FROM wings WHERE project_id = $1 ORDER BY position"#)
            .bind(project_id)
            .fetch_all(pool)
            .await?;
    let floors: Vec<Floor> =
        query_as(r#"SELECT * FROM floors WHERE project_id = $1 ORDER BY position"#)
            .bind(project_id)
            .fetch_all(pool)
            .await?;
    let floor_ids: Vec<i64> = floors.iter().map(|f| f.floor_id).collect();
    let units: Vec<Unit> =
        query_as(r#"SELECT * FROM units WHERE floor_id = ANY($1) ORDER BY position"#)
            .bind(&floor_ids)
            .fetch_all(pool)
            .await?;

    let mut by_floor: HashMap<i64, Vec<Unit>> = HashMap::new();
    for u in units {
        by_floor.entry(u.floor_id).or_default().push(u);
    }
    let floors = floors
        .into_iter()
        .map(|f| {
            let us = by_floor.remove(&f.floor_id).unwrap_or_default();
            (f, us)
        })
        .collect();
    Ok((wings, floors))
}

async fn load_tree(pool: &PgPool, project: Project) -> Result<ProjectTree, sqlx::Error> {
    let (wings, floors) = fetch_children(pool, project.project_id).await?;

    let mut wing_floors: HashMap<i64, Vec<FloorTree>> = HashMap::new();
    let mut wing_commercial: HashMap<i64, Vec<FloorTree>> = HashMap::new();
    let mut project_commercial = Vec::new();
    for (floor, units) in floors {
        let node = FloorTree { floor, units };
        match (node.floor.wing_id, node.floor.section.as_str()) {
            (Some(w), "wing") => wing_floors.entry(w).or_default().push(node),
            (Some(w), _) => wing_commercial.entry(w).or_default().push(node),
            (None, _) => project_commercial.push(node),
        }
    }

    let wings = wings
        .into_iter()
        .map(|wing| {
            let floors = wing_floors.remove(&wing.wing_id).unwrap_or_default();
            let commercial_floors = wing_commercial.remove(&wing.wing_id).unwrap_or_default();
            WingTree { wing, floors, commercial_floors }
        })
        .collect();

    Ok(ProjectTree { project, wings, commercial_floors: project_commercial })
}

// ───────────────────────────────────────
// Handlers
// ───────────────────────────────────────

pub async fn list_projects(
    State(state): State<AppState>,
    Query(q): Query<ListProjectsQ>,
) -> Result<Json<ProjectPage>, ApiError> {
    let (page, limit, offset) = filter::page_window(q.page, q.limit);
    let f = list_filter(&q);
    let order = filter::sort_clause(
        SORTABLE,
        q.sort_by.as_deref(),
        q.sort_order.as_deref(),
        "created_at",
        "project_id",
    );

    let mut count_q = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM projects");
    f.apply(&mut count_q);
    let total: i64 = count_q.build_query_scalar().fetch_one(&state.pool).await?;

    let mut data_q = QueryBuilder::<Postgres>::new("SELECT * FROM projects");
    f.apply(&mut data_q);
    data_q.push(" ORDER BY ");
    data_q.push(order);
    data_q.push(" LIMIT ");
    data_q.push_bind(limit);
    data_q.push(" OFFSET ");
    data_q.push_bind(offset);
    let rows: Vec<Project> = data_q.build_query_as().fetch_all(&state.pool).await?;

    Ok(Json(ProjectPage {
        success: true,
        data: rows,
        current_page: page,
        limit_number: limit,
        total_projects: total,
        total_pages: filter::total_pages(total, limit),
    }))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<ProjectTree>>, ApiError> {
    let project = query_as::<_, Project>(r#"SELECT * FROM projects WHERE project_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("project"))?;
    let tree = load_tree(&state.pool, project).await?;
    Ok(ok(tree))
}

pub async fn create_project(
    State(state): State<AppState>,
    Json(b): Json<ProjectBody>,
) -> Result<Json<ApiData<ProjectTree>>, ApiError> {
    validate_project(&b)?;
    let mut tx = state.pool.begin().await?;
    let project = query_as::<_, Project>(
        r#"
        INSERT INTO projects (name, developer, location, status, commercial_unit_placement)
        VALUES ($1,$2,$3,$4,$5)
        RETURNING *
        "#,
    )
    .bind(&b.name)
    .bind(&b.developer)
    .bind(&b.location)
    .bind(&b.status)
    .bind(&b.commercial_unit_placement)
    .fetch_one(&mut *tx)
    .await?;
    insert_children(&mut tx, project.project_id, &b.wings, &b.commercial_floors).await?;
    tx.commit().await?;

    let tree = load_tree(&state.pool, project).await?;
    Ok(ok(tree))
}

/// Whole-tree replacement: scalar columns are overwritten and the children are
/// deleted and re-inserted from the body, all in one transaction.
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<ProjectBody>,
) -> Result<Json<ApiData<ProjectTree>>, ApiError> {
    validate_project(&b)?;
    let mut tx = state.pool.begin().await?;
    let project = query_as::<_, Project>(
        r#"
        UPDATE projects SET
            name = $2, developer = $3, location = $4, status = $5,
            commercial_unit_placement = $6, updated_at = now()
        WHERE project_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&b.name)
    .bind(&b.developer)
    .bind(&b.location)
    .bind(&b.status)
    .bind(&b.commercial_unit_placement)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("project"))?;

    query(r#"DELETE FROM floors WHERE project_id = $1"#)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    query(r#"DELETE FROM wings WHERE project_id = $1"#)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    insert_children(&mut tx, id, &b.wings, &b.commercial_floors).await?;
    tx.commit().await?;

    let tree = load_tree(&state.pool, project).await?;
    Ok(ok(tree))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<Deleted>>, ApiError> {
    // wings, floors and units go with it via ON DELETE CASCADE
    let res = query(r#"DELETE FROM projects WHERE project_id = $1"#)
        .bind(id)
        .execute(&state.pool)
        .await?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("project"));
    }
    Ok(ok(Deleted { deleted: true }))
}

/// Direct status write on a unit. Absent optional fields clear the stored
/// values rather than keeping them, so releasing a unit is a plain
/// `{"status": "available"}`.
pub async fn set_unit_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(b): Json<UnitStatusBody>,
) -> Result<Json<ApiData<Unit>>, ApiError> {
    if b.status.trim().is_empty() {
        return Err(ApiError::validation("status is required"));
    }
    let mut tx = state.pool.begin().await?;
    let row = query_as::<_, Unit>(
        r#"
        UPDATE units
           SET status = $2, reserved_by_or_reason = $3, reference_id = $4
         WHERE unit_id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(&b.status)
    .bind(&b.reserved_by_or_reason)
    .bind(b.reference_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("unit"))?;

    query(
        r#"
        UPDATE projects SET updated_at = now()
         WHERE project_id = (SELECT project_id FROM floors WHERE floor_id = $1)
        "#,
    )
    .bind(row.floor_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(ok(row))
}

pub async fn project_layout(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiData<LayoutDoc>>, ApiError> {
    let project = query_as::<_, Project>(r#"SELECT * FROM projects WHERE project_id = $1"#)
        .bind(id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| ApiError::not_found("project"))?;
    let (wings, floors) = fetch_children(&state.pool, id).await?;
    let categories: Vec<Category> = query_as(r#"SELECT * FROM categories"#)
        .fetch_all(&state.pool)
        .await?;
    let legend = layout::legend(&categories);

    let mut wing_floors: HashMap<i64, Vec<(Floor, Vec<Unit>)>> = HashMap::new();
    let mut wing_commercial: HashMap<i64, Vec<(Floor, Vec<Unit>)>> = HashMap::new();
    let mut project_commercial: Vec<(Floor, Vec<Unit>)> = Vec::new();
    for (floor, units) in floors {
        match (floor.wing_id, floor.section.as_str()) {
            (Some(w), "wing") => wing_floors.entry(w).or_default().push((floor, units)),
            (Some(w), _) => wing_commercial.entry(w).or_default().push((floor, units)),
            (None, _) => project_commercial.push((floor, units)),
        }
    }

    let wing_layouts = wings
        .iter()
        .map(|wing| {
            let regular = wing_floors.remove(&wing.wing_id).unwrap_or_default();
            let commercial = wing_commercial.remove(&wing.wing_id).unwrap_or_default();
            layout::wing_layout(wing, &regular, &commercial, &legend)
        })
        .collect();

    let commercial_floors = project_commercial
        .iter()
        .map(|(floor, units)| layout::commercial_row(floor, units, &legend))
        .collect();

    Ok(ok(LayoutDoc {
        project_id: project.project_id,
        project_name: project.name,
        commercial_unit_placement: project.commercial_unit_placement,
        status_legend: legend,
        wings: wing_layouts,
        commercial_floors,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::filter::Value;
    use serde_json::json;

    fn body(v: serde_json::Value) -> ProjectBody {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn spans_accumulate_and_clamp_per_floor() {
        let mut used = 0;
        assert_eq!(span_for(2, Some(4), &mut used), Some(2));
        // only 2 slots left, so a request for 5 is cut down
        assert_eq!(span_for(5, Some(4), &mut used), Some(2));
        // floor full now
        assert_eq!(span_for(1, Some(4), &mut used), None);
    }

    #[test]
    fn commercial_floors_have_no_capacity() {
        let mut used = 0;
        assert_eq!(span_for(7, None, &mut used), Some(7));
        assert_eq!(span_for(0, None, &mut used), Some(1));
        assert_eq!(used, 0);
    }

    #[test]
    fn tree_body_defaults() {
        let b = body(json!({
            "name": "Skyline Heights",
            "wings": [{
                "name": "A",
                "unitsPerFloor": 4,
                "floors": [{ "units": [{ "unitNumber": "101" }] }]
            }]
        }));
        assert_eq!(b.status, "planning");
        assert_eq!(b.commercial_unit_placement, "wingLevel");
        let floor = &b.wings[0].floors[0];
        assert_eq!(floor.floor_type, "residential");
        assert_eq!(floor.display_number, 0);
        let unit = &floor.units[0];
        assert_eq!(unit.unit_span, 1);
        assert_eq!(unit.status, "available");
        assert!(validate_project(&b).is_ok());
    }

    #[test]
    fn invalid_enum_fields_are_rejected() {
        let b = body(json!({ "name": "X", "status": "launched" }));
        assert!(validate_project(&b).is_err());

        let b = body(json!({ "name": "X", "commercialUnitPlacement": "floorLevel" }));
        assert!(validate_project(&b).is_err());

        let b = body(json!({
            "name": "X",
            "wings": [{ "name": "A", "unitsPerFloor": 0 }]
        }));
        assert!(validate_project(&b).is_err());
    }

    #[test]
    fn status_filter_is_exact_and_search_is_grouped() {
        let q: ListProjectsQ = serde_json::from_value(json!({
            "search": "skyline",
            "status": "under-construction"
        }))
        .unwrap();
        let f = list_filter(&q);
        assert!(f
            .conds()
            .contains(&Cond::Eq("status", Value::Text("under-construction".into()))));
        assert!(f.conds().iter().any(|c| matches!(c, Cond::Any(_))));
    }
}
