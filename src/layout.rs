// src/layout.rs
//
// Availability-chart layout math. A wing renders as a fixed-width grid: the
// designated header floor's units define the column template (widths
// proportional to their spans), floor rows chunk into pages by orientation,
// and unit cells resolve their color through the category legend.

use serde::Serialize;

use crate::models::{Category, Floor, Unit, Wing};

pub const TOTAL_WIDTH: f64 = 100.0;
pub const LANDSCAPE_THRESHOLD: i32 = 10;
pub const FLOORS_PER_PAGE_PORTRAIT: usize = 16;
pub const FLOORS_PER_PAGE_LANDSCAPE: usize = 11;
/// Cells whose status has no matching category render neutral grey.
pub const FALLBACK_COLOR: &str = "#9ca3af";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

pub fn orientation_for(units_per_floor: i32) -> Orientation {
    if units_per_floor > LANDSCAPE_THRESHOLD {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    }
}

pub fn floors_per_page(orientation: Orientation) -> usize {
    match orientation {
        Orientation::Portrait => FLOORS_PER_PAGE_PORTRAIT,
        Orientation::Landscape => FLOORS_PER_PAGE_LANDSCAPE,
    }
}

/// Widths proportional to each span's share of the span total.
pub fn column_widths(spans: &[i32], total_width: f64) -> Vec<f64> {
    let span_total: i32 = spans.iter().sum();
    if span_total <= 0 {
        return Vec::new();
    }
    let slot = total_width / f64::from(span_total);
    spans.iter().map(|s| slot * f64::from(*s)).collect()
}

/// Equal-width fallback for wings without a designated header floor.
pub fn equal_columns(units_per_floor: i32, total_width: f64) -> Vec<f64> {
    if units_per_floor <= 0 {
        return Vec::new();
    }
    vec![total_width / f64::from(units_per_floor); units_per_floor as usize]
}

/// Clamps a requested span to the floor's remaining capacity; `used` is the
/// span total already placed on the floor. `None` means the floor is full.
/// The result never exceeds the remaining capacity and never goes below 1.
pub fn clamp_span(requested: i32, units_per_floor: i32, used: i32) -> Option<i32> {
    let remaining = units_per_floor - used;
    if remaining <= 0 {
        return None;
    }
    Some(requested.max(1).min(remaining))
}

// ───────────────────────────────────────
// Layout document (GET /projects/:id/layout)
// ───────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDoc {
    pub project_id: i64,
    pub project_name: String,
    pub commercial_unit_placement: String,
    pub status_legend: Vec<LegendEntry>,
    pub wings: Vec<WingLayout>,
    /// Project-level commercial floors (empty under `wingLevel` placement).
    pub commercial_floors: Vec<FloorRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    pub name: String,
    pub display_name: String,
    pub color_hex: String,
    pub precedence: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WingLayout {
    pub wing_id: i64,
    pub name: String,
    pub units_per_floor: i32,
    pub orientation: Orientation,
    pub floors_per_page: usize,
    /// Header template: one entry per header-floor unit, or `unitsPerFloor`
    /// unlabeled equal columns when no header floor is designated.
    pub columns: Vec<ColumnSpec>,
    /// Regular floors, top display number first, chunked per page.
    pub pages: Vec<Vec<FloorRow>>,
    pub commercial_floors: Vec<FloorRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub width: f64,
    pub unit_number: Option<String>,
    pub configuration: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorRow {
    pub floor_id: i64,
    pub display_number: i32,
    #[serde(rename = "type")]
    pub floor_type: String,
    pub show_area: bool,
    pub cells: Vec<UnitCell>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitCell {
    pub unit_id: i64,
    pub unit_number: String,
    pub configuration: Option<String>,
    pub area: Option<f64>,
    pub span: i32,
    pub width: f64,
    pub status: String,
    pub color_hex: String,
    pub reserved_by_or_reason: Option<String>,
}

/// Categories ordered by precedence, then recency for ties.
pub fn legend(categories: &[Category]) -> Vec<LegendEntry> {
    let mut sorted: Vec<&Category> = categories.iter().collect();
    sorted.sort_by(|a, b| {
        a.precedence
            .cmp(&b.precedence)
            .then(b.created_at.cmp(&a.created_at))
    });
    sorted
        .into_iter()
        .map(|c| LegendEntry {
            name: c.name.clone(),
            display_name: c.display_name.clone(),
            color_hex: c.color_hex.clone(),
            precedence: c.precedence,
        })
        .collect()
}

fn color_for(legend: &[LegendEntry], status: &str) -> String {
    legend
        .iter()
        .find(|entry| entry.name == status)
        .map(|entry| entry.color_hex.clone())
        .unwrap_or_else(|| FALLBACK_COLOR.to_string())
}

fn cells(units: &[Unit], slot: f64, legend: &[LegendEntry]) -> Vec<UnitCell> {
    units
        .iter()
        .map(|u| UnitCell {
            unit_id: u.unit_id,
            unit_number: u.unit_number.clone(),
            configuration: u.configuration.clone(),
            area: u.area,
            span: u.unit_span,
            width: slot * f64::from(u.unit_span),
            status: u.status.clone(),
            color_hex: color_for(legend, &u.status),
            reserved_by_or_reason: u.reserved_by_or_reason.clone(),
        })
        .collect()
}

fn floor_row(floor: &Floor, units: &[Unit], slot: f64, legend: &[LegendEntry]) -> FloorRow {
    FloorRow {
        floor_id: floor.floor_id,
        display_number: floor.display_number,
        floor_type: floor.floor_type.clone(),
        show_area: floor.show_area,
        cells: cells(units, slot, legend),
    }
}

/// Commercial floors fill the page width against their own span total
/// (falling back to the unit count when spans are zeroed out).
pub fn commercial_row(floor: &Floor, units: &[Unit], legend: &[LegendEntry]) -> FloorRow {
    let span_total: i32 = units.iter().map(|u| u.unit_span).sum();
    let basis = if span_total > 0 {
        span_total
    } else {
        units.len() as i32
    };
    let slot = if basis > 0 {
        TOTAL_WIDTH / f64::from(basis)
    } else {
        0.0
    };
    floor_row(floor, units, slot, legend)
}

/// Lays out one wing: header column template, regular floors top-first and
/// chunked into pages, wing-level commercial floors below.
pub fn wing_layout(
    wing: &Wing,
    floors: &[(Floor, Vec<Unit>)],
    commercial: &[(Floor, Vec<Unit>)],
    legend: &[LegendEntry],
) -> WingLayout {
    let orientation = orientation_for(wing.units_per_floor);
    let per_page = floors_per_page(orientation);

    let header = wing
        .header_floor_index
        .and_then(|i| usize::try_from(i).ok())
        .and_then(|i| floors.get(i));

    let header_spans: Vec<i32> = header
        .map(|(_, units)| units.iter().map(|u| u.unit_span).collect())
        .unwrap_or_default();
    let header_span_total: i32 = header_spans.iter().sum();

    let (slot, columns) = if header_span_total > 0 {
        let slot = TOTAL_WIDTH / f64::from(header_span_total);
        let columns = header
            .map(|(_, units)| {
                units
                    .iter()
                    .map(|u| ColumnSpec {
                        width: slot * f64::from(u.unit_span),
                        unit_number: Some(u.unit_number.clone()),
                        configuration: u.configuration.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        (slot, columns)
    } else {
        let slot = if wing.units_per_floor > 0 {
            TOTAL_WIDTH / f64::from(wing.units_per_floor)
        } else {
            0.0
        };
        let columns = equal_columns(wing.units_per_floor, TOTAL_WIDTH)
            .into_iter()
            .map(|width| ColumnSpec {
                width,
                unit_number: None,
                configuration: None,
            })
            .collect();
        (slot, columns)
    };

    let mut ordered: Vec<&(Floor, Vec<Unit>)> = floors.iter().collect();
    ordered.sort_by(|a, b| {
        b.0.display_number
            .cmp(&a.0.display_number)
            .then(a.0.position.cmp(&b.0.position))
    });

    let rows: Vec<FloorRow> = ordered
        .into_iter()
        .map(|(floor, units)| floor_row(floor, units, slot, legend))
        .collect();

    let pages = rows.chunks(per_page).map(|chunk| chunk.to_vec()).collect();

    WingLayout {
        wing_id: wing.wing_id,
        name: wing.name.clone(),
        units_per_floor: wing.units_per_floor,
        orientation,
        floors_per_page: per_page,
        columns,
        pages,
        commercial_floors: commercial
            .iter()
            .map(|(floor, units)| commercial_row(floor, units, legend))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn category(name: &str, color: &str, precedence: i32, age_secs: i64) -> Category {
        Category {
            category_id: precedence as i64 + 1,
            name: name.to_string(),
            display_name: name.to_string(),
            color_hex: color.to_string(),
            precedence,
            category_type: "immutable".to_string(),
            created_at: Utc::now() - Duration::seconds(age_secs),
            updated_at: Utc::now(),
        }
    }

    fn wing(units_per_floor: i32, header_floor_index: Option<i32>) -> Wing {
        Wing {
            wing_id: 1,
            project_id: 1,
            name: "A".to_string(),
            units_per_floor,
            header_floor_index,
            position: 0,
        }
    }

    fn floor(id: i64, display_number: i32) -> Floor {
        Floor {
            floor_id: id,
            project_id: 1,
            wing_id: Some(1),
            section: "wing".to_string(),
            display_number,
            floor_type: "residential".to_string(),
            show_area: false,
            position: display_number,
        }
    }

    fn unit(id: i64, span: i32, status: &str) -> Unit {
        Unit {
            unit_id: id,
            floor_id: 1,
            unit_number: format!("{id:03}"),
            configuration: Some("1bhk".to_string()),
            area: Some(450.0),
            unit_span: span,
            status: status.to_string(),
            reserved_by_or_reason: None,
            reference_id: None,
            position: id as i32,
        }
    }

    #[test]
    fn orientation_threshold_at_ten() {
        assert_eq!(orientation_for(10), Orientation::Portrait);
        assert_eq!(orientation_for(11), Orientation::Landscape);
        assert_eq!(floors_per_page(Orientation::Portrait), 16);
        assert_eq!(floors_per_page(Orientation::Landscape), 11);
    }

    #[test]
    fn column_widths_are_proportional_to_spans() {
        assert_eq!(column_widths(&[2, 1, 1], 100.0), vec![50.0, 25.0, 25.0]);
        assert_eq!(column_widths(&[], 100.0), Vec::<f64>::new());
    }

    #[test]
    fn equal_columns_fall_back_to_units_per_floor() {
        assert_eq!(equal_columns(4, 100.0), vec![25.0; 4]);
        assert!(equal_columns(0, 100.0).is_empty());
    }

    #[test]
    fn span_clamps_to_remaining_capacity() {
        // 7 of 10 slots used: asking for 5 yields the remaining 3, not 5.
        assert_eq!(clamp_span(5, 10, 7), Some(3));
        assert_eq!(clamp_span(2, 10, 7), Some(2));
        assert_eq!(clamp_span(0, 10, 7), Some(1));
        assert_eq!(clamp_span(1, 10, 10), None);
    }

    #[test]
    fn legend_orders_by_precedence_then_recency() {
        let older = category("booked", "#f87171", 1, 500);
        let newer = category("hold", "#a78bfa", 1, 5);
        let first = category("available", "#4ade80", 0, 1000);
        let l = legend(&[older.clone(), first.clone(), newer.clone()]);
        let names: Vec<&str> = l.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["available", "hold", "booked"]);
    }

    #[test]
    fn unknown_status_renders_fallback_color() {
        let l = legend(&[category("available", "#4ade80", 0, 0)]);
        assert_eq!(color_for(&l, "available"), "#4ade80");
        assert_eq!(color_for(&l, "mystery"), FALLBACK_COLOR);
    }

    #[test]
    fn wing_layout_uses_header_floor_template() {
        let w = wing(4, Some(0));
        let floors = vec![
            (floor(1, 0), vec![unit(1, 2, "available"), unit(2, 1, "booked"), unit(3, 1, "available")]),
            (floor(2, 1), vec![unit(4, 4, "reserved")]),
        ];
        let l = legend(&[
            category("available", "#4ade80", 0, 0),
            category("booked", "#f87171", 2, 0),
        ]);

        let out = wing_layout(&w, &floors, &[], &l);
        assert_eq!(out.orientation, Orientation::Portrait);
        assert_eq!(out.floors_per_page, 16);

        let widths: Vec<f64> = out.columns.iter().map(|c| c.width).collect();
        assert_eq!(widths, vec![50.0, 25.0, 25.0]);
        assert_eq!(out.columns[0].unit_number.as_deref(), Some("001"));

        // one page, top display number first
        assert_eq!(out.pages.len(), 1);
        let rows = &out.pages[0];
        assert_eq!(rows[0].display_number, 1);
        assert_eq!(rows[1].display_number, 0);

        // the full-width unit on floor 1 spans all four slots
        assert_eq!(rows[0].cells[0].width, 100.0);
        assert_eq!(rows[0].cells[0].color_hex, FALLBACK_COLOR); // "reserved" not in legend
    }

    #[test]
    fn wing_without_header_gets_equal_columns() {
        let w = wing(5, None);
        let floors = vec![(floor(1, 0), vec![unit(1, 2, "available")])];
        let out = wing_layout(&w, &floors, &[], &[]);
        assert_eq!(out.columns.len(), 5);
        assert!(out.columns.iter().all(|c| c.unit_number.is_none()));
        assert_eq!(out.columns[0].width, 20.0);
        // cell width derives from the equal slot
        assert_eq!(out.pages[0][0].cells[0].width, 40.0);
    }

    #[test]
    fn floors_chunk_into_pages_by_orientation() {
        let w = wing(12, None); // landscape, 11 per page
        let floors: Vec<(Floor, Vec<Unit>)> =
            (0..25).map(|i| (floor(i as i64 + 1, i), vec![])).collect();
        let out = wing_layout(&w, &floors, &[], &[]);
        assert_eq!(out.orientation, Orientation::Landscape);
        let sizes: Vec<usize> = out.pages.iter().map(|p| p.len()).collect();
        assert_eq!(sizes, vec![11, 11, 3]);
        // first row of the first page is the top floor
        assert_eq!(out.pages[0][0].display_number, 24);
    }

    #[test]
    fn commercial_row_fills_width_from_own_spans() {
        let f = floor(9, 0);
        let units = vec![unit(1, 3, "available"), unit(2, 1, "available")];
        let row = commercial_row(&f, &units, &[]);
        assert_eq!(row.cells[0].width, 75.0);
        assert_eq!(row.cells[1].width, 25.0);
    }
}
