// src/models/mod.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::routes::Json;

// ───────────────────────────────────────
// Response envelopes
// ───────────────────────────────────────
// Every success body is {"success": true, "data": …}; list endpoints add the
// pagination fields the admin tables read.

#[derive(Debug, Serialize)]
pub struct ApiData<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<ApiData<T>> {
    Json(ApiData {
        success: true,
        data,
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EoiPage {
    pub success: bool,
    pub data: Vec<Eoi>,
    pub current_page: i64,
    pub limit_number: i64,
    pub total_eois: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPage {
    pub success: bool,
    pub data: Vec<Client>,
    pub current_page: i64,
    pub limit_number: i64,
    pub total_clients: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPage {
    pub success: bool,
    pub data: Vec<Booking>,
    pub current_page: i64,
    pub limit_number: i64,
    pub total_bookings: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerPage {
    pub success: bool,
    pub data: Vec<PartnerWithEmployees>,
    pub current_page: i64,
    pub limit_number: i64,
    pub total_partners: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthLogPage {
    pub success: bool,
    pub data: Vec<AuthLog>,
    pub current_page: i64,
    pub limit_number: i64,
    pub total_logs: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
    pub success: bool,
    pub data: Vec<Project>,
    pub current_page: i64,
    pub limit_number: i64,
    pub total_projects: i64,
    pub total_pages: i64,
}

// ───────────────────────────────────────
// Sales records
// ───────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Eoi {
    pub eoi_id: i64,
    pub eoi_no: i64,
    pub eoi_date: NaiveDate,
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
    pub eoi_amt: f64,
    pub payment_mode: Option<String>,
    pub status: String, // active | converted | cancelled
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub client_id: i64,
    pub name: String,
    pub contact: Option<i64>,
    pub alt: Option<i64>,
    pub email: Option<String>,
    pub pan: Option<String>,
    pub aadhar: Option<i64>,
    pub address: Option<String>,
    pub occupation: Option<String>,
    pub manager: Option<String>,
    pub partner_id: Option<i64>, // referring client partner
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub booking_id: i64,
    pub booking_no: i64,
    pub booking_date: NaiveDate,
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
    pub agreement_value: f64,
    pub unit_id: Option<i64>, // loose link into the inventory tree
    pub status: String,       // booked | registered | cancelled
    pub cancel_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Client partners & their employees
// ───────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClientPartner {
    pub partner_id: i64,
    pub name: String,
    pub contact_person: Option<String>,
    pub contact: Option<i64>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PartnerEmployee {
    pub employee_id: i64,
    pub partner_id: i64,
    pub name: String,
    pub designation: Option<String>,
    pub contact: Option<i64>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerWithEmployees {
    #[serde(flatten)]
    pub partner: ClientPartner,
    pub employees: Vec<PartnerEmployee>,
}

// ───────────────────────────────────────
// Auth logs & categories
// ───────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuthLog {
    pub log_id: i64,
    pub user_name: String,
    pub email: Option<String>,
    pub action: String, // login | logout | login-failed
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Unit-status taxonomy entry. `name` is the machine key units store in their
/// `status` column; `immutable` rows are system statuses and cannot be
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub category_id: i64,
    pub name: String,
    pub display_name: String,
    pub color_hex: String,
    pub precedence: i32,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub category_type: String, // mutable | immutable
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ───────────────────────────────────────
// Inventory rows
// ───────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub project_id: i64,
    pub name: String,
    pub developer: Option<String>,
    pub location: Option<String>,
    pub status: String, // planning | under-construction | completed
    pub commercial_unit_placement: String, // projectLevel | wingLevel
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Wing {
    pub wing_id: i64,
    pub project_id: i64,
    pub name: String,
    pub units_per_floor: i32,
    pub header_floor_index: Option<i32>, // index into the wing's regular floors
    pub position: i32,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Floor {
    pub floor_id: i64,
    pub project_id: i64,
    pub wing_id: Option<i64>,
    pub section: String, // wing | wing-commercial | project-commercial
    pub display_number: i32, // 0 = ground
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub floor_type: String, // residential | commercial
    pub show_area: bool,
    pub position: i32,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub unit_id: i64,
    pub floor_id: i64,
    pub unit_number: String,
    pub configuration: Option<String>, // e.g. "1bhk", "shop"
    pub area: Option<f64>,
    pub unit_span: i32, // layout slots occupied, out of the wing's unitsPerFloor
    pub status: String, // category name, string-coupled (no FK)
    pub reserved_by_or_reason: Option<String>,
    pub reference_id: Option<i64>, // loose link to a booking/client record
    pub position: i32,
}

// ───────────────────────────────────────
// Assembled inventory tree (GET/POST/PUT project responses)
// ───────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorTree {
    #[serde(flatten)]
    pub floor: Floor,
    pub units: Vec<Unit>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WingTree {
    #[serde(flatten)]
    pub wing: Wing,
    pub floors: Vec<FloorTree>,
    pub commercial_floors: Vec<FloorTree>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTree {
    #[serde(flatten)]
    pub project: Project,
    pub wings: Vec<WingTree>,
    pub commercial_floors: Vec<FloorTree>,
}
