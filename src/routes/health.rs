// src/routes/health.rs

use serde::Serialize;

use crate::routes::Json;

#[derive(Serialize)]
pub struct HealthResp { pub status: &'static str, pub version: &'static str }

pub async fn health() -> Json<HealthResp> {
    Json(HealthResp { status: "ok", version: "v1" })
}
