//! HTTP处理器

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Json},
};
use pacs_core::StudyStore;
use pacs_triage::TriageService;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::error::ApiResult;

/// API根路径处理器
pub async fn api_root() -> impl IntoResponse {
    Json(json!({
        "service": "PACS Triage API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "studies": "/api/v1/studies",
            "study_detail": "/api/v1/studies/:study_id",
            "triage": "/api/v1/triage/:study_id"
        }
    }))
}

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 检查列表处理器
pub async fn get_studies<S: StudyStore + 'static>(
    State(service): State<Arc<TriageService<S>>>,
) -> ApiResult<impl IntoResponse> {
    let studies = service.list_studies().await?;

    Ok(Json(json!({
        "studies": studies,
        "total": studies.len()
    })))
}

/// 检查详情处理器，包含相似病例与最新分诊结论
pub async fn get_study_detail<S: StudyStore + 'static>(
    State(service): State<Arc<TriageService<S>>>,
    Path(study_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let detail = service.study_detail(&study_id).await?;
    Ok(Json(detail))
}

/// 分诊处理器
pub async fn triage_study<S: StudyStore + 'static>(
    State(service): State<Arc<TriageService<S>>>,
    Path(study_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    info!("Triage requested for study {}", study_id);
    let outcome = service.triage_study(&study_id).await?;

    Ok(Json(json!({
        "success": true,
        "triage": outcome.triage,
        "similar_cases_count": outcome.similar_cases_count
    })))
}
