use crate::{
    error::AppError,
    handlers::AppState,
    models::{
        PagedResult, Pagination, ScanJob, ScanJobFilter, ScanJobStats, ScanStatus, ScanType,
        Vulnerability,
    },
    response::ApiResponse,
    storage::{ObjectStorage, result_object_key},
};
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// 任务列表查询参数
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListScansQuery {
    pub status: Option<ScanStatus>,
    #[serde(rename = "type")]
    pub scan_type: Option<ScanType>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

/// 查询单个扫描任务
#[utoipa::path(
    get,
    path = "/api/scans/{id}",
    params(("id" = Uuid, Path, description = "扫描任务ID")),
    responses(
        (status = 200, description = "任务详情", body = ApiResponse<ScanJob>),
        (status = 404, description = "任务不存在")
    ),
    tag = "扫描任务"
)]
pub async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<ScanJob>, AppError> {
    let job = state
        .scan_jobs
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("扫描任务 {}", id)))?;

    Ok(ApiResponse::success(job))
}

/// 分页查询扫描任务列表
#[utoipa::path(
    get,
    path = "/api/scans",
    params(ListScansQuery),
    responses(
        (status = 200, description = "任务列表", body = ApiResponse<PagedResult<ScanJob>>)
    ),
    tag = "扫描任务"
)]
pub async fn list_scans(
    State(state): State<AppState>,
    Query(query): Query<ListScansQuery>,
) -> Result<ApiResponse<PagedResult<ScanJob>>, AppError> {
    let filter = ScanJobFilter {
        status: query.status,
        scan_type: query.scan_type,
    };
    let pagination = Pagination {
        page: query.page.unwrap_or(1),
        page_size: query.page_size.unwrap_or(20),
    };

    let result = state.scan_jobs.list(&filter, &pagination).await?;
    Ok(ApiResponse::success(result))
}

/// 查询任务的漏洞列表
#[utoipa::path(
    get,
    path = "/api/scans/{id}/vulnerabilities",
    params(("id" = Uuid, Path, description = "扫描任务ID")),
    responses(
        (status = 200, description = "漏洞列表", body = ApiResponse<Vec<Vulnerability>>),
        (status = 404, description = "任务不存在")
    ),
    tag = "扫描任务"
)]
pub async fn get_scan_vulnerabilities(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Vec<Vulnerability>>, AppError> {
    // 先确认任务存在，避免把空列表和任务不存在混为一谈
    state
        .scan_jobs
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("扫描任务 {}", id)))?;

    let vulnerabilities = state.vulnerabilities.list_by_job(id).await?;
    Ok(ApiResponse::success(vulnerabilities))
}

/// 下载原始扫描结果（扫描器的未修改输出）
#[utoipa::path(
    get,
    path = "/api/scans/{id}/results",
    params(("id" = Uuid, Path, description = "扫描任务ID")),
    responses(
        (status = 200, description = "原始扫描结果JSON"),
        (status = 404, description = "任务不存在或尚未完成")
    ),
    tag = "扫描任务"
)]
pub async fn download_scan_results(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let job = state
        .scan_jobs
        .get(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("扫描任务 {}", id)))?;

    if job.status != ScanStatus::Completed {
        return Err(AppError::not_found(format!("扫描任务 {} 的结果", id)));
    }

    let data = state
        .storage
        .download(&state.config.storage.bucket, &result_object_key(id))
        .await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        data,
    )
        .into_response())
}

/// 按状态统计任务数
#[utoipa::path(
    get,
    path = "/api/scans/stats",
    responses(
        (status = 200, description = "任务统计", body = ApiResponse<ScanJobStats>)
    ),
    tag = "扫描任务"
)]
pub async fn get_scan_stats(
    State(state): State<AppState>,
) -> Result<ApiResponse<ScanJobStats>, AppError> {
    let stats = state.scan_jobs.stats().await?;
    Ok(ApiResponse::success(stats))
}
