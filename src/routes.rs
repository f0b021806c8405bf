use crate::handlers::{
    AppState, download_scan_results, get_scan, get_scan_stats, get_scan_vulnerabilities,
    list_scans, submit_scan,
};
use axum::{
    Router,
    routing::{get, post},
};

/// 创建API路由
pub fn create_api_routes() -> Router<AppState> {
    Router::new()
        // 扫描任务API
        .route("/api/scans", post(submit_scan)) // 提交扫描请求
        .route("/api/scans", get(list_scans)) // 任务列表
        .route("/api/scans/stats", get(get_scan_stats)) // 任务统计
        .route("/api/scans/{id}", get(get_scan)) // 任务详情
        .route(
            "/api/scans/{id}/vulnerabilities",
            get(get_scan_vulnerabilities),
        ) // 漏洞列表
        .route("/api/scans/{id}/results", get(download_scan_results)) // 原始结果下载
}
