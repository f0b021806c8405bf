use crate::{
    models::{
        CreateScanRequest, PagedResult, ScanJob, ScanJobFilter, ScanJobStats, ScanStatus,
        ScanSubmission, ScanType, Severity, Vulnerability,
    },
    response::ApiResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::scan_submission::submit_scan,
        crate::handlers::scan_query::get_scan,
        crate::handlers::scan_query::list_scans,
        crate::handlers::scan_query::get_scan_vulnerabilities,
        crate::handlers::scan_query::download_scan_results,
        crate::handlers::scan_query::get_scan_stats,
    ),
    components(
        schemas(
            ScanJob,
            ScanType,
            ScanStatus,
            ScanJobFilter,
            ScanJobStats,
            CreateScanRequest,
            ScanSubmission,
            Vulnerability,
            Severity,
            ApiResponse<ScanJob>,
            ApiResponse<ScanSubmission>,
            ApiResponse<ScanJobStats>,
            ApiResponse<Vec<Vulnerability>>,
            ApiResponse<PagedResult<ScanJob>>,
            PagedResult<ScanJob>,
        )
    ),
    tags(
        (name = "扫描任务", description = "扫描请求的提交、状态查询与结果下载"),
        (name = "系统监控", description = "系统健康状态检查")
    ),
    info(
        title = "ScanPipe API",
        version = "1.0.0",
        description = "ScanPipe 异步安全扫描平台 REST API 文档",
        contact(
            name = "ScanPipe Team",
            email = "contact@example.com"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "开发环境")
    )
)]
pub struct ApiDoc;
