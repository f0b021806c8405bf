use crate::{
    error::{AppError, AppResult},
    handlers::AppState,
    models::{CreateScanRequest, ScanSubmission, ScanType},
    queue::{ScanMessage, ScanQueue},
    repositories::ScanJobStore,
    response::ApiResponse,
};
use axum::extract::{Json, State};
use uuid::Uuid;

/// 校验并规范化扫描请求
///
/// 不带tag也不带digest的镜像引用补上:latest。
pub(crate) fn validate_scan_request(request: &CreateScanRequest) -> AppResult<(ScanType, String)> {
    let type_str = request
        .scan_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("缺少必填字段: type 和 target"))?;
    let target = request
        .target
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("缺少必填字段: type 和 target"))?;

    let scan_type = ScanType::parse(type_str)
        .ok_or_else(|| AppError::validation("无效的扫描类型，必须为 docker-image 或 web-url"))?;

    let target = match scan_type {
        ScanType::DockerImage => normalize_image_target(target),
        ScanType::WebUrl => target.to_string(),
    };

    Ok((scan_type, target))
}

/// 镜像引用规范化：既无tag分隔符也无digest分隔符时默认latest
fn normalize_image_target(target: &str) -> String {
    if target.contains(':') || target.contains('@') {
        target.to_string()
    } else {
        format!("{}:latest", target)
    }
}

/// 提交流程的核心：校验 → 写任务行 → 入队
///
/// 先写任务行再入队：宁可出现有行无消息（任务停留在queued），
/// 也不能让工作进程收到查不到行的消息。两个写入没有两阶段提交，
/// 中途失败由调用方整体重试。校验失败时不产生任何副作用。
pub(crate) async fn create_and_enqueue(
    jobs: &dyn ScanJobStore,
    queue: &dyn ScanQueue,
    request: &CreateScanRequest,
) -> AppResult<ScanSubmission> {
    let (scan_type, target) = validate_scan_request(request)?;

    // 随机ID，碰撞概率可忽略，不做唯一性探测
    let job_id = Uuid::new_v4();

    tracing::info!(
        "收到扫描请求: job_id={}, type={}, target={}",
        job_id,
        scan_type.as_str(),
        target
    );

    let job = jobs.create(job_id, scan_type, &target).await?;

    let message = ScanMessage {
        scan_id: job_id,
        scan_type: scan_type.as_str().to_string(),
        target: target.clone(),
        created_at: job.created_at,
    };
    queue.send(&message).await?;

    Ok(ScanSubmission {
        job_id,
        status: job.status,
        scan_type,
        target,
    })
}

/// 提交扫描请求
#[utoipa::path(
    post,
    path = "/api/scans",
    request_body = CreateScanRequest,
    responses(
        (status = 202, description = "扫描请求已入队", body = ApiResponse<ScanSubmission>),
        (status = 400, description = "请求参数错误"),
        (status = 500, description = "内部错误")
    ),
    tag = "扫描任务"
)]
pub async fn submit_scan(
    State(state): State<AppState>,
    Json(request): Json<CreateScanRequest>,
) -> Result<ApiResponse<ScanSubmission>, AppError> {
    let submission = create_and_enqueue(&state.scan_jobs, state.queue.as_ref(), &request).await?;
    Ok(ApiResponse::accepted(submission))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{ScanJob, ScanStatus},
        queue::InMemoryQueue,
    };
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeJobStore {
        create_calls: AtomicUsize,
        fail_create: AtomicBool,
    }

    #[async_trait::async_trait]
    impl ScanJobStore for FakeJobStore {
        async fn create(
            &self,
            scan_id: Uuid,
            scan_type: ScanType,
            target: &str,
        ) -> AppResult<ScanJob> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(AppError::Internal(anyhow::anyhow!("模拟任务行写入失败")));
            }
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok(ScanJob {
                id: scan_id,
                scan_type,
                target: target.to_string(),
                status: ScanStatus::Queued,
                error_message: None,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
            })
        }

        async fn update_status(
            &self,
            _scan_id: Uuid,
            _status: ScanStatus,
            _error_message: Option<&str>,
        ) -> AppResult<()> {
            Ok(())
        }
    }

    fn request(scan_type: Option<&str>, target: Option<&str>) -> CreateScanRequest {
        CreateScanRequest {
            scan_type: scan_type.map(|s| s.to_string()),
            target: target.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = validate_scan_request(&request(None, None)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = validate_scan_request(&request(Some("docker-image"), None)).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = validate_scan_request(&request(None, Some("nginx"))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // 空字符串等同缺失
        let err = validate_scan_request(&request(Some("docker-image"), Some(""))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_invalid_type_rejected() {
        let err = validate_scan_request(&request(Some("sbom"), Some("nginx"))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_image_target_normalization() {
        let (scan_type, target) =
            validate_scan_request(&request(Some("docker-image"), Some("nginx"))).unwrap();
        assert_eq!(scan_type, ScanType::DockerImage);
        assert_eq!(target, "nginx:latest");

        // 已带tag或digest的引用保持原样
        let (_, target) =
            validate_scan_request(&request(Some("docker-image"), Some("nginx:1.21"))).unwrap();
        assert_eq!(target, "nginx:1.21");

        let (_, target) =
            validate_scan_request(&request(Some("docker-image"), Some("nginx@sha256:abcd")))
                .unwrap();
        assert_eq!(target, "nginx@sha256:abcd");
    }

    #[test]
    fn test_web_url_target_untouched() {
        let (scan_type, target) =
            validate_scan_request(&request(Some("web-url"), Some("https://example.com"))).unwrap();
        assert_eq!(scan_type, ScanType::WebUrl);
        assert_eq!(target, "https://example.com");
    }

    #[tokio::test]
    async fn test_rejected_request_has_no_side_effects() {
        let jobs = FakeJobStore::default();
        let queue = InMemoryQueue::new();

        let err = create_and_enqueue(&jobs, &queue, &request(Some("sbom"), Some("nginx")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // 校验失败：不写任务行，不入队
        assert_eq!(jobs.create_calls.load(Ordering::SeqCst), 0);
        assert!(queue.is_empty().await);

        let err = create_and_enqueue(&jobs, &queue, &request(None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(jobs.create_calls.load(Ordering::SeqCst), 0);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_submission_writes_row_and_enqueues() {
        let jobs = FakeJobStore::default();
        let queue = InMemoryQueue::new();

        let submission =
            create_and_enqueue(&jobs, &queue, &request(Some("docker-image"), Some("nginx")))
                .await
                .unwrap();

        assert_eq!(submission.status, ScanStatus::Queued);
        assert_eq!(submission.target, "nginx:latest");
        assert_eq!(jobs.create_calls.load(Ordering::SeqCst), 1);

        // 消息体与任务行使用同一个ID和规范化后的目标
        let received = queue.receive(1, 0, 300).await.unwrap();
        assert_eq!(received.len(), 1);
        let message: ScanMessage = serde_json::from_str(&received[0].body).unwrap();
        assert_eq!(message.scan_id, submission.job_id);
        assert_eq!(message.scan_type, "docker-image");
        assert_eq!(message.target, "nginx:latest");
    }

    #[tokio::test]
    async fn test_each_submission_gets_fresh_job_id() {
        let jobs = FakeJobStore::default();
        let queue = InMemoryQueue::new();
        let req = request(Some("docker-image"), Some("nginx"));

        let first = create_and_enqueue(&jobs, &queue, &req).await.unwrap();
        let second = create_and_enqueue(&jobs, &queue, &req).await.unwrap();
        assert_ne!(first.job_id, second.job_id);
    }

    #[tokio::test]
    async fn test_row_write_precedes_enqueue() {
        let jobs = FakeJobStore::default();
        let queue = InMemoryQueue::new();
        jobs.fail_create.store(true, Ordering::SeqCst);

        let result =
            create_and_enqueue(&jobs, &queue, &request(Some("docker-image"), Some("nginx"))).await;
        assert!(result.is_err());

        // 任务行写入失败时不得入队
        assert!(queue.is_empty().await);
    }
}
