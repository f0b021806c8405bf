use super::Entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// 扫描类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "scan_type_enum", rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ScanType {
    /// 容器镜像扫描
    DockerImage,
    /// Web URL扫描
    WebUrl,
}

impl ScanType {
    /// 对应的外部字符串表示（docker-image / web-url）
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::DockerImage => "docker-image",
            ScanType::WebUrl => "web-url",
        }
    }

    /// 从外部字符串解析，未知值返回None
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "docker-image" => Some(ScanType::DockerImage),
            "web-url" => Some(ScanType::WebUrl),
            _ => None,
        }
    }
}

/// 扫描任务状态枚举
///
/// 状态只能单向前进：queued → scanning → completed|failed。
/// completed和failed为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "scan_status_enum", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// 已入队
    Queued,
    /// 扫描中
    Scanning,
    /// 已完成
    Completed,
    /// 失败
    Failed,
}

impl ScanStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }
}

/// 扫描任务数据模型
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ScanJob {
    pub id: Uuid,
    /// 扫描类型
    pub scan_type: ScanType,
    /// 扫描目标（镜像引用或URL，已规范化）
    pub target: String,
    /// 任务状态
    pub status: ScanStatus,
    /// 失败原因
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Entity for ScanJob {
    type Id = Uuid;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// 创建扫描任务的请求模型
///
/// 字段均为Option以便在处理器中给出明确的校验错误，
/// 而不是依赖反序列化拒绝整个请求体。
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateScanRequest {
    /// 扫描类型（docker-image / web-url）
    #[serde(rename = "type")]
    pub scan_type: Option<String>,
    /// 扫描目标
    pub target: Option<String>,
}

/// 扫描任务提交响应
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ScanSubmission {
    pub job_id: Uuid,
    pub status: ScanStatus,
    #[serde(rename = "type")]
    pub scan_type: ScanType,
    pub target: String,
}

/// 任务查询过滤器
#[derive(Debug, Clone, Serialize, Deserialize, Default, ToSchema)]
pub struct ScanJobFilter {
    pub status: Option<ScanStatus>,
    pub scan_type: Option<ScanType>,
}

/// 任务统计信息
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ScanJobStats {
    pub total: i64,
    pub queued: i64,
    pub scanning: i64,
    pub completed: i64,
    pub failed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_type_roundtrip() {
        assert_eq!(ScanType::parse("docker-image"), Some(ScanType::DockerImage));
        assert_eq!(ScanType::parse("web-url"), Some(ScanType::WebUrl));
        assert_eq!(ScanType::parse("sbom"), None);
        assert_eq!(ScanType::DockerImage.as_str(), "docker-image");
    }

    #[test]
    fn test_scan_type_serde() {
        let json = serde_json::to_string(&ScanType::DockerImage).unwrap();
        assert_eq!(json, "\"docker-image\"");
        let back: ScanType = serde_json::from_str("\"web-url\"").unwrap();
        assert_eq!(back, ScanType::WebUrl);
    }

    #[test]
    fn test_status_terminal() {
        assert!(ScanStatus::Completed.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
        assert!(!ScanStatus::Queued.is_terminal());
        assert!(!ScanStatus::Scanning.is_terminal());
    }

    #[test]
    fn test_create_request_missing_fields() {
        let req: CreateScanRequest = serde_json::from_str("{}").unwrap();
        assert!(req.scan_type.is_none());
        assert!(req.target.is_none());

        let req: CreateScanRequest =
            serde_json::from_str(r#"{"type": "docker-image", "target": "nginx"}"#).unwrap();
        assert_eq!(req.scan_type.as_deref(), Some("docker-image"));
        assert_eq!(req.target.as_deref(), Some("nginx"));
    }
}
