use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::{ApiResponse, ResponseCode};

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("队列错误: {0}")]
    Queue(String),

    #[error("存储错误: {0}")]
    Storage(String),

    #[error("扫描执行错误: {0}")]
    ScanExecution(String),

    #[error("内部错误: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("资源不存在: {resource}")]
    NotFound { resource: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            AppError::Database(_) => (ResponseCode::DATABASE_ERROR, self.to_string()),
            AppError::Serialization(_) => {
                (ResponseCode::INTERNAL_ERROR, "数据序列化错误".to_string())
            }
            AppError::Io(_) => (ResponseCode::INTERNAL_ERROR, "IO错误".to_string()),
            AppError::Config(_) => (ResponseCode::INTERNAL_ERROR, "配置错误".to_string()),
            AppError::Validation(msg) => (ResponseCode::BAD_REQUEST, msg.clone()),
            AppError::Queue(_) => (ResponseCode::QUEUE_ERROR, self.to_string()),
            AppError::Storage(_) => (ResponseCode::STORAGE_ERROR, self.to_string()),
            AppError::ScanExecution(_) => (ResponseCode::SCAN_EXECUTION_ERROR, self.to_string()),
            AppError::Internal(_) => (ResponseCode::INTERNAL_ERROR, "服务器内部错误".to_string()),
            AppError::NotFound { resource } => {
                (ResponseCode::NOT_FOUND, format!("资源不存在: {}", resource))
            }
        };

        // 记录错误日志
        tracing::error!("应用错误: {}", self);

        ApiResponse::<()>::error(code, message).into_response()
    }
}

/// 应用程序Result类型别名
pub type AppResult<T> = Result<T, AppError>;

/// 错误构造辅助函数
impl AppError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    pub fn queue<T: Into<String>>(msg: T) -> Self {
        Self::Queue(msg.into())
    }

    pub fn storage<T: Into<String>>(msg: T) -> Self {
        Self::Storage(msg.into())
    }

    pub fn scan_execution<T: Into<String>>(msg: T) -> Self {
        Self::ScanExecution(msg.into())
    }

    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found<T: Into<String>>(resource: T) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// 是否属于基础设施错误（队列/数据库/存储不可达或超时）。
    /// 工作进程据此决定是否保留消息等待重投。
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AppError::Database(_) | AppError::Queue(_) | AppError::Storage(_) | AppError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = AppError::validation("测试验证错误");
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "验证错误: 测试验证错误");
    }

    #[test]
    fn test_scan_execution_error() {
        let err = AppError::scan_execution("trivy 退出码非零");
        assert!(matches!(err, AppError::ScanExecution(_)));
        assert!(!err.is_infrastructure());
    }

    #[test]
    fn test_infrastructure_classification() {
        assert!(AppError::queue("接收消息失败").is_infrastructure());
        assert!(AppError::storage("上传失败").is_infrastructure());
        assert!(!AppError::validation("缺少字段").is_infrastructure());
    }

    #[test]
    fn test_not_found_error() {
        let err = AppError::not_found("扫描任务");
        assert!(matches!(err, AppError::NotFound { .. }));
    }
}
