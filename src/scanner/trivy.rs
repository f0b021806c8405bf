use super::{ScanOutcome, Scanner, outcome_from_raw};
use crate::{
    config::ScannerConfig,
    error::{AppError, AppResult},
    models::ScanType,
};
use std::time::Duration;
use tokio::process::Command;

/// Trivy扫描器适配
///
/// 以子进程方式调用trivy，硬超时兜底。镜像扫描之外的类型在
/// 提交侧已经校验过，这里再次拒绝属于防御性检查。
#[derive(Debug, Clone)]
pub struct TrivyScanner {
    config: ScannerConfig,
}

impl TrivyScanner {
    pub fn new(config: ScannerConfig) -> Self {
        Self { config }
    }

    async fn scan_docker_image(&self, image: &str) -> AppResult<ScanOutcome> {
        tracing::info!("开始扫描容器镜像: {}", image);

        let timeout = Duration::from_secs(self.config.image_scan_timeout_secs);
        let invocation = Command::new(&self.config.trivy_path)
            .args(["image", "--format", "json", "--quiet", image])
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(timeout, invocation)
            .await
            .map_err(|_| {
                AppError::scan_execution(format!(
                    "扫描超时（{}秒）: {}",
                    self.config.image_scan_timeout_secs, image
                ))
            })?
            .map_err(|e| AppError::scan_execution(format!("无法启动扫描工具: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::scan_execution(format!(
                "扫描工具退出码非零: {}",
                stderr.trim()
            )));
        }

        let raw: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| AppError::scan_execution(format!("解析扫描输出失败: {}", e)))?;

        let outcome = outcome_from_raw(raw)
            .map_err(|e| AppError::scan_execution(format!("提取漏洞列表失败: {}", e)))?;

        tracing::info!(
            "镜像 {} 扫描完成，共发现 {} 个漏洞 (critical={}, high={}, medium={}, low={})",
            image,
            outcome.summary.total,
            outcome.summary.critical,
            outcome.summary.high,
            outcome.summary.medium,
            outcome.summary.low
        );

        Ok(outcome)
    }
}

#[async_trait::async_trait]
impl Scanner for TrivyScanner {
    async fn scan(&self, scan_type: ScanType, target: &str) -> AppResult<ScanOutcome> {
        match scan_type {
            ScanType::DockerImage => self.scan_docker_image(target).await,
            ScanType::WebUrl => Err(AppError::scan_execution(format!(
                "暂不支持的扫描类型: {}",
                scan_type.as_str()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> TrivyScanner {
        TrivyScanner::new(ScannerConfig {
            trivy_path: "trivy".to_string(),
            image_scan_timeout_secs: 600,
        })
    }

    #[tokio::test]
    async fn test_web_url_is_rejected() {
        let err = scanner()
            .scan(ScanType::WebUrl, "https://example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ScanExecution(_)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_scan_execution_error() {
        let scanner = TrivyScanner::new(ScannerConfig {
            trivy_path: "/nonexistent/trivy".to_string(),
            image_scan_timeout_secs: 600,
        });
        let err = scanner
            .scan(ScanType::DockerImage, "nginx:latest")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ScanExecution(_)));
    }
}
