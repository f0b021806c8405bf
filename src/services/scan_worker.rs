use crate::{
    config::QueueConfig,
    error::{AppError, AppResult},
    models::{ScanStatus, ScanType, SeveritySummary},
    queue::{ReceivedMessage, ScanMessage, ScanQueue},
    repositories::{ScanJobStore, VulnerabilityStore},
    scanner::Scanner,
    storage::{ObjectStorage, result_object_key},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// 扫描工作进程
///
/// 单线程轮询循环；多个实例可同时消费同一队列，水平扩展时除队列
/// 自身的可见性语义外不需要任何协调。确认删除只在任务到达终态后
/// 进行：处理中途出错的消息保留在队列中，等待可见性超时后重投。
pub struct ScanWorker {
    queue: Arc<dyn ScanQueue>,
    scanner: Arc<dyn Scanner>,
    jobs: Arc<dyn ScanJobStore>,
    vulnerabilities: Arc<dyn VulnerabilityStore>,
    storage: Arc<dyn ObjectStorage>,
    bucket: String,
    queue_config: QueueConfig,
}

impl ScanWorker {
    pub fn new(
        queue: Arc<dyn ScanQueue>,
        scanner: Arc<dyn Scanner>,
        jobs: Arc<dyn ScanJobStore>,
        vulnerabilities: Arc<dyn VulnerabilityStore>,
        storage: Arc<dyn ObjectStorage>,
        bucket: String,
        queue_config: QueueConfig,
    ) -> Self {
        Self {
            queue,
            scanner,
            jobs,
            vulnerabilities,
            storage,
            bucket,
            queue_config,
        }
    }

    /// 主轮询循环，收到关停信号后退出
    ///
    /// 处理中途被打断的消息不会丢失：未确认删除的消息在可见性
    /// 超时后重投，流水线各步骤均可安全重放。
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "扫描工作进程启动: 长轮询等待{}秒, 可见性超时{}秒",
            self.queue_config.wait_time_secs,
            self.queue_config.visibility_timeout_secs
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                result = self.poll_once() => {
                    if let Err(e) = result {
                        tracing::warn!(
                            "接收消息失败: {}，{}秒后重试",
                            e,
                            self.queue_config.receive_retry_delay_secs
                        );
                        tokio::select! {
                            _ = shutdown.changed() => {}
                            _ = tokio::time::sleep(Duration::from_secs(
                                self.queue_config.receive_retry_delay_secs,
                            )) => {}
                        }
                    }
                }
            }
        }

        tracing::info!("扫描工作进程已停止");
    }

    /// 执行一次接收与处理，返回本次处理的消息数
    pub async fn poll_once(&self) -> AppResult<usize> {
        let messages = self
            .queue
            .receive(
                1,
                self.queue_config.wait_time_secs,
                self.queue_config.visibility_timeout_secs,
            )
            .await?;

        if messages.is_empty() {
            tracing::debug!("队列暂无消息");
            return Ok(0);
        }

        let count = messages.len();
        for message in &messages {
            self.process_message(message).await;
        }

        Ok(count)
    }

    /// 处理单条消息：解析 → 执行扫描流水线 → 按结果决定是否确认删除
    ///
    /// 任何错误都不会让循环崩溃。失败上报只使用已解析消息中的任务ID，
    /// 解析本身失败的消息不关联任何任务行。
    async fn process_message(&self, message: &ReceivedMessage) {
        let scan_message: ScanMessage = match serde_json::from_str(&message.body) {
            Ok(m) => m,
            Err(e) => {
                // 重投无法解析的消息只会重复同样的失败，按毒消息删除
                tracing::error!("消息体解析失败，按毒消息删除: {}", e);
                self.acknowledge(&message.receipt_handle).await;
                return;
            }
        };

        let scan_id = scan_message.scan_id;
        tracing::info!(
            "开始处理扫描任务: scan_id={}, type={}, target={}",
            scan_id,
            scan_message.scan_type,
            scan_message.target
        );

        match self.execute_scan(&scan_message).await {
            Ok(summary) => {
                tracing::info!(
                    "扫描任务完成: scan_id={}, 漏洞总数={} (critical={}, high={}, medium={}, low={})",
                    scan_id,
                    summary.total,
                    summary.critical,
                    summary.high,
                    summary.medium,
                    summary.low
                );
                self.acknowledge(&message.receipt_handle).await;
            }
            Err(e) if e.is_infrastructure() => {
                // 基础设施错误：尽力标记失败，消息留在队列中等待重投
                tracing::warn!("处理扫描任务出错: scan_id={}, {}", scan_id, e);
                if let Err(mark_err) = self
                    .jobs
                    .update_status(scan_id, ScanStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    tracing::warn!("标记失败状态时再次出错（已忽略）: {}", mark_err);
                }
            }
            Err(e) => {
                // 确定性失败（扫描执行出错、输出无法序列化等）：
                // 重试同一目标只会得到同样的结果，记录终态后仍然
                // 确认删除，避免无意义的重投
                let reason = match &e {
                    AppError::ScanExecution(reason) => reason.clone(),
                    _ => e.to_string(),
                };
                tracing::warn!("扫描执行失败: scan_id={}, {}", scan_id, reason);
                match self
                    .jobs
                    .update_status(scan_id, ScanStatus::Failed, Some(&reason))
                    .await
                {
                    Ok(()) => self.acknowledge(&message.receipt_handle).await,
                    Err(mark_err) => {
                        tracing::warn!("标记失败状态出错，保留消息等待重投: {}", mark_err);
                    }
                }
            }
        }
    }

    /// 扫描流水线：scanning → 调用扫描器 → 上传原始结果 → 替换漏洞
    /// 记录 → completed
    async fn execute_scan(&self, message: &ScanMessage) -> AppResult<SeveritySummary> {
        let scan_id = message.scan_id;

        // 消息中的类型字符串在提交侧校验过，这里再次拒绝属于防御性检查
        let scan_type = ScanType::parse(&message.scan_type).ok_or_else(|| {
            AppError::scan_execution(format!("不支持的扫描类型: {}", message.scan_type))
        })?;

        self.jobs
            .update_status(scan_id, ScanStatus::Scanning, None)
            .await?;

        let outcome = self.scanner.scan(scan_type, &message.target).await?;

        let key = result_object_key(scan_id);
        let raw = serde_json::to_vec_pretty(&outcome.raw)?;
        self.storage
            .upload(&self.bucket, &key, &raw, Some("application/json"))
            .await?;

        // 总是替换（而不是追加），以清掉上一次部分投递留下的旧行
        self.vulnerabilities
            .replace_for_job(scan_id, &outcome.vulnerabilities)
            .await?;

        self.jobs
            .update_status(scan_id, ScanStatus::Completed, None)
            .await?;

        Ok(outcome.summary)
    }

    async fn acknowledge(&self, receipt_handle: &str) {
        if let Err(e) = self.queue.delete(receipt_handle).await {
            tracing::warn!("确认删除消息失败（将按可见性超时重投）: {}", e);
        }
    }
}
