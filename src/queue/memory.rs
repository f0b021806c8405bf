use super::{ReceivedMessage, ScanMessage, ScanQueue};
use crate::error::AppResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

/// 队列中的一条消息及其投递状态
#[derive(Debug, Clone)]
struct StoredMessage {
    body: String,
    /// 此时间点之前对消费者不可见
    visible_at: Instant,
    /// 最近一次投递的回执句柄，重投后旧句柄失效
    receipt_handle: Option<String>,
}

/// 内存队列实现
///
/// 用于测试与本地开发，模拟SQS的至少一次投递语义：
/// 收到的消息在可见性超时内对其他消费者隐藏，未确认删除则超时后重投。
#[derive(Debug, Clone, Default)]
pub struct InMemoryQueue {
    messages: Arc<Mutex<Vec<StoredMessage>>>,
    send_count: Arc<AtomicU64>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接注入原始消息体（用于模拟无法解析的毒消息）
    pub async fn push_raw(&self, body: impl Into<String>) {
        let mut messages = self.messages.lock().await;
        messages.push(StoredMessage {
            body: body.into(),
            visible_at: Instant::now(),
            receipt_handle: None,
        });
    }

    /// 当前队列中的消息总数（含不可见消息）
    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn try_claim(
        &self,
        max_messages: usize,
        visibility_timeout: Duration,
    ) -> Vec<ReceivedMessage> {
        let now = Instant::now();
        let mut messages = self.messages.lock().await;
        let mut claimed = Vec::new();

        for message in messages.iter_mut() {
            if claimed.len() >= max_messages {
                break;
            }
            if message.visible_at > now {
                continue;
            }
            let receipt_handle = Uuid::new_v4().to_string();
            message.visible_at = now + visibility_timeout;
            message.receipt_handle = Some(receipt_handle.clone());
            claimed.push(ReceivedMessage {
                body: message.body.clone(),
                receipt_handle,
            });
        }

        claimed
    }
}

#[async_trait::async_trait]
impl ScanQueue for InMemoryQueue {
    async fn send(&self, message: &ScanMessage) -> AppResult<String> {
        let body = serde_json::to_string(message)?;
        self.push_raw(body).await;
        let id = self.send_count.fetch_add(1, Ordering::SeqCst);
        Ok(format!("mem-{}", id))
    }

    async fn receive(
        &self,
        max_messages: i32,
        wait_time_secs: i32,
        visibility_timeout_secs: i32,
    ) -> AppResult<Vec<ReceivedMessage>> {
        let deadline = Instant::now() + Duration::from_secs(wait_time_secs.max(0) as u64);
        let visibility = Duration::from_secs(visibility_timeout_secs.max(0) as u64);

        loop {
            let claimed = self.try_claim(max_messages.max(1) as usize, visibility).await;
            if !claimed.is_empty() {
                return Ok(claimed);
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    async fn delete(&self, receipt_handle: &str) -> AppResult<()> {
        let mut messages = self.messages.lock().await;
        let before = messages.len();
        messages.retain(|m| m.receipt_handle.as_deref() != Some(receipt_handle));

        if messages.len() == before {
            // 回执句柄已因重投而失效，与SQS行为一致按无效处理
            tracing::warn!("删除消息失败：回执句柄无效或已过期");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(target: &str) -> ScanMessage {
        ScanMessage {
            scan_id: Uuid::new_v4(),
            scan_type: "docker-image".to_string(),
            target: target.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_receive_delete() {
        let queue = InMemoryQueue::new();
        queue.send(&message("nginx:latest")).await.unwrap();

        let received = queue.receive(1, 0, 300).await.unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].body.contains("nginx:latest"));

        queue.delete(&received[0].receipt_handle).await.unwrap();
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visibility_timeout_redelivery() {
        let queue = InMemoryQueue::new();
        queue.send(&message("alpine")).await.unwrap();

        let first = queue.receive(1, 0, 2).await.unwrap();
        assert_eq!(first.len(), 1);

        // 可见性窗口内不重复投递
        let hidden = queue.receive(1, 0, 2).await.unwrap();
        assert!(hidden.is_empty());

        // 超时后重投，并换发新的回执句柄
        tokio::time::sleep(Duration::from_secs(3)).await;
        let second = queue.receive(1, 0, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_ne!(second[0].receipt_handle, first[0].receipt_handle);

        // 旧句柄失效，消息仍在队列中
        queue.delete(&first[0].receipt_handle).await.unwrap();
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_wait_budget_on_empty_queue() {
        let queue = InMemoryQueue::new();
        let received = queue.receive(1, 1, 300).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_respects_max_messages() {
        let queue = InMemoryQueue::new();
        queue.send(&message("a")).await.unwrap();
        queue.send(&message("b")).await.unwrap();

        let received = queue.receive(1, 0, 300).await.unwrap();
        assert_eq!(received.len(), 1);
    }
}
