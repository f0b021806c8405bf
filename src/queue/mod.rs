pub mod memory;
pub mod sqs;

pub use memory::InMemoryQueue;
pub use sqs::SqsQueue;

use crate::error::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 扫描任务入队消息体
///
/// 消息只携带执行一次扫描所需的最小信息；
/// 回执句柄、可见性截止时间等投递元数据由队列自身管理。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanMessage {
    pub scan_id: Uuid,
    /// 扫描类型字符串（docker-image / web-url），同时作为路由属性
    #[serde(rename = "type")]
    pub scan_type: String,
    pub target: String,
    pub created_at: DateTime<Utc>,
}

/// 从队列收到的一条消息
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// 原始消息体（JSON）
    pub body: String,
    /// 确认删除用的回执句柄，仅在本次投递内有效
    pub receipt_handle: String,
}

/// 队列抽象接口（至少一次投递语义）
///
/// 实现需要保证：send成功即消息已持久化；receive返回的消息在
/// visibility_timeout_secs内对其他消费者不可见；delete按回执句柄
/// 确认删除，未删除的消息在超时后重新可投递。
#[async_trait::async_trait]
pub trait ScanQueue: Send + Sync {
    /// 发送消息，返回队列侧的消息ID
    async fn send(&self, message: &ScanMessage) -> AppResult<String>;

    /// 长轮询接收最多max_messages条消息
    async fn receive(
        &self,
        max_messages: i32,
        wait_time_secs: i32,
        visibility_timeout_secs: i32,
    ) -> AppResult<Vec<ReceivedMessage>>;

    /// 按回执句柄确认删除消息
    async fn delete(&self, receipt_handle: &str) -> AppResult<()>;

    /// 健康检查
    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_message_serde() {
        let message = ScanMessage {
            scan_id: Uuid::new_v4(),
            scan_type: "docker-image".to_string(),
            target: "nginx:latest".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"type\":\"docker-image\""));
        assert!(json.contains("\"scan_id\""));

        let back: ScanMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scan_id, message.scan_id);
        assert_eq!(back.target, "nginx:latest");
    }

    #[test]
    fn test_scan_message_rejects_garbage() {
        let result = serde_json::from_str::<ScanMessage>("{\"scan_id\": \"not-a-uuid\"}");
        assert!(result.is_err());
    }
}
