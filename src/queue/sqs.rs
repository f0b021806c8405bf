use super::{ReceivedMessage, ScanMessage, ScanQueue};
use crate::{
    config::QueueConfig,
    error::{AppError, AppResult},
};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::{Client, types::MessageAttributeValue};
use std::sync::Arc;

/// SQS队列实现
///
/// 通过endpoint覆盖同样适用于ElasticMQ/LocalStack等兼容实现。
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Arc<Client>,
    config: QueueConfig,
}

impl SqsQueue {
    /// 创建新的SQS队列客户端
    pub async fn new(config: QueueConfig) -> AppResult<Self> {
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&base);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        let client = Client::from_conf(builder.build());

        Ok(Self {
            client: Arc::new(client),
            config,
        })
    }
}

#[async_trait::async_trait]
impl ScanQueue for SqsQueue {
    async fn send(&self, message: &ScanMessage) -> AppResult<String> {
        let body = serde_json::to_string(message)?;

        let scan_type_attr = MessageAttributeValue::builder()
            .data_type("String")
            .string_value(&message.scan_type)
            .build()
            .map_err(|e| AppError::queue(format!("构造消息属性失败: {}", e)))?;

        let result = self
            .client
            .send_message()
            .queue_url(&self.config.queue_url)
            .message_body(body)
            .message_attributes("scan_type", scan_type_attr)
            .send()
            .await
            .map_err(|e| AppError::queue(format!("发送消息失败: {}", e)))?;

        let message_id = result.message_id().unwrap_or("unknown").to_string();
        tracing::info!(
            "消息已发送到队列: scan_id={}, message_id={}",
            message.scan_id,
            message_id
        );

        Ok(message_id)
    }

    async fn receive(
        &self,
        max_messages: i32,
        wait_time_secs: i32,
        visibility_timeout_secs: i32,
    ) -> AppResult<Vec<ReceivedMessage>> {
        let result = self
            .client
            .receive_message()
            .queue_url(&self.config.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time_secs)
            .visibility_timeout(visibility_timeout_secs)
            .send()
            .await
            .map_err(|e| AppError::queue(format!("接收消息失败: {}", e)))?;

        let messages = result
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|m| match (m.body, m.receipt_handle) {
                (Some(body), Some(receipt_handle)) => Some(ReceivedMessage {
                    body,
                    receipt_handle,
                }),
                _ => {
                    tracing::warn!("收到缺少body或回执句柄的消息，已跳过");
                    None
                }
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> AppResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::queue(format!("删除消息失败: {}", e)))?;

        tracing::debug!("消息已从队列删除");
        Ok(())
    }

    /// 健康检查：查询队列属性
    async fn health_check(&self) -> AppResult<bool> {
        match self
            .client
            .get_queue_attributes()
            .queue_url(&self.config.queue_url)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::error!("队列健康检查失败: {}", e);
                Ok(false)
            }
        }
    }
}
