pub mod s3;

pub use s3::S3Storage;

use crate::error::AppResult;
use uuid::Uuid;

/// 扫描结果对象的key布局：每个任务一个对象
pub fn result_object_key(scan_id: Uuid) -> String {
    format!("scans/{}/results.json", scan_id)
}

/// 对象存储抽象接口
///
/// 上传按key覆盖写入，天然幂等：同一任务的重投递会以相同内容
/// 覆盖同一对象。
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// 上传对象，返回ETag
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> AppResult<String>;

    /// 下载对象
    async fn download(&self, bucket: &str, key: &str) -> AppResult<Vec<u8>>;

    /// 检查对象是否存在
    async fn exists(&self, bucket: &str, key: &str) -> AppResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_object_key() {
        let id = Uuid::parse_str("a2f9e2b4-7c8d-4a1e-9f3b-0c5d6e7f8a9b").unwrap();
        assert_eq!(
            result_object_key(id),
            "scans/a2f9e2b4-7c8d-4a1e-9f3b-0c5d6e7f8a9b/results.json"
        );
    }
}
