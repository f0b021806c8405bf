pub mod scan_job;
pub mod vulnerability;

pub use scan_job::ScanJobRepository;
pub use vulnerability::VulnerabilityRepository;

use crate::{
    error::AppResult,
    models::{ScanJob, ScanStatus, ScanType, VulnerabilityRecord},
};
use uuid::Uuid;

/// 任务写入接口
///
/// 提交网关经此创建任务行，工作进程经此推进状态机，
/// 测试中可用内存实现替换。
#[async_trait::async_trait]
pub trait ScanJobStore: Send + Sync {
    /// 创建任务行，初始状态为queued
    async fn create(
        &self,
        scan_id: Uuid,
        scan_type: ScanType,
        target: &str,
    ) -> AppResult<ScanJob>;

    /// 更新任务状态（幂等、容忍行不存在，见ScanJobRepository实现）
    async fn update_status(
        &self,
        scan_id: Uuid,
        status: ScanStatus,
        error_message: Option<&str>,
    ) -> AppResult<()>;
}

/// 漏洞批量写入接口
#[async_trait::async_trait]
pub trait VulnerabilityStore: Send + Sync {
    /// 以任务为单位替换漏洞记录，返回写入条数
    async fn replace_for_job(
        &self,
        scan_id: Uuid,
        records: &[VulnerabilityRecord],
    ) -> AppResult<usize>;
}
