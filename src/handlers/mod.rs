pub mod scan_query;
pub mod scan_submission;

pub use scan_query::{
    download_scan_results, get_scan, get_scan_stats, get_scan_vulnerabilities, list_scans,
};
pub use scan_submission::submit_scan;

use crate::{
    config::Config,
    database::Database,
    queue::ScanQueue,
    repositories::{ScanJobRepository, VulnerabilityRepository},
    storage::S3Storage,
};
use std::sync::Arc;

/// 应用状态
///
/// 所有客户端在进程启动时构造一次，经此注入各处理器。
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub storage: S3Storage,
    pub queue: Arc<dyn ScanQueue>,
    pub scan_jobs: ScanJobRepository,
    pub vulnerabilities: VulnerabilityRepository,
    pub config: Config,
}
