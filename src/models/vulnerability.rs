use super::Entity;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// 漏洞严重等级枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "severity_enum", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    /// 从扫描器输出的严重等级字符串解析，无法识别时归为Unknown
    pub fn from_scanner(value: &str) -> Self {
        match value {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Unknown,
        }
    }
}

/// 漏洞数据模型（数据库行）
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Vulnerability {
    pub id: Uuid,
    /// 所属扫描任务ID
    pub scan_job_id: Uuid,
    /// 漏洞标识（如CVE编号）
    pub cve_id: Option<String>,
    /// 严重等级
    pub severity: Severity,
    /// 受影响的软件包
    pub package_name: Option<String>,
    /// 已安装版本
    pub installed_version: Option<String>,
    /// 修复版本
    pub fixed_version: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl Entity for Vulnerability {
    type Id = Uuid;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// 扫描器产出的单条漏洞记录（尚未落库）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub cve_id: Option<String>,
    pub severity: Severity,
    pub package_name: Option<String>,
    pub installed_version: Option<String>,
    pub fixed_version: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

/// 按严重等级汇总的计数，仅用于日志与可观测性，不落库
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeveritySummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeveritySummary {
    /// 统计扁平化漏洞列表
    pub fn from_records(records: &[VulnerabilityRecord]) -> Self {
        let mut summary = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.severity {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Unknown => {}
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(severity: Severity) -> VulnerabilityRecord {
        VulnerabilityRecord {
            cve_id: Some("CVE-2024-0001".to_string()),
            severity,
            package_name: Some("openssl".to_string()),
            installed_version: Some("1.1.1".to_string()),
            fixed_version: None,
            title: None,
            description: None,
        }
    }

    #[test]
    fn test_severity_from_scanner() {
        assert_eq!(Severity::from_scanner("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::from_scanner("LOW"), Severity::Low);
        assert_eq!(Severity::from_scanner("NEGLIGIBLE"), Severity::Unknown);
        assert_eq!(Severity::from_scanner(""), Severity::Unknown);
    }

    #[test]
    fn test_severity_serde_uppercase() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
    }

    #[test]
    fn test_summary_counts() {
        let records = vec![
            record(Severity::Critical),
            record(Severity::Critical),
            record(Severity::High),
            record(Severity::Medium),
            record(Severity::Unknown),
        ];
        let summary = SeveritySummary::from_records(&records);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.critical, 2);
        assert_eq!(summary.high, 1);
        assert_eq!(summary.medium, 1);
        assert_eq!(summary.low, 0);
    }
}
