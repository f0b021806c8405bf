pub mod trivy;

pub use trivy::TrivyScanner;

use crate::{
    error::AppResult,
    models::{ScanType, Severity, SeveritySummary, VulnerabilityRecord},
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// 一次扫描的完整产出
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// 扫描器的原始输出，原样存入结果存储
    pub raw: JsonValue,
    /// 扁平化的漏洞列表
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    /// 按严重等级汇总的计数（仅用于日志）
    pub summary: SeveritySummary,
}

/// 扫描器抽象接口
///
/// 实现负责调用外部工具并解析其结构化输出。工具退出码非零、
/// 超时或输出无法解析均应返回ScanExecution错误，绝不让工作
/// 进程崩溃。
#[async_trait::async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, scan_type: ScanType, target: &str) -> AppResult<ScanOutcome>;
}

/// Trivy报告结构（只取需要的字段）
#[derive(Debug, Deserialize)]
struct TrivyReport {
    #[serde(rename = "Results", default)]
    results: Vec<TrivyResult>,
}

#[derive(Debug, Deserialize)]
struct TrivyResult {
    #[serde(rename = "Vulnerabilities", default)]
    vulnerabilities: Option<Vec<TrivyVulnerability>>,
}

#[derive(Debug, Deserialize)]
struct TrivyVulnerability {
    #[serde(rename = "VulnerabilityID")]
    vulnerability_id: Option<String>,
    #[serde(rename = "Severity")]
    severity: Option<String>,
    #[serde(rename = "PkgName")]
    pkg_name: Option<String>,
    #[serde(rename = "InstalledVersion")]
    installed_version: Option<String>,
    #[serde(rename = "FixedVersion")]
    fixed_version: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Description")]
    description: Option<String>,
}

/// 从原始报告扁平化出漏洞记录列表
///
/// Trivy按Target分组输出，各分组的Vulnerabilities可能缺省。
pub fn flatten_report(raw: &JsonValue) -> AppResult<Vec<VulnerabilityRecord>> {
    let report: TrivyReport = serde_json::from_value(raw.clone())?;

    let mut records = Vec::new();
    for result in report.results {
        let Some(vulnerabilities) = result.vulnerabilities else {
            continue;
        };
        for vuln in vulnerabilities {
            records.push(VulnerabilityRecord {
                cve_id: vuln.vulnerability_id,
                severity: vuln
                    .severity
                    .as_deref()
                    .map(Severity::from_scanner)
                    .unwrap_or(Severity::Unknown),
                package_name: vuln.pkg_name,
                installed_version: vuln.installed_version,
                fixed_version: vuln.fixed_version,
                title: vuln.title,
                description: vuln.description,
            });
        }
    }

    Ok(records)
}

/// 由原始报告构造完整扫描产出
pub fn outcome_from_raw(raw: JsonValue) -> AppResult<ScanOutcome> {
    let vulnerabilities = flatten_report(&raw)?;
    let summary = SeveritySummary::from_records(&vulnerabilities);
    Ok(ScanOutcome {
        raw,
        vulnerabilities,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_report() -> JsonValue {
        json!({
            "SchemaVersion": 2,
            "ArtifactName": "nginx:latest",
            "Results": [
                {
                    "Target": "nginx:latest (debian 12.5)",
                    "Vulnerabilities": [
                        {
                            "VulnerabilityID": "CVE-2023-0001",
                            "PkgName": "libssl3",
                            "InstalledVersion": "3.0.11-1",
                            "FixedVersion": "3.0.12-1",
                            "Severity": "CRITICAL",
                            "Title": "openssl: example issue",
                            "Description": "..."
                        },
                        {
                            "VulnerabilityID": "CVE-2023-0002",
                            "PkgName": "zlib1g",
                            "InstalledVersion": "1.2.13",
                            "Severity": "MEDIUM"
                        }
                    ]
                },
                {
                    "Target": "Node.js",
                    "Vulnerabilities": null
                },
                {
                    "Target": "empty-group"
                }
            ]
        })
    }

    #[test]
    fn test_flatten_report() {
        let records = flatten_report(&sample_report()).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].cve_id.as_deref(), Some("CVE-2023-0001"));
        assert_eq!(records[0].severity, Severity::Critical);
        assert_eq!(records[0].fixed_version.as_deref(), Some("3.0.12-1"));

        assert_eq!(records[1].cve_id.as_deref(), Some("CVE-2023-0002"));
        assert_eq!(records[1].severity, Severity::Medium);
        assert!(records[1].fixed_version.is_none());
        assert!(records[1].title.is_none());
    }

    #[test]
    fn test_flatten_report_without_results() {
        let records = flatten_report(&json!({"SchemaVersion": 2})).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_outcome_summary() {
        let outcome = outcome_from_raw(sample_report()).unwrap();
        assert_eq!(outcome.summary.total, 2);
        assert_eq!(outcome.summary.critical, 1);
        assert_eq!(outcome.summary.medium, 1);
        assert_eq!(outcome.summary.high, 0);
        // 原始输出保持未修改
        assert_eq!(outcome.raw["ArtifactName"], "nginx:latest");
    }

    #[test]
    fn test_unknown_severity_is_absorbed() {
        let raw = json!({
            "Results": [{
                "Vulnerabilities": [{"VulnerabilityID": "CVE-1", "Severity": "NEGLIGIBLE"}]
            }]
        });
        let records = flatten_report(&raw).unwrap();
        assert_eq!(records[0].severity, Severity::Unknown);
    }
}
