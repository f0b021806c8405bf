use super::VulnerabilityStore;
use crate::{
    error::AppError,
    models::{Vulnerability, VulnerabilityRecord},
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

/// 漏洞记录存储库
#[derive(Debug, Clone)]
pub struct VulnerabilityRepository {
    pool: PgPool,
}

fn row_to_vulnerability(row: &PgRow) -> Vulnerability {
    Vulnerability {
        id: row.get("id"),
        scan_job_id: row.get("scan_job_id"),
        cve_id: row.get("cve_id"),
        severity: row.get("severity"),
        package_name: row.get("package_name"),
        installed_version: row.get("installed_version"),
        fixed_version: row.get("fixed_version"),
        title: row.get("title"),
        description: row.get("description"),
    }
}

impl VulnerabilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 查询任务的全部漏洞记录
    pub async fn list_by_job(&self, scan_id: Uuid) -> Result<Vec<Vulnerability>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT id, scan_job_id, cve_id, severity, package_name,
                   installed_version, fixed_version, title, description
            FROM vulnerabilities
            WHERE scan_job_id = $1
            ORDER BY severity, cve_id
            "#,
        )
        .bind(scan_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_vulnerability).collect())
    }

    /// 统计任务的漏洞条数
    pub async fn count_by_job(&self, scan_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM vulnerabilities WHERE scan_job_id = $1",
        )
        .bind(scan_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

#[async_trait::async_trait]
impl VulnerabilityStore for VulnerabilityRepository {
    /// 以任务为单位在单个事务内替换漏洞记录
    ///
    /// 先删后插使重投递天然幂等：同一消息被处理两次时第二次只是
    /// 用相同内容覆盖，不会产生重复行。
    async fn replace_for_job(
        &self,
        scan_id: Uuid,
        records: &[VulnerabilityRecord],
    ) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM vulnerabilities WHERE scan_job_id = $1")
            .bind(scan_id)
            .execute(&mut *tx)
            .await?;

        let mut count = 0;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO vulnerabilities
                (id, scan_job_id, cve_id, severity, package_name, installed_version, fixed_version, title, description)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(scan_id)
            .bind(&record.cve_id)
            .bind(record.severity)
            .bind(&record.package_name)
            .bind(&record.installed_version)
            .bind(&record.fixed_version)
            .bind(&record.title)
            .bind(&record.description)
            .execute(&mut *tx)
            .await?;
            count += 1;
        }

        tx.commit().await?;

        tracing::info!("任务 {} 已写入 {} 条漏洞记录", scan_id, count);
        Ok(count)
    }
}
