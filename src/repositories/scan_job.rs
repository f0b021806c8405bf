use super::ScanJobStore;
use crate::{
    error::AppError,
    models::{PagedResult, Pagination, ScanJob, ScanJobFilter, ScanJobStats, ScanStatus, ScanType},
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

/// 扫描任务存储库（避免复杂的sqlx宏，使用运行时查询）
#[derive(Debug, Clone)]
pub struct ScanJobRepository {
    pool: PgPool,
}

const JOB_COLUMNS: &str =
    "id, scan_type, target, status, error_message, created_at, started_at, completed_at";

fn row_to_job(row: &PgRow) -> ScanJob {
    ScanJob {
        id: row.get("id"),
        scan_type: row.get("scan_type"),
        target: row.get("target"),
        status: row.get("status"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    }
}

impl ScanJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 获取数据库连接池引用
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 按ID查询任务
    pub async fn get(&self, scan_id: Uuid) -> Result<Option<ScanJob>, AppError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM scan_jobs WHERE id = $1");

        let row = sqlx::query(&query)
            .bind(scan_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_job))
    }

    /// 分页查询任务列表
    pub async fn list(
        &self,
        filter: &ScanJobFilter,
        pagination: &Pagination,
    ) -> Result<PagedResult<ScanJob>, AppError> {
        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {JOB_COLUMNS}, COUNT(*) OVER() AS total_count FROM scan_jobs WHERE 1=1"
        ));

        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(scan_type) = filter.scan_type {
            qb.push(" AND scan_type = ").push_bind(scan_type);
        }

        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(pagination.limit())
            .push(" OFFSET ")
            .push_bind(pagination.offset());

        let rows = qb.build().fetch_all(&self.pool).await?;

        let total = rows
            .first()
            .map(|r| r.get::<i64, _>("total_count"))
            .unwrap_or(0);
        let items = rows.iter().map(row_to_job).collect();

        Ok(PagedResult::new(
            items,
            total,
            pagination.page,
            pagination.page_size,
        ))
    }

    /// 按状态统计任务数
    pub async fn stats(&self) -> Result<ScanJobStats, AppError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'queued') AS queued,
                COUNT(*) FILTER (WHERE status = 'scanning') AS scanning,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM scan_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ScanJobStats {
            total: row.get("total"),
            queued: row.get("queued"),
            scanning: row.get("scanning"),
            completed: row.get("completed"),
            failed: row.get("failed"),
        })
    }
}

#[async_trait::async_trait]
impl ScanJobStore for ScanJobRepository {
    /// 创建扫描任务记录，初始状态为queued
    ///
    /// 该写入必须先于消息入队完成：宁可出现有行无消息（任务停留
    /// 在queued），也不能出现有消息无行。
    async fn create(
        &self,
        scan_id: Uuid,
        scan_type: ScanType,
        target: &str,
    ) -> Result<ScanJob, AppError> {
        let query = format!(
            r#"
            INSERT INTO scan_jobs (id, scan_type, target, status, created_at)
            VALUES ($1, $2, $3, 'queued', NOW())
            RETURNING {JOB_COLUMNS}
            "#
        );

        let row = sqlx::query(&query)
            .bind(scan_id)
            .bind(scan_type)
            .bind(target)
            .fetch_one(&self.pool)
            .await?;

        tracing::info!("已创建扫描任务记录: {}", scan_id);

        Ok(row_to_job(&row))
    }

    /// 状态推进写入
    ///
    /// WHERE条件保证状态只单向前进：终态行不会被重投递的消息拉回，
    /// 重复写入同一目标状态是无副作用的空操作（COALESCE保证时间戳
    /// 至多写入一次）。未命中任何行时记录警告而不报错。
    async fn update_status(
        &self,
        scan_id: Uuid,
        status: ScanStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let result = match status {
            ScanStatus::Scanning => {
                sqlx::query(
                    r#"
                    UPDATE scan_jobs
                    SET status = 'scanning', started_at = COALESCE(started_at, NOW())
                    WHERE id = $1 AND status IN ('queued', 'scanning')
                    "#,
                )
                .bind(scan_id)
                .execute(&self.pool)
                .await?
            }
            ScanStatus::Completed => {
                sqlx::query(
                    r#"
                    UPDATE scan_jobs
                    SET status = 'completed', completed_at = COALESCE(completed_at, NOW())
                    WHERE id = $1 AND status IN ('scanning', 'completed')
                    "#,
                )
                .bind(scan_id)
                .execute(&self.pool)
                .await?
            }
            ScanStatus::Failed => {
                sqlx::query(
                    r#"
                    UPDATE scan_jobs
                    SET status = 'failed',
                        completed_at = COALESCE(completed_at, NOW()),
                        error_message = $2
                    WHERE id = $1 AND status <> 'completed'
                    "#,
                )
                .bind(scan_id)
                .bind(error_message)
                .execute(&self.pool)
                .await?
            }
            ScanStatus::Queued => {
                // queued只在创建时设置，不经由状态更新到达
                tracing::warn!("忽略向queued的状态更新: {}", scan_id);
                return Ok(());
            }
        };

        if result.rows_affected() == 0 {
            tracing::warn!(
                "状态更新未命中任何行（任务不存在或已处于终态）: scan_id={}, status={:?}",
                scan_id,
                status
            );
        } else {
            tracing::info!("任务 {} 状态更新为 {:?}", scan_id, status);
        }

        Ok(())
    }
}
