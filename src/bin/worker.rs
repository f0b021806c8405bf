/*
 * ScanPipe - Asynchronous Security Scanning Platform
 * Copyright (c) 2024 ScanPipe Project
 *
 * This work is licensed under CC BY-NC-SA 4.0
 * https://creativecommons.org/licenses/by-nc-sa/4.0/
 */

use scanpipe_backend::{
    config::Config,
    database::Database,
    error::AppResult,
    queue::SqsQueue,
    repositories::{ScanJobRepository, VulnerabilityRepository},
    scanner::TrivyScanner,
    services::ScanWorker,
    storage::S3Storage,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> AppResult<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanpipe_backend=debug,worker=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = match Config::from_file("config.toml") {
        Ok(config) => {
            tracing::info!("已加载配置文件: config.toml");
            config
        }
        Err(_) => {
            tracing::warn!("未找到配置文件，使用默认配置");
            Config::default()
        }
    };

    // 外部依赖在启动时一次性构造，连接失败直接终止进程
    let database = Database::new(&config.database).await?;
    database.verify_connection().await?;

    let storage = S3Storage::new(config.storage.clone()).await?;
    storage.ensure_bucket(&config.storage.bucket).await?;

    let queue = SqsQueue::new(config.queue.clone()).await?;
    let scanner = TrivyScanner::new(config.scanner.clone());

    let scan_jobs = ScanJobRepository::new(database.pool().clone());
    let vulnerabilities = VulnerabilityRepository::new(database.pool().clone());

    let worker = ScanWorker::new(
        Arc::new(queue),
        Arc::new(scanner),
        Arc::new(scan_jobs),
        Arc::new(vulnerabilities),
        Arc::new(storage),
        config.storage.bucket.clone(),
        config.queue.clone(),
    );

    // Ctrl+C触发停机；处理中被打断的消息按可见性超时重投
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("监听停机信号失败: {}", e);
            return;
        }
        tracing::info!("收到停机信号，正在退出轮询循环");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;

    database.close().await;
    tracing::info!("扫描工作进程已退出");

    Ok(())
}
