/*
 * ScanPipe - Asynchronous Security Scanning Platform
 * Copyright (c) 2024 ScanPipe Project
 *
 * This work is licensed under CC BY-NC-SA 4.0
 * https://creativecommons.org/licenses/by-nc-sa/4.0/
 */

use axum::response::Html;
use axum::{
    Router,
    extract::{Query, State},
    http::Method,
    response::Json,
    routing::get,
};
use scanpipe_backend::{
    config::Config,
    database::Database,
    docs::ApiDoc,
    error::AppResult,
    handlers::AppState,
    queue::SqsQueue,
    repositories::{ScanJobRepository, VulnerabilityRepository},
    response::ApiResponse,
    routes::create_api_routes,
    storage::S3Storage,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

#[derive(Deserialize)]
struct HealthQuery {
    #[serde(default)]
    detail: bool,
}

/// 健康检查处理器
async fn health_check(Query(params): Query<HealthQuery>) -> Json<ApiResponse<serde_json::Value>> {
    if params.detail {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let mut details = HashMap::new();
        details.insert("status", "healthy");
        details.insert("version", "0.1.0");
        details.insert("timestamp", timestamp.as_str());

        Json(ApiResponse::success(serde_json::json!(details)))
    } else {
        Json(ApiResponse::success(serde_json::json!({"status": "ok"})))
    }
}

/// 数据库健康检查处理器
async fn db_health_check(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<serde_json::Value>> {
    match app_state.database.health_check().await {
        Ok(true) => Json(ApiResponse::success(
            serde_json::json!({"database": "healthy"}),
        )),
        Ok(false) => Json(ApiResponse::error_with_data(
            503,
            "数据库连接异常".to_string(),
            serde_json::json!({"status": "unhealthy"}),
        )),
        Err(e) => {
            tracing::error!("数据库健康检查失败: {}", e);
            Json(ApiResponse::error_with_data(
                503,
                format!("数据库健康检查失败: {}", e),
                serde_json::json!({"status": "error"}),
            ))
        }
    }
}

/// 存储健康检查处理器
async fn storage_health_check(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<serde_json::Value>> {
    match app_state.storage.health_check().await {
        Ok(true) => Json(ApiResponse::success(
            serde_json::json!({"storage": "healthy"}),
        )),
        _ => Json(ApiResponse::error_with_data(
            503,
            "存储服务连接异常".to_string(),
            serde_json::json!({"status": "unhealthy"}),
        )),
    }
}

/// 队列健康检查处理器
async fn queue_health_check(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<serde_json::Value>> {
    match app_state.queue.health_check().await {
        Ok(true) => Json(ApiResponse::success(serde_json::json!({"queue": "healthy"}))),
        _ => Json(ApiResponse::error_with_data(
            503,
            "队列服务连接异常".to_string(),
            serde_json::json!({"status": "unhealthy"}),
        )),
    }
}

/// Swagger UI 页面（访问路径：/swagger-ui）
/// OpenAPI JSON 路径：/api-docs/openapi.json
async fn swagger_ui_page() -> Html<String> {
    let html = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset=UTF-8>
  <title>ScanPipe API 文档</title>
  <link rel=stylesheet href=https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.11.0/swagger-ui.css>
</head>
<body>
  <div id=swagger-ui></div>
  <script src=https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.11.0/swagger-ui-bundle.js></script>
  <script src=https://cdn.jsdelivr.net/npm/swagger-ui-dist@5.11.0/swagger-ui-standalone-preset.js></script>
  <script>
    window.onload = function() {
      window.ui = SwaggerUIBundle({
        url: '/api-docs/openapi.json',
        dom_id: '#swagger-ui',
        deepLinking: true,
        presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
        layout: 'StandaloneLayout',
        validatorUrl: null
      });
    };
  </script>
</body>
</html>"#
        .to_string();
    Html(html)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scanpipe_backend=debug,tower_http=debug".into()),
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
            let default_config = Config::default();
            // 保存默认配置到文件
            if let Err(e) = default_config.save_to_file("config.toml") {
                tracing::warn!("保存默认配置失败: {}", e);
            }
            default_config
        }
    };

    tracing::info!("服务器配置: {}", config.server_addr());

    // 外部依赖在启动时一次性构造，连接失败直接终止进程
    let database = Database::new(&config.database).await?;
    database.verify_connection().await?;

    let storage = S3Storage::new(config.storage.clone()).await?;
    storage.ensure_bucket(&config.storage.bucket).await?;

    let queue = Arc::new(SqsQueue::new(config.queue.clone()).await?);

    let scan_jobs = ScanJobRepository::new(database.pool().clone());
    let vulnerabilities = VulnerabilityRepository::new(database.pool().clone());

    // 创建应用状态
    let app_state = AppState {
        database,
        storage,
        queue,
        scan_jobs,
        vulnerabilities,
        config: config.clone(),
    };

    // 创建CORS中间件
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        // 健康检查
        .route("/health", get(health_check))
        .route("/api/health/db", get(db_health_check))
        .route("/api/health/storage", get(storage_health_check))
        .route("/api/health/queue", get(queue_health_check))
        // OpenAPI JSON 路由
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        // Swagger UI 页面
        .route("/swagger-ui", get(swagger_ui_page))
        .route("/swagger-ui/", get(swagger_ui_page))
        // 业务API路由
        .merge(create_api_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // 启动服务器
    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!("🚀 服务器启动成功，监听地址: {}", config.server_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
