use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 统一API响应格式
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// 业务响应码
    pub code: i32,
    /// 响应消息（中文）
    pub msg: String,
    /// 响应数据
    pub data: Option<T>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    /// 创建成功响应
    pub fn success(data: T) -> Self {
        Self {
            code: ResponseCode::SUCCESS,
            msg: "操作成功".to_string(),
            data: Some(data),
        }
    }

    /// 创建成功响应（自定义消息）
    pub fn success_with_message(data: T, msg: String) -> Self {
        Self {
            code: ResponseCode::SUCCESS,
            msg,
            data: Some(data),
        }
    }

    /// 创建已受理响应（异步任务已入队）
    pub fn accepted(data: T) -> Self {
        Self {
            code: ResponseCode::ACCEPTED,
            msg: "扫描请求已入队".to_string(),
            data: Some(data),
        }
    }

    /// 创建错误响应
    pub fn error(code: i32, msg: String) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg,
            data: None,
        }
    }

    /// 创建错误响应（带数据）
    pub fn error_with_data(code: i32, msg: String, data: T) -> Self {
        Self {
            code,
            msg,
            data: Some(data),
        }
    }
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        // 根据业务响应码确定HTTP状态码
        let status = match self.code {
            ResponseCode::SUCCESS => StatusCode::OK,
            ResponseCode::ACCEPTED => StatusCode::ACCEPTED,
            ResponseCode::BAD_REQUEST => StatusCode::BAD_REQUEST,
            ResponseCode::NOT_FOUND => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// 业务响应码常量
pub struct ResponseCode;

impl ResponseCode {
    /// 成功响应码
    pub const SUCCESS: i32 = 200;
    pub const ACCEPTED: i32 = 202;

    /// 客户端错误 4xx
    pub const BAD_REQUEST: i32 = 400;
    pub const NOT_FOUND: i32 = 404;

    /// 服务器错误 5xx
    pub const INTERNAL_ERROR: i32 = 500;
    pub const DATABASE_ERROR: i32 = 501;
    pub const STORAGE_ERROR: i32 = 502;
    pub const QUEUE_ERROR: i32 = 503;
    pub const SCAN_EXECUTION_ERROR: i32 = 504;
}

/// 响应码对应的默认消息
impl ResponseCode {
    pub fn get_message(code: i32) -> &'static str {
        match code {
            Self::SUCCESS => "操作成功",
            Self::ACCEPTED => "请求已受理",
            Self::BAD_REQUEST => "请求参数错误",
            Self::NOT_FOUND => "资源不存在",
            Self::INTERNAL_ERROR => "服务器内部错误",
            Self::DATABASE_ERROR => "数据库错误",
            Self::STORAGE_ERROR => "存储服务错误",
            Self::QUEUE_ERROR => "队列服务错误",
            Self::SCAN_EXECUTION_ERROR => "扫描执行错误",
            _ => "未知错误",
        }
    }
}

/// 便捷的响应构造宏
#[macro_export]
macro_rules! ok_response {
    ($data:expr) => {
        $crate::response::ApiResponse::success($data)
    };
}

#[macro_export]
macro_rules! err_response {
    ($code:expr) => {
        $crate::response::ApiResponse::error(
            $code,
            $crate::response::ResponseCode::get_message($code).to_string(),
        )
    };
    ($code:expr, $msg:expr) => {
        $crate::response::ApiResponse::error($code, $msg.to_string())
    };
}
