use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("聚合器请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("聚合器响应解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("聚合器接口 {endpoint} 返回状态 {status}: {body}")]
    ApiStatus {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("聚合器返回错误码 {code}: {msg}")]
    Api { code: i64, msg: String },
    #[error("聚合器响应结构异常: {0}")]
    Schema(String),
}
