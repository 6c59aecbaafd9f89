use thiserror::Error;

use crate::sui::{ObjectId, SuiTypeError};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("网络请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON 解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("RPC 节点 {endpoint} 返回状态 {status}: {body}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("RPC 方法 {method} 返回错误 {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },
    #[error("RPC 响应结构异常: {0}")]
    Schema(String),
    #[error("链上对象 {0} 不存在或已删除")]
    ObjectNotFound(ObjectId),
    #[error("gas 余额不足: 需要 {required}，可用 {available}")]
    InsufficientGas { required: u64, available: u64 },
    #[error("链上数据解析失败: {0}")]
    Type(#[from] SuiTypeError),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
