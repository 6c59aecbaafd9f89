use rust_decimal::Decimal;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::wallet::KeyError;

use super::composer::ComposeError;
use super::draft::DraftError;
use super::route::RouteError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("滑点必须位于 (0, 1) 区间，实际为 {0}")]
    InvalidSlippage(Decimal),
    #[error("签名身份解析失败: {0}")]
    Key(#[from] KeyError),
    #[error("路由发现失败: {0}")]
    Route(#[from] RouteError),
    #[error("交易组装失败: {0}")]
    Compose(#[from] ComposeError),
    #[error("交易草稿非法: {0}")]
    Draft(#[from] DraftError),
    #[error("账本网关错误: {0}")]
    Gateway(#[from] GatewayError),
    #[error("gas 预估失败: {0}")]
    GasEstimation(String),
    #[error("交易 {digest} 链上执行失败: {reason}")]
    OnChainFailure { digest: String, reason: String },
    /// 运行被外部取消；`digest` 为已发出但未确认结果的交易。
    #[error("运行被中断{}", interrupted_detail(.digest))]
    Interrupted { digest: Option<String> },
}

fn interrupted_detail(digest: &Option<String>) -> String {
    match digest {
        Some(digest) => format!("，交易 {digest} 已提交但结果未知"),
        None => "，未提交任何交易".to_string(),
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
