use serde::{Deserialize, Serialize};

use super::serde_helpers::string_or_u64;

/// 余额/流动性不足时聚合器返回的错误码。
pub const INSUFFICIENT_LIQUIDITY_CODE: i64 = 10001;
pub const SUCCESS_CODE: i64 = 200;

/// `GET /find_routes` 的查询参数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FindRoutesRequest {
    pub from: String,
    pub target: String,
    pub amount: u64,
    pub by_amount_in: bool,
    pub depth: u32,
    pub split_count: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub providers: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindRoutesResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: Option<RouteData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteData {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub amount_in: u64,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub amount_out: u64,
    #[serde(default)]
    pub routes: Vec<RoutePlan>,
}

/// 一条完整的拆分路径。
#[derive(Debug, Clone, Deserialize)]
pub struct RoutePlan {
    pub path: Vec<PathSegment>,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub amount_in: u64,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub amount_out: u64,
}

/// 路径中的一跳（单个池子）。
#[derive(Debug, Clone, Deserialize)]
pub struct PathSegment {
    /// 池子对象 ID。
    pub id: String,
    /// `true` 表示 coin_a → coin_b。
    pub direction: bool,
    pub provider: String,
    pub from: String,
    pub target: String,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub amount_in: u64,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub amount_out: u64,
}
