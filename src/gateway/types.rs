//! Sui JSON-RPC 响应结构（只保留用到的字段）。

use serde::Deserialize;
use serde_json::Value;

use crate::api::serde_helpers::string_or_u64;
use crate::sui::ObjectOwnership;

use super::{ExecutionResult, ExecutionStatus, GasUsed, LedgerEvent};

#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectResponse {
    #[serde(default)]
    pub data: Option<ObjectData>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectData {
    pub object_id: String,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub version: u64,
    pub digest: String,
    #[serde(default)]
    pub owner: Option<Value>,
}

impl ObjectData {
    /// `"Immutable"`、`{"Shared": {...}}`，其余形态都按地址/对象拥有处理。
    pub fn ownership(&self) -> Result<ObjectOwnership, String> {
        let Some(owner) = &self.owner else {
            return Err(format!("对象 {} 缺少 owner 字段", self.object_id));
        };
        if owner.as_str() == Some("Immutable") {
            return Ok(ObjectOwnership::Immutable);
        }
        if let Some(shared) = owner.get("Shared") {
            let version = shared
                .get("initial_shared_version")
                .and_then(value_as_u64)
                .ok_or_else(|| {
                    format!("共享对象 {} 缺少 initial_shared_version", self.object_id)
                })?;
            return Ok(ObjectOwnership::Shared {
                initial_shared_version: version,
            });
        }
        Ok(ObjectOwnership::Owned)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinPage {
    pub data: Vec<CoinObject>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinObject {
    pub coin_object_id: String,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub version: u64,
    pub digest: String,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub balance: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionBlockResponse {
    pub digest: String,
    #[serde(default)]
    pub effects: Option<TransactionEffects>,
    #[serde(default)]
    pub events: Option<Vec<EventJson>>,
}

#[derive(Debug, Deserialize)]
pub struct DryRunResponse {
    pub effects: TransactionEffects,
    #[serde(default)]
    pub events: Vec<EventJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEffects {
    pub status: EffectsStatus,
    pub gas_used: GasCostSummary,
    #[serde(default)]
    pub transaction_digest: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EffectsStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl EffectsStatus {
    pub fn to_status(&self) -> ExecutionStatus {
        if self.status == "success" {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure {
                reason: self
                    .error
                    .clone()
                    .unwrap_or_else(|| self.status.clone()),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasCostSummary {
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub computation_cost: u64,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub storage_cost: u64,
    #[serde(deserialize_with = "string_or_u64::deserialize")]
    pub storage_rebate: u64,
    #[serde(default, deserialize_with = "string_or_u64::deserialize")]
    pub non_refundable_storage_fee: u64,
}

impl From<&GasCostSummary> for GasUsed {
    fn from(summary: &GasCostSummary) -> Self {
        Self {
            computation_cost: summary.computation_cost,
            storage_cost: summary.storage_cost,
            storage_rebate: summary.storage_rebate,
            non_refundable_storage_fee: summary.non_refundable_storage_fee,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventJson {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub parsed_json: Value,
}

impl From<EventJson> for LedgerEvent {
    fn from(event: EventJson) -> Self {
        Self {
            event_type: event.event_type,
            sender: event.sender,
            parsed_json: event.parsed_json,
        }
    }
}

pub fn execution_result(
    digest: String,
    effects: &TransactionEffects,
    events: Vec<EventJson>,
) -> ExecutionResult {
    ExecutionResult {
        digest,
        status: effects.status.to_status(),
        gas_used: GasUsed::from(&effects.gas_used),
        events: events.into_iter().map(LedgerEvent::from).collect(),
    }
}

pub fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::String(raw) => raw.trim().parse().ok(),
        Value::Number(number) => number.as_u64(),
        _ => None,
    }
}
