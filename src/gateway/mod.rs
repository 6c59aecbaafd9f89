//! 账本网关：读取链上状态、解析对象引用、试运行与提交已签名交易。

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::Value;

use crate::sui::{ObjectId, ObjectRef, ResolvedObject, SuiAddress};

pub mod error;
pub mod rpc;
pub mod types;

pub use error::{GatewayError, GatewayResult};
pub use rpc::SuiRpcGateway;

/// 单笔交易允许的最大 gas 支付币数量。
pub const MAX_GAS_OBJECTS: usize = 256;
/// 估算预算时额外预留的计算单位（乘以 gas 单价）。
pub const GAS_SAFE_OVERHEAD: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub show_effects: bool,
    pub show_events: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            show_effects: true,
            show_events: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure { reason: String },
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasUsed {
    pub computation_cost: u64,
    pub storage_cost: u64,
    pub storage_rebate: u64,
    pub non_refundable_storage_fee: u64,
}

impl GasUsed {
    /// 按试运行结果估算预算：`max(base, base + storage − rebate)`，
    /// 其中 `base = computation + GAS_SAFE_OVERHEAD × price`。
    pub fn estimate_budget(&self, gas_price: u64) -> u64 {
        let overhead = GAS_SAFE_OVERHEAD.saturating_mul(gas_price);
        let base = self.computation_cost.saturating_add(overhead);
        let with_storage = base
            .saturating_add(self.storage_cost)
            .saturating_sub(self.storage_rebate);
        base.max(with_storage)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEvent {
    pub event_type: String,
    pub sender: Option<String>,
    pub parsed_json: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub digest: String,
    pub status: ExecutionStatus,
    pub gas_used: GasUsed,
    pub events: Vec<LedgerEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasCoin {
    pub object_ref: ObjectRef,
    pub balance: u64,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn latest_checkpoint(&self) -> GatewayResult<u64>;

    async fn resolve_objects(
        &self,
        ids: &[ObjectId],
    ) -> GatewayResult<HashMap<ObjectId, ResolvedObject>>;

    async fn reference_gas_price(&self) -> GatewayResult<u64>;

    async fn gas_coins(&self, owner: SuiAddress) -> GatewayResult<Vec<GasCoin>>;

    async fn dry_run(&self, tx_bytes: &[u8]) -> GatewayResult<ExecutionResult>;

    async fn execute(
        &self,
        tx_bytes: &[u8],
        signatures: &[String],
        options: ExecuteOptions,
    ) -> GatewayResult<ExecutionResult>;
}

/// 按余额从大到小挑选 gas 币，直到覆盖 `required`；`exclude` 中的币已被交易本身引用。
pub fn select_gas_coins(
    mut coins: Vec<GasCoin>,
    required: u64,
    exclude: &HashSet<ObjectId>,
) -> GatewayResult<Vec<ObjectRef>> {
    coins.retain(|coin| !exclude.contains(&coin.object_ref.object_id));
    coins.sort_by(|a, b| b.balance.cmp(&a.balance));

    let mut selected = Vec::new();
    let mut total = 0u64;
    for coin in coins.into_iter().take(MAX_GAS_OBJECTS) {
        if total >= required && !selected.is_empty() {
            break;
        }
        total = total.saturating_add(coin.balance);
        selected.push(coin.object_ref);
    }

    if total < required || selected.is_empty() {
        return Err(GatewayError::InsufficientGas {
            required,
            available: total,
        });
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sui::ObjectDigest;

    fn coin(id: u8, balance: u64) -> GasCoin {
        GasCoin {
            object_ref: ObjectRef {
                object_id: ObjectId::from_low_byte(id),
                version: 1,
                digest: ObjectDigest::new([id; 32]),
            },
            balance,
        }
    }

    #[test]
    fn estimate_budget_adds_overhead_and_net_storage() {
        let used = GasUsed {
            computation_cost: 1_000_000,
            storage_cost: 2_000_000,
            storage_rebate: 978_120,
            non_refundable_storage_fee: 9_880,
        };
        assert_eq!(used.estimate_budget(750), 2_771_880);

        let rebate_heavy = GasUsed {
            computation_cost: 1_000_000,
            storage_cost: 0,
            storage_rebate: 5_000_000,
            non_refundable_storage_fee: 0,
        };
        assert_eq!(rebate_heavy.estimate_budget(750), 1_750_000);
    }

    #[test]
    fn selects_largest_coins_first() {
        let selected = select_gas_coins(
            vec![coin(1, 10), coin(2, 500), coin(3, 200)],
            600,
            &HashSet::new(),
        )
        .unwrap();
        let ids: Vec<_> = selected.iter().map(|r| r.object_id).collect();
        assert_eq!(ids, vec![ObjectId::from_low_byte(2), ObjectId::from_low_byte(3)]);
    }

    #[test]
    fn excluded_coins_are_skipped() {
        let exclude = HashSet::from([ObjectId::from_low_byte(2)]);
        let err = select_gas_coins(vec![coin(1, 10), coin(2, 500)], 100, &exclude).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::InsufficientGas {
                required: 100,
                available: 10
            }
        ));
    }

    #[test]
    fn empty_wallet_is_insufficient() {
        let err = select_gas_coins(Vec::new(), 0, &HashSet::new()).unwrap_err();
        assert!(matches!(err, GatewayError::InsufficientGas { .. }));
    }
}
