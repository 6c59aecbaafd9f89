use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::sui::{
    CoinType, ObjectDigest, ObjectId, ObjectRef, ResolvedObject, SuiAddress,
};

use super::types::{
    CoinPage, DryRunResponse, JsonRpcResponse, ObjectResponse, TransactionBlockResponse,
    execution_result, value_as_u64,
};
use super::{
    ExecuteOptions, ExecutionResult, GasCoin, GatewayError, GatewayResult, LedgerGateway,
};

/// `sui_multiGetObjects` 单次最多查询的对象数。
const MULTI_GET_CHUNK: usize = 50;
const COIN_PAGE_LIMIT: u32 = 50;
const MAX_COIN_PAGES: usize = 20;
const EXECUTE_REQUEST_TYPE: &str = "WaitForLocalExecution";

/// 基于 JSON-RPC 2.0 的 Sui 全节点网关。
pub struct SuiRpcGateway {
    endpoint: String,
    client: Client,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl SuiRpcGateway {
    pub fn new(endpoint: String, client: Client, request_timeout: Duration) -> Self {
        Self {
            endpoint,
            client,
            request_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> GatewayResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let start = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.request_timeout)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                target: "gateway::rpc",
                method,
                status = %status,
                "RPC 请求返回非成功状态"
            );
            return Err(GatewayError::Status {
                endpoint: self.endpoint.clone(),
                status,
                body,
            });
        }

        let bytes = response.bytes().await?;
        let envelope: JsonRpcResponse<T> = serde_json::from_slice(&bytes)?;
        let elapsed_ms = start.elapsed().as_micros() as f64 / 1_000.0;
        debug!(target: "gateway::rpc", method, id, elapsed_ms, "RPC 请求完成");

        if let Some(error) = envelope.error {
            return Err(GatewayError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| GatewayError::Schema(format!("{method} 响应缺少 result 字段")))
    }
}

fn parse_u64(method: &str, value: &Value) -> GatewayResult<u64> {
    value_as_u64(value)
        .ok_or_else(|| GatewayError::Schema(format!("{method} 返回值不是整数: {value}")))
}

#[async_trait]
impl LedgerGateway for SuiRpcGateway {
    async fn latest_checkpoint(&self) -> GatewayResult<u64> {
        let method = "sui_getLatestCheckpointSequenceNumber";
        let value: Value = self.call(method, json!([])).await?;
        parse_u64(method, &value)
    }

    async fn resolve_objects(
        &self,
        ids: &[ObjectId],
    ) -> GatewayResult<HashMap<ObjectId, ResolvedObject>> {
        let mut resolved = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(MULTI_GET_CHUNK) {
            let params = json!([
                chunk.iter().map(ToString::to_string).collect::<Vec<_>>(),
                {"showOwner": true}
            ]);
            let responses: Vec<ObjectResponse> =
                self.call("sui_multiGetObjects", params).await?;
            if responses.len() != chunk.len() {
                return Err(GatewayError::Schema(format!(
                    "sui_multiGetObjects 返回 {} 个对象，期望 {}",
                    responses.len(),
                    chunk.len()
                )));
            }

            for (id, response) in chunk.iter().zip(responses) {
                let Some(data) = response.data else {
                    debug!(
                        target: "gateway::rpc",
                        object = %id,
                        error = ?response.error,
                        "对象查询失败"
                    );
                    return Err(GatewayError::ObjectNotFound(*id));
                };
                let ownership = data.ownership().map_err(GatewayError::Schema)?;
                let object_ref = ObjectRef {
                    object_id: ObjectId::from_str(&data.object_id)?,
                    version: data.version,
                    digest: ObjectDigest::from_str(&data.digest)?,
                };
                resolved.insert(
                    *id,
                    ResolvedObject {
                        object_ref,
                        ownership,
                    },
                );
            }
        }
        Ok(resolved)
    }

    async fn reference_gas_price(&self) -> GatewayResult<u64> {
        let method = "suix_getReferenceGasPrice";
        let value: Value = self.call(method, json!([])).await?;
        parse_u64(method, &value)
    }

    async fn gas_coins(&self, owner: SuiAddress) -> GatewayResult<Vec<GasCoin>> {
        let coin_type = CoinType::sui().to_string();
        let mut coins = Vec::new();
        let mut cursor: Option<String> = None;
        let mut truncated = false;

        for page_index in 0..MAX_COIN_PAGES {
            let params = json!([owner.to_string(), coin_type, cursor, COIN_PAGE_LIMIT]);
            let page: CoinPage = self.call("suix_getCoins", params).await?;
            for coin in page.data {
                coins.push(GasCoin {
                    object_ref: ObjectRef {
                        object_id: ObjectId::from_str(&coin.coin_object_id)?,
                        version: coin.version,
                        digest: ObjectDigest::from_str(&coin.digest)?,
                    },
                    balance: coin.balance,
                });
            }
            match (page.has_next_page, page.next_cursor) {
                (true, Some(next)) => {
                    truncated = page_index + 1 == MAX_COIN_PAGES;
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        if truncated {
            warn!(
                target: "gateway::rpc",
                owner = %owner,
                coins = coins.len(),
                pages = MAX_COIN_PAGES,
                "gas 币分页达到上限，其余币未加载；余额不足时可先合并小额币"
            );
        }

        debug!(
            target: "gateway::rpc",
            owner = %owner,
            coins = coins.len(),
            "已获取 gas 币列表"
        );
        Ok(coins)
    }

    async fn dry_run(&self, tx_bytes: &[u8]) -> GatewayResult<ExecutionResult> {
        let encoded = general_purpose::STANDARD.encode(tx_bytes);
        let response: DryRunResponse = self
            .call("sui_dryRunTransactionBlock", json!([encoded]))
            .await?;
        let digest = response
            .effects
            .transaction_digest
            .clone()
            .unwrap_or_default();
        Ok(execution_result(digest, &response.effects, response.events))
    }

    async fn execute(
        &self,
        tx_bytes: &[u8],
        signatures: &[String],
        options: ExecuteOptions,
    ) -> GatewayResult<ExecutionResult> {
        let encoded = general_purpose::STANDARD.encode(tx_bytes);
        let params = json!([
            encoded,
            signatures,
            {
                "showEffects": options.show_effects,
                "showEvents": options.show_events,
            },
            EXECUTE_REQUEST_TYPE,
        ]);
        let response: TransactionBlockResponse =
            self.call("sui_executeTransactionBlock", params).await?;

        let effects = response.effects.ok_or_else(|| {
            GatewayError::Schema(format!("交易 {} 未返回 effects", response.digest))
        })?;
        let result = execution_result(
            response.digest,
            &effects,
            response.events.unwrap_or_default(),
        );
        info!(
            target: "gateway::rpc",
            digest = %result.digest,
            success = result.status.is_success(),
            computation_cost = result.gas_used.computation_cost,
            events = result.events.len(),
            "交易已执行"
        );
        Ok(result)
    }
}
