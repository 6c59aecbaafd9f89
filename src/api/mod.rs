use std::time::{Duration, Instant};

use tracing::{debug, info};

pub mod error;
pub mod routes;
pub mod serde_helpers;

pub use error::AggregatorError;
pub use routes::{
    FindRoutesRequest, FindRoutesResponse, INSUFFICIENT_LIQUIDITY_CODE, PathSegment, RouteData,
    RoutePlan, SUCCESS_CODE,
};

/// Cetus 聚合器 HTTP 客户端，只做只读查询。
#[derive(Clone, Debug)]
pub struct AggregatorApiClient {
    base_url: String,
    client: reqwest::Client,
    request_timeout: Duration,
}

impl AggregatorApiClient {
    pub fn new(client: reqwest::Client, base_url: String, request_timeout: Duration) -> Self {
        Self {
            base_url,
            client,
            request_timeout,
        }
    }

    /// 查询路由；无可用路由时返回 `Ok(None)`。
    pub async fn find_routes(
        &self,
        request: &FindRoutesRequest,
    ) -> Result<Option<RouteData>, AggregatorError> {
        let url = self.endpoint("/find_routes");
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .timeout(self.request_timeout)
            .query(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AggregatorError::ApiStatus {
                endpoint: url,
                status,
                body,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: FindRoutesResponse = serde_json::from_slice(&bytes)?;
        let elapsed_ms = start.elapsed().as_micros() as f64 / 1_000.0;

        if parsed.code == INSUFFICIENT_LIQUIDITY_CODE {
            info!(
                target: "aggregator",
                from = %request.from,
                target_coin = %request.target,
                amount = request.amount,
                code = parsed.code,
                msg = %parsed.msg,
                elapsed_ms,
                "聚合器未找到可用路由"
            );
            return Ok(None);
        }
        if parsed.code != SUCCESS_CODE {
            return Err(AggregatorError::Api {
                code: parsed.code,
                msg: parsed.msg,
            });
        }

        let data = parsed
            .data
            .ok_or_else(|| AggregatorError::Schema("成功响应缺少 data 字段".to_string()))?;
        if data.routes.is_empty() {
            info!(
                target: "aggregator",
                from = %request.from,
                target_coin = %request.target,
                amount = request.amount,
                elapsed_ms,
                "聚合器返回空路由"
            );
            return Ok(None);
        }

        debug!(
            target: "aggregator",
            request_id = data.request_id.as_deref().unwrap_or(""),
            routes = data.routes.len(),
            amount_in = data.amount_in,
            amount_out = data.amount_out,
            elapsed_ms,
            "路由查询完成"
        );
        Ok(Some(data))
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
