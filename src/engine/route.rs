//! 路由发现：查询聚合器，并把返回的路径展开成草稿中的 swap 步骤。

use std::collections::BTreeMap;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::api::{AggregatorApiClient, AggregatorError, FindRoutesRequest, RouteData};
use crate::sui::{CoinType, ObjectId, SuiAddress, SuiTypeError};

use super::draft::{DraftError, HandleRef, MoveTarget, Operand, TransactionDraft};
use super::types::{Slippage, SwapDirection};

pub const CLOCK_OBJECT_ID: ObjectId = SuiAddress::from_low_byte(6);
pub const THRESHOLD_MODULE: &str = "router";
pub const THRESHOLD_FUNCTION: &str = "check_coin_threshold";

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("聚合器错误: {0}")]
    Api(#[from] AggregatorError),
    #[error("交易草稿错误: {0}")]
    Draft(#[from] DraftError),
    #[error("路由数据非法: {0}")]
    InvalidRoute(String),
    #[error("不支持的流动性来源: {0}")]
    UnsupportedProvider(String),
    #[error("类型解析失败: {0}")]
    Type(#[from] SuiTypeError),
}

pub type RouteResult<T> = Result<T, RouteError>;

#[async_trait]
pub trait RouteDiscovery: Send + Sync {
    /// 只读查询；无可用路由时返回 `Ok(None)`。
    async fn find_route(
        &self,
        from: &CoinType,
        to: &CoinType,
        amount: u64,
        direction: SwapDirection,
    ) -> RouteResult<Option<Route>>;

    /// 进入 swap 步骤的输入币数量。
    fn input_budget(&self, route: &Route, slippage: Slippage) -> u64;

    /// 把路由展开到 `draft` 中，消费 `input`，返回输出币句柄。
    fn build_swap_step(
        &self,
        route: &Route,
        draft: &mut TransactionDraft,
        input: HandleRef,
        slippage: Slippage,
    ) -> RouteResult<HandleRef>;
}

/// 聚合器给出的一次性路由，只由产生它的路由客户端解读。
#[derive(Debug, Clone)]
pub struct Route {
    from: CoinType,
    to: CoinType,
    direction: SwapDirection,
    amount_in: u64,
    amount_out: u64,
    legs: Vec<RouteLeg>,
    request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct RouteLeg {
    pub(crate) amount_in: u64,
    pub(crate) amount_out: u64,
    pub(crate) hops: Vec<RouteHop>,
}

#[derive(Debug, Clone)]
pub(crate) struct RouteHop {
    pub(crate) pool: ObjectId,
    pub(crate) a2b: bool,
    pub(crate) provider: String,
    pub(crate) module: String,
    pub(crate) coin_in: CoinType,
    pub(crate) coin_out: CoinType,
}

impl Route {
    pub(crate) fn new(
        from: CoinType,
        to: CoinType,
        direction: SwapDirection,
        amount_in: u64,
        amount_out: u64,
        legs: Vec<RouteLeg>,
    ) -> RouteResult<Self> {
        if legs.is_empty() {
            return Err(RouteError::InvalidRoute("路由不含任何路径".to_string()));
        }
        for (index, leg) in legs.iter().enumerate() {
            let (Some(first), Some(last)) = (leg.hops.first(), leg.hops.last()) else {
                return Err(RouteError::InvalidRoute(format!("第 {index} 条路径为空")));
            };
            if first.coin_in != from || last.coin_out != to {
                return Err(RouteError::InvalidRoute(format!(
                    "第 {index} 条路径首尾资产与请求不一致"
                )));
            }
            if leg
                .hops
                .windows(2)
                .any(|pair| pair[0].coin_out != pair[1].coin_in)
            {
                return Err(RouteError::InvalidRoute(format!(
                    "第 {index} 条路径相邻两跳的资产不连续"
                )));
            }
        }
        Ok(Self {
            from,
            to,
            direction,
            amount_in,
            amount_out,
            legs,
            request_id: None,
        })
    }

    pub fn from_coin(&self) -> &CoinType {
        &self.from
    }

    pub fn to_coin(&self) -> &CoinType {
        &self.to
    }

    pub fn direction(&self) -> SwapDirection {
        self.direction
    }

    pub fn amount_in(&self) -> u64 {
        self.amount_in
    }

    /// 预期输出数量。
    pub fn amount_out(&self) -> u64 {
        self.amount_out
    }

    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    pub fn hop_count(&self) -> usize {
        self.legs.iter().map(|leg| leg.hops.len()).sum()
    }

    pub fn providers(&self) -> Vec<&str> {
        let mut providers: Vec<&str> = self
            .legs
            .iter()
            .flat_map(|leg| leg.hops.iter().map(|hop| hop.provider.as_str()))
            .collect();
        providers.sort_unstable();
        providers.dedup();
        providers
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub router_package: ObjectId,
    pub providers: Vec<String>,
    pub depth: u32,
    pub split_count: u32,
    /// 流动性来源 → 路由合约中的模块名。
    pub provider_modules: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct CetusRouter {
    client: AggregatorApiClient,
    settings: RouterSettings,
}

impl CetusRouter {
    pub fn new(client: AggregatorApiClient, settings: RouterSettings) -> Self {
        Self { client, settings }
    }

    fn provider_module(&self, provider: &str) -> RouteResult<&str> {
        self.settings
            .provider_modules
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(provider))
            .map(|(_, module)| module.as_str())
            .ok_or_else(|| RouteError::UnsupportedProvider(provider.to_string()))
    }

    fn route_from_data(
        &self,
        from: &CoinType,
        to: &CoinType,
        direction: SwapDirection,
        data: RouteData,
    ) -> RouteResult<Route> {
        let mut legs = Vec::with_capacity(data.routes.len());
        for plan in data.routes {
            let mut hops = Vec::with_capacity(plan.path.len());
            for segment in plan.path {
                let pool = ObjectId::from_str(&segment.id)?;
                let module = self.provider_module(&segment.provider)?.to_string();
                hops.push(RouteHop {
                    pool,
                    a2b: segment.direction,
                    provider: segment.provider,
                    module,
                    coin_in: CoinType::from_str(&segment.from)?,
                    coin_out: CoinType::from_str(&segment.target)?,
                });
            }
            legs.push(RouteLeg {
                amount_in: plan.amount_in,
                amount_out: plan.amount_out,
                hops,
            });
        }

        let mut route = Route::new(
            from.clone(),
            to.clone(),
            direction,
            data.amount_in,
            data.amount_out,
            legs,
        )?;
        route.request_id = data.request_id;
        Ok(route)
    }

    fn hop_target(&self, hop: &RouteHop) -> MoveTarget {
        let function = if hop.a2b { "swap_a2b" } else { "swap_b2a" };
        MoveTarget::new(self.settings.router_package, &hop.module, function)
    }
}

#[async_trait]
impl RouteDiscovery for CetusRouter {
    async fn find_route(
        &self,
        from: &CoinType,
        to: &CoinType,
        amount: u64,
        direction: SwapDirection,
    ) -> RouteResult<Option<Route>> {
        let request = FindRoutesRequest {
            from: from.to_string(),
            target: to.to_string(),
            amount,
            by_amount_in: direction.by_amount_in(),
            depth: self.settings.depth,
            split_count: self.settings.split_count,
            providers: self.settings.providers.join(","),
        };

        let Some(data) = self.client.find_routes(&request).await? else {
            return Ok(None);
        };
        let route = self.route_from_data(from, to, direction, data)?;
        info!(
            target: "engine::route",
            from = %route.from,
            to = %route.to,
            amount_in = route.amount_in,
            amount_out = route.amount_out,
            legs = route.leg_count(),
            hops = route.hop_count(),
            providers = ?route.providers(),
            "已获取路由"
        );
        Ok(Some(route))
    }

    fn input_budget(&self, route: &Route, slippage: Slippage) -> u64 {
        match route.direction {
            SwapDirection::AmountIn => route.amount_in,
            SwapDirection::AmountOut => slippage.max_input(route.amount_in),
        }
    }

    fn build_swap_step(
        &self,
        route: &Route,
        draft: &mut TransactionDraft,
        input: HandleRef,
        slippage: Slippage,
    ) -> RouteResult<HandleRef> {
        // 多条路径共享同一个输入币：前 n-1 条按各自数量拆出，余额留给最后一条。
        let mut leg_coins = Vec::with_capacity(route.legs.len());
        if let Some((_, head)) = route.legs.split_last() {
            if !head.is_empty() {
                let amounts = head
                    .iter()
                    .map(|leg| draft.pure_u64(leg.amount_in))
                    .collect::<Result<Vec<_>, _>>()?;
                leg_coins = draft.split_coins(Operand::Borrow(input), amounts)?;
            }
        }
        leg_coins.push(input);

        let clock = draft.object_readonly(CLOCK_OBJECT_ID)?;
        let mut outputs = Vec::with_capacity(route.legs.len());
        for (leg, coin) in route.legs.iter().zip(leg_coins) {
            let mut current = coin;
            for hop in &leg.hops {
                let (coin_a, coin_b) = if hop.a2b {
                    (&hop.coin_in, &hop.coin_out)
                } else {
                    (&hop.coin_out, &hop.coin_in)
                };
                let pool = draft.object(hop.pool)?;
                let results = draft.move_call(
                    self.hop_target(hop),
                    vec![coin_a.type_tag(), coin_b.type_tag()],
                    vec![pool, Operand::Take(current), clock],
                    1,
                )?;
                current = results[0];
            }
            outputs.push(current);
        }

        let output = outputs[0];
        if outputs.len() > 1 {
            let sources = outputs[1..].iter().copied().map(Operand::Take).collect();
            draft.merge_coins(Operand::Borrow(output), sources)?;
        }

        let bound = match route.direction {
            SwapDirection::AmountIn => slippage.min_output(route.amount_out),
            SwapDirection::AmountOut => route.amount_out,
        };
        let bound_operand = draft.pure_u64(bound)?;
        draft.move_call(
            MoveTarget::new(
                self.settings.router_package,
                THRESHOLD_MODULE,
                THRESHOLD_FUNCTION,
            ),
            vec![route.to.type_tag()],
            vec![Operand::Borrow(output), bound_operand],
            0,
        )?;

        debug!(
            target: "engine::route",
            legs = route.legs.len(),
            expected_out = route.amount_out,
            min_out = bound,
            slippage = %slippage,
            output = %output,
            "swap 步骤已写入草稿"
        );
        Ok(output)
    }
}
