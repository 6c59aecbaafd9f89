//! 单次运行的状态机：身份 → 路由 → 组装 → 准备 gas → 签名提交 → 结算。
//!
//! 每次运行至多提交一次，不做任何自动重试。

use std::collections::{HashMap, HashSet};

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::gateway::{
    ExecuteOptions, ExecutionResult, ExecutionStatus, LedgerGateway, select_gas_coins,
};
use crate::monitoring::events;
use crate::sui::{CoinType, ObjectId, ResolvedObject, SuiAddress, TransactionData};
use crate::wallet::SigningIdentity;

use super::composer::{ComposedSwap, TransactionComposer};
use super::draft::{DraftError, FinalizedTransaction, GasPlan, Operand, TransactionDraft};
use super::error::{EngineError, EngineResult};
use super::route::{Route, RouteDiscovery};
use super::types::{RunStage, Slippage, SwapDirection, TreasuryReference};

/// 试运行估算 gas 时使用的预算上限（50 SUI）。
pub const DRY_RUN_GAS_BUDGET: u64 = 50_000_000_000;

#[derive(Debug, Clone)]
pub enum Operation {
    Deposit {
        treasury: TreasuryReference,
        asset: CoinType,
        amount: u64,
    },
    Swap {
        from: CoinType,
        to: CoinType,
        amount: u64,
        direction: SwapDirection,
        /// 输出币接收地址，缺省为签名地址。
        recipient: Option<SuiAddress>,
    },
    TreasurySwap {
        source: TreasuryReference,
        target: TreasuryReference,
        from: CoinType,
        to: CoinType,
        amount: u64,
        direction: SwapDirection,
    },
}

impl Operation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::Swap { .. } => "swap",
            Self::TreasurySwap { .. } => "treasury_swap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Execute,
    DryRun,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub slippage: Slippage,
    /// 未设置时通过试运行估算。
    pub gas_budget: Option<u64>,
    pub mode: ExecutionMode,
    pub options: ExecuteOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Settled(ExecutionResult),
    Simulated(ExecutionResult),
    NoRoute { from: CoinType, to: CoinType },
}

pub struct Orchestrator<'a> {
    identity: &'a SigningIdentity,
    gateway: &'a dyn LedgerGateway,
    router: &'a dyn RouteDiscovery,
    settings: OrchestratorSettings,
    /// 已交给网关、尚未拿到结果的交易（操作名, digest）。
    in_flight: OnceCell<(&'static str, String)>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        identity: &'a SigningIdentity,
        gateway: &'a dyn LedgerGateway,
        router: &'a dyn RouteDiscovery,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            identity,
            gateway,
            router,
            settings,
            in_flight: OnceCell::new(),
        }
    }

    /// 运行被取消后调用。交易若已发出，结果只能记为未知。
    pub fn interrupted(&self) -> EngineError {
        let digest = self.in_flight.get().map(|(label, digest)| {
            events::transaction_outcome_unknown(label, digest, "运行被中断");
            digest.clone()
        });
        EngineError::Interrupted { digest }
    }

    pub async fn run(&self, operation: Operation) -> EngineResult<RunOutcome> {
        let label = operation.label();
        let mut stage = RunStage::Idle;
        advance(&mut stage, RunStage::IdentityResolved);
        events::run_started(
            label,
            &self.identity.address(),
            self.settings.mode == ExecutionMode::DryRun,
        );

        let composer = TransactionComposer::new(self.router, self.settings.gas_budget);
        let slippage = self.settings.slippage;
        let draft = match &operation {
            Operation::Deposit {
                treasury,
                asset,
                amount,
            } => composer.deposit(treasury, asset, *amount)?,
            Operation::Swap {
                from,
                to,
                amount,
                direction,
                recipient,
            } => {
                let Some(route) = self
                    .discover(&mut stage, from, to, *amount, *direction)
                    .await?
                else {
                    return Ok(RunOutcome::NoRoute {
                        from: from.clone(),
                        to: to.clone(),
                    });
                };
                let ComposedSwap { mut draft, output } = composer.swap(&route, slippage)?;
                let recipient =
                    draft.pure_address(recipient.unwrap_or_else(|| self.identity.address()))?;
                draft.transfer_objects(vec![Operand::Take(output)], recipient)?;
                draft
            }
            Operation::TreasurySwap {
                source,
                target,
                from,
                to,
                amount,
                direction,
            } => {
                let Some(route) = self
                    .discover(&mut stage, from, to, *amount, *direction)
                    .await?
                else {
                    return Ok(RunOutcome::NoRoute {
                        from: from.clone(),
                        to: to.clone(),
                    });
                };
                composer.treasury_swap(source, target, &route, slippage)?
            }
        };
        advance(&mut stage, RunStage::Composed);

        let prepared = self.prepare(draft).await?;

        if self.settings.mode == ExecutionMode::DryRun {
            let result = self.gateway.dry_run(&prepared.bytes).await?;
            let reason = failure_reason(&result.status);
            events::dry_run_completed(
                label,
                &prepared.digest,
                result.status.is_success(),
                reason,
            );
            return Ok(RunOutcome::Simulated(result));
        }

        let signature = self.identity.sign_transaction(&prepared.bytes);
        advance(&mut stage, RunStage::Submitted);
        let gas_budget = match &prepared.data {
            TransactionData::V1(data) => data.gas_data.budget,
        };
        events::transaction_submitted(label, &prepared.digest, gas_budget);
        // CLI 每个编排器只运行一次，重复 set 只保留首笔
        let _ = self.in_flight.set((label, prepared.digest.clone()));

        let result = match self
            .gateway
            .execute(&prepared.bytes, &[signature], self.settings.options)
            .await
        {
            Ok(result) => result,
            Err(err) => {
                events::transaction_outcome_unknown(label, &prepared.digest, &err.to_string());
                return Err(err.into());
            }
        };

        let success = result.status.is_success();
        advance(&mut stage, RunStage::Settled { success });
        events::transaction_settled(label, &result.digest, success, failure_reason(&result.status));

        match result.status {
            ExecutionStatus::Success => Ok(RunOutcome::Settled(result)),
            ExecutionStatus::Failure { reason } => Err(EngineError::OnChainFailure {
                digest: result.digest,
                reason,
            }),
        }
    }

    async fn discover(
        &self,
        stage: &mut RunStage,
        from: &CoinType,
        to: &CoinType,
        amount: u64,
        direction: SwapDirection,
    ) -> EngineResult<Option<Route>> {
        let route = self.router.find_route(from, to, amount, direction).await?;
        advance(
            stage,
            RunStage::RouteAttempted {
                found: route.is_some(),
            },
        );

        let (from_label, to_label) = (from.to_string(), to.to_string());
        match &route {
            Some(route) => events::route_found(
                &from_label,
                &to_label,
                route.amount_in(),
                route.amount_out(),
                route.leg_count(),
            ),
            None => events::route_not_found(&from_label, &to_label, amount),
        }
        Ok(route)
    }

    /// 解析对象引用、确定 gas 单价/预算、挑选 gas 币，然后最终化草稿。
    async fn prepare(&self, draft: TransactionDraft) -> EngineResult<FinalizedTransaction> {
        let sender = self.identity.address();
        let object_ids = draft.object_ids();
        let objects = if object_ids.is_empty() {
            HashMap::new()
        } else {
            self.gateway.resolve_objects(&object_ids).await?
        };
        let price = self.gateway.reference_gas_price().await?;

        let budget = match draft.gas_budget() {
            Some(budget) => budget,
            None => self.estimate_budget(&draft, sender, &objects, price).await?,
        };

        let coins = self.gateway.gas_coins(sender).await?;
        let exclude: HashSet<ObjectId> = object_ids.into_iter().collect();
        let required = budget.saturating_add(draft.gas_outflow());
        let payment = select_gas_coins(coins, required, &exclude)?;

        debug!(
            target: "engine::orchestrator",
            price,
            budget,
            required,
            payment = payment.len(),
            "gas 参数已确定"
        );

        let finalized = draft.finalize(
            sender,
            &objects,
            GasPlan {
                payment,
                price,
                budget,
            },
        )?;
        Ok(finalized)
    }

    async fn estimate_budget(
        &self,
        draft: &TransactionDraft,
        sender: SuiAddress,
        objects: &HashMap<ObjectId, ResolvedObject>,
        price: u64,
    ) -> EngineResult<u64> {
        let sample = draft.build_transaction_data(
            sender,
            objects,
            GasPlan {
                payment: Vec::new(),
                price,
                budget: DRY_RUN_GAS_BUDGET,
            },
        )?;
        let bytes = sample.to_bytes().map_err(DraftError::from)?;
        let result = self.gateway.dry_run(&bytes).await?;
        if let ExecutionStatus::Failure { reason } = &result.status {
            return Err(EngineError::GasEstimation(reason.clone()));
        }

        let budget = result.gas_used.estimate_budget(price);
        info!(
            target: "engine::orchestrator",
            computation_cost = result.gas_used.computation_cost,
            storage_cost = result.gas_used.storage_cost,
            storage_rebate = result.gas_used.storage_rebate,
            budget,
            "已通过试运行估算 gas 预算"
        );
        Ok(budget)
    }
}

fn advance(stage: &mut RunStage, next: RunStage) {
    info!(
        target: "engine::orchestrator",
        from = %stage,
        to = %next,
        "状态切换"
    );
    *stage = next;
}

fn failure_reason(status: &ExecutionStatus) -> Option<&str> {
    match status {
        ExecutionStatus::Success => None,
        ExecutionStatus::Failure { reason } => Some(reason.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::engine::draft::HandleRef;
    use crate::engine::route::tests::{CETUS, coin, router, single_hop_route, slippage};
    use crate::engine::route::{CetusRouter, RouteResult};
    use crate::engine::types::TreasuryContract;
    use crate::gateway::{GasCoin, GasUsed, GatewayError, GatewayResult};
    use crate::sui::transaction::transaction_digest;
    use crate::sui::{ObjectDigest, ObjectOwnership, ObjectRef};

    struct FakeGateway {
        execute_status: ExecutionStatus,
        dry_run_status: ExecutionStatus,
        resolves: AtomicUsize,
        dry_runs: AtomicUsize,
        executions: AtomicUsize,
        submitted: Mutex<Vec<Vec<u8>>>,
        /// execute 收到交易后永不返回。
        hang_on_execute: bool,
    }

    impl FakeGateway {
        fn new(execute_status: ExecutionStatus) -> Self {
            Self {
                execute_status,
                dry_run_status: ExecutionStatus::Success,
                resolves: AtomicUsize::new(0),
                dry_runs: AtomicUsize::new(0),
                executions: AtomicUsize::new(0),
                submitted: Mutex::new(Vec::new()),
                hang_on_execute: false,
            }
        }

        fn result(&self, status: ExecutionStatus) -> ExecutionResult {
            ExecutionResult {
                digest: "FakeDigest".to_string(),
                status,
                gas_used: GasUsed {
                    computation_cost: 1_000_000,
                    storage_cost: 2_000_000,
                    storage_rebate: 1_000_000,
                    non_refundable_storage_fee: 0,
                },
                events: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl LedgerGateway for FakeGateway {
        async fn latest_checkpoint(&self) -> GatewayResult<u64> {
            Ok(1)
        }

        async fn resolve_objects(
            &self,
            ids: &[ObjectId],
        ) -> GatewayResult<HashMap<ObjectId, ResolvedObject>> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            Ok(ids
                .iter()
                .map(|id| {
                    (
                        *id,
                        ResolvedObject {
                            object_ref: ObjectRef {
                                object_id: *id,
                                version: 1,
                                digest: ObjectDigest::new([0u8; 32]),
                            },
                            ownership: ObjectOwnership::Shared {
                                initial_shared_version: 1,
                            },
                        },
                    )
                })
                .collect())
        }

        async fn reference_gas_price(&self) -> GatewayResult<u64> {
            Ok(750)
        }

        async fn gas_coins(&self, _owner: SuiAddress) -> GatewayResult<Vec<GasCoin>> {
            Ok(vec![GasCoin {
                object_ref: ObjectRef {
                    object_id: ObjectId::from_low_byte(0xee),
                    version: 1,
                    digest: ObjectDigest::new([2u8; 32]),
                },
                balance: 1_000_000_000_000,
            }])
        }

        async fn dry_run(&self, _tx_bytes: &[u8]) -> GatewayResult<ExecutionResult> {
            self.dry_runs.fetch_add(1, Ordering::SeqCst);
            Ok(self.result(self.dry_run_status.clone()))
        }

        async fn execute(
            &self,
            tx_bytes: &[u8],
            signatures: &[String],
            _options: ExecuteOptions,
        ) -> GatewayResult<ExecutionResult> {
            assert_eq!(signatures.len(), 1);
            self.executions.fetch_add(1, Ordering::SeqCst);
            self.submitted.lock().unwrap().push(tx_bytes.to_vec());
            if self.hang_on_execute {
                std::future::pending::<()>().await;
            }
            Ok(self.result(self.execute_status.clone()))
        }
    }

    /// 返回预设路由，swap 步骤的展开交给真实的 Cetus 路由器。
    struct FakeRouter {
        route: Option<Route>,
        inner: CetusRouter,
        lookups: AtomicUsize,
    }

    impl FakeRouter {
        fn new(route: Option<Route>) -> Self {
            Self {
                route,
                inner: router("http://127.0.0.1:1"),
                lookups: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RouteDiscovery for FakeRouter {
        async fn find_route(
            &self,
            _from: &CoinType,
            _to: &CoinType,
            _amount: u64,
            _direction: SwapDirection,
        ) -> RouteResult<Option<Route>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.route.clone())
        }

        fn input_budget(&self, route: &Route, slippage: Slippage) -> u64 {
            self.inner.input_budget(route, slippage)
        }

        fn build_swap_step(
            &self,
            route: &Route,
            draft: &mut TransactionDraft,
            input: HandleRef,
            slippage: Slippage,
        ) -> RouteResult<HandleRef> {
            self.inner.build_swap_step(route, draft, input, slippage)
        }
    }

    fn identity() -> SigningIdentity {
        SigningIdentity::from_secret_bytes(&[7u8; 32])
    }

    fn settings(mode: ExecutionMode, gas_budget: Option<u64>) -> OrchestratorSettings {
        OrchestratorSettings {
            slippage: slippage("0.01"),
            gas_budget,
            mode,
            options: ExecuteOptions::default(),
        }
    }

    fn treasury(id: u8, config: Option<u8>) -> TreasuryReference {
        TreasuryReference {
            contract: TreasuryContract {
                package: ObjectId::from_low_byte(0x42),
                module: "treasury".to_string(),
            },
            treasury_id: ObjectId::from_low_byte(id),
            config_id: config.map(ObjectId::from_low_byte),
        }
    }

    fn treasury_swap() -> Operation {
        Operation::TreasurySwap {
            source: treasury(0x10, Some(0x11)),
            target: treasury(0x20, None),
            from: CoinType::sui(),
            to: coin(CETUS),
            amount: 1_000_000,
            direction: SwapDirection::AmountIn,
        }
    }

    #[tokio::test]
    async fn no_route_stops_before_composition_and_submission() {
        let identity = identity();
        let gateway = FakeGateway::new(ExecutionStatus::Success);
        let router = FakeRouter::new(None);
        let orchestrator = Orchestrator::new(
            &identity,
            &gateway,
            &router,
            settings(ExecutionMode::Execute, Some(10_000_000)),
        );

        let outcome = orchestrator.run(treasury_swap()).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::NoRoute {
                from: CoinType::sui(),
                to: coin(CETUS),
            }
        );
        assert_eq!(router.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.resolves.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deposit_skips_route_lookup() {
        let identity = identity();
        let gateway = FakeGateway::new(ExecutionStatus::Success);
        let router = FakeRouter::new(Some(single_hop_route()));
        let orchestrator = Orchestrator::new(
            &identity,
            &gateway,
            &router,
            settings(ExecutionMode::Execute, Some(10_000_000)),
        );

        let outcome = orchestrator
            .run(Operation::Deposit {
                treasury: treasury(0x10, None),
                asset: CoinType::sui(),
                amount: 10_000_000,
            })
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Settled(ref result) if result.digest == "FakeDigest"));
        assert_eq!(router.lookups.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.dry_runs.load(Ordering::SeqCst), 0);
        assert_eq!(gateway.executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn on_chain_failure_reason_is_surfaced_without_retry() {
        let identity = identity();
        let gateway = FakeGateway::new(ExecutionStatus::Failure {
            reason: "slippage exceeded".to_string(),
        });
        let router = FakeRouter::new(Some(single_hop_route()));
        let orchestrator = Orchestrator::new(
            &identity,
            &gateway,
            &router,
            settings(ExecutionMode::Execute, Some(10_000_000)),
        );

        let err = orchestrator.run(treasury_swap()).await.unwrap_err();
        match err {
            EngineError::OnChainFailure { digest, reason } => {
                assert_eq!(digest, "FakeDigest");
                assert_eq!(reason, "slippage exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(gateway.executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dry_run_mode_never_executes() {
        let identity = identity();
        let gateway = FakeGateway::new(ExecutionStatus::Success);
        let router = FakeRouter::new(Some(single_hop_route()));
        let orchestrator = Orchestrator::new(
            &identity,
            &gateway,
            &router,
            settings(ExecutionMode::DryRun, Some(10_000_000)),
        );

        let outcome = orchestrator.run(treasury_swap()).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Simulated(_)));
        assert_eq!(gateway.dry_runs.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_budget_is_estimated_by_dry_run() {
        let identity = identity();
        let gateway = FakeGateway::new(ExecutionStatus::Success);
        let router = FakeRouter::new(Some(single_hop_route()));
        let orchestrator = Orchestrator::new(
            &identity,
            &gateway,
            &router,
            settings(ExecutionMode::Execute, None),
        );

        let recipient = SuiAddress::from_low_byte(0x99);
        let outcome = orchestrator
            .run(Operation::Swap {
                from: CoinType::sui(),
                to: coin(CETUS),
                amount: 1_000_000,
                direction: SwapDirection::AmountIn,
                recipient: Some(recipient),
            })
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Settled(_)));
        assert_eq!(gateway.dry_runs.load(Ordering::SeqCst), 1);

        // 预算 = 1_000_000 + 750_000 + 2_000_000 - 1_000_000，位于 gas 数据中的 budget 字段
        let submitted = gateway.submitted.lock().unwrap();
        let expected = 2_750_000u64.to_le_bytes();
        assert!(
            submitted[0]
                .windows(expected.len())
                .any(|window| window == expected)
        );
    }

    #[tokio::test]
    async fn failed_estimation_aborts_before_submission() {
        let identity = identity();
        let mut gateway = FakeGateway::new(ExecutionStatus::Success);
        gateway.dry_run_status = ExecutionStatus::Failure {
            reason: "InsufficientCoinBalance".to_string(),
        };
        let router = FakeRouter::new(Some(single_hop_route()));
        let orchestrator = Orchestrator::new(
            &identity,
            &gateway,
            &router,
            settings(ExecutionMode::Execute, None),
        );

        let err = orchestrator.run(treasury_swap()).await.unwrap_err();
        assert!(matches!(err, EngineError::GasEstimation(reason) if reason == "InsufficientCoinBalance"));
        assert_eq!(gateway.executions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gateway_errors_propagate_unmodified() {
        struct DownGateway;

        #[async_trait]
        impl LedgerGateway for DownGateway {
            async fn latest_checkpoint(&self) -> GatewayResult<u64> {
                Err(GatewayError::Schema("down".to_string()))
            }
            async fn resolve_objects(
                &self,
                _ids: &[ObjectId],
            ) -> GatewayResult<HashMap<ObjectId, ResolvedObject>> {
                Err(GatewayError::Schema("down".to_string()))
            }
            async fn reference_gas_price(&self) -> GatewayResult<u64> {
                Err(GatewayError::Schema("down".to_string()))
            }
            async fn gas_coins(&self, _owner: SuiAddress) -> GatewayResult<Vec<GasCoin>> {
                Err(GatewayError::Schema("down".to_string()))
            }
            async fn dry_run(&self, _tx_bytes: &[u8]) -> GatewayResult<ExecutionResult> {
                Err(GatewayError::Schema("down".to_string()))
            }
            async fn execute(
                &self,
                _tx_bytes: &[u8],
                _signatures: &[String],
                _options: ExecuteOptions,
            ) -> GatewayResult<ExecutionResult> {
                Err(GatewayError::Schema("down".to_string()))
            }
        }

        let identity = identity();
        let router = FakeRouter::new(Some(single_hop_route()));
        let orchestrator = Orchestrator::new(
            &identity,
            &DownGateway,
            &router,
            settings(ExecutionMode::Execute, Some(10_000_000)),
        );
        let err = orchestrator.run(treasury_swap()).await.unwrap_err();
        assert!(matches!(err, EngineError::Gateway(GatewayError::Schema(msg)) if msg == "down"));
    }

    #[tokio::test]
    async fn interruption_after_submission_reports_pending_digest() {
        let identity = identity();
        let mut gateway = FakeGateway::new(ExecutionStatus::Success);
        gateway.hang_on_execute = true;
        let router = FakeRouter::new(Some(single_hop_route()));
        let orchestrator = Orchestrator::new(
            &identity,
            &gateway,
            &router,
            settings(ExecutionMode::Execute, Some(10_000_000)),
        );

        let cancelled = tokio::time::timeout(
            Duration::from_millis(200),
            orchestrator.run(treasury_swap()),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(gateway.executions.load(Ordering::SeqCst), 1);

        let expected = transaction_digest(&gateway.submitted.lock().unwrap()[0]);
        match orchestrator.interrupted() {
            EngineError::Interrupted { digest: Some(digest) } => assert_eq!(digest, expected),
            other => panic!("应报告已提交的交易，实际为 {other:?}"),
        }
    }

    #[tokio::test]
    async fn interruption_without_submission_has_no_digest() {
        let identity = identity();
        let gateway = FakeGateway::new(ExecutionStatus::Success);
        let router = FakeRouter::new(Some(single_hop_route()));
        let orchestrator = Orchestrator::new(
            &identity,
            &gateway,
            &router,
            settings(ExecutionMode::DryRun, Some(10_000_000)),
        );

        orchestrator.run(treasury_swap()).await.unwrap();
        let err = orchestrator.interrupted();
        assert!(matches!(err, EngineError::Interrupted { digest: None }));
        assert!(err.to_string().contains("未提交"));
    }
}
