//! 三种交易形态的组装：存入、普通兑换、金库中转兑换。

use thiserror::Error;
use tracing::debug;

use crate::sui::{CoinType, ObjectId};

use super::draft::{DraftError, HandleRef, Operand, TransactionDraft};
use super::route::{Route, RouteDiscovery, RouteError};
use super::types::{Slippage, TreasuryReference};

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("交易草稿错误: {0}")]
    Draft(#[from] DraftError),
    #[error("路由展开失败: {0}")]
    Route(#[from] RouteError),
    #[error("金库 {0} 未配置 config 对象，无法提取")]
    MissingTreasuryConfig(ObjectId),
    /// 输入币只能从 gas 币拆出，因此只支持 SUI。
    #[error("输入资产 {0} 不是 SUI，无法从 gas 币拆分")]
    UnsupportedInputAsset(CoinType),
}

pub type ComposeResult<T> = Result<T, ComposeError>;

/// 普通兑换的草稿及其输出币句柄，输出币的去向由调用方决定。
#[derive(Debug)]
pub struct ComposedSwap {
    pub draft: TransactionDraft,
    pub output: HandleRef,
}

pub struct TransactionComposer<'a> {
    router: &'a dyn RouteDiscovery,
    gas_budget: Option<u64>,
}

impl<'a> TransactionComposer<'a> {
    pub fn new(router: &'a dyn RouteDiscovery, gas_budget: Option<u64>) -> Self {
        Self { router, gas_budget }
    }

    fn draft(&self) -> TransactionDraft {
        TransactionDraft::new().with_gas_budget(self.gas_budget)
    }

    fn ensure_gas_asset(asset: &CoinType) -> ComposeResult<()> {
        if *asset != CoinType::sui() {
            return Err(ComposeError::UnsupportedInputAsset(asset.clone()));
        }
        Ok(())
    }

    pub fn deposit(
        &self,
        treasury: &TreasuryReference,
        asset: &CoinType,
        amount: u64,
    ) -> ComposeResult<TransactionDraft> {
        Self::ensure_gas_asset(asset)?;
        let mut draft = self.draft();
        let coins = draft.split_gas(&[amount])?;
        let treasury_obj = draft.object(treasury.treasury_id)?;
        draft.move_call(
            treasury.contract.deposit_target(),
            vec![asset.type_tag()],
            vec![treasury_obj, Operand::Take(coins[0])],
            0,
        )?;

        debug!(
            target: "engine::composer",
            treasury = %treasury.treasury_id,
            asset = %asset,
            amount,
            steps = draft.steps().len(),
            "存入交易已组装"
        );
        Ok(draft)
    }

    pub fn swap(&self, route: &Route, slippage: Slippage) -> ComposeResult<ComposedSwap> {
        Self::ensure_gas_asset(route.from_coin())?;
        let mut draft = self.draft();
        let budget = self.router.input_budget(route, slippage);
        let coins = draft.split_gas(&[budget])?;
        let output = self
            .router
            .build_swap_step(route, &mut draft, coins[0], slippage)?;

        debug!(
            target: "engine::composer",
            from = %route.from_coin(),
            to = %route.to_coin(),
            input_budget = budget,
            steps = draft.steps().len(),
            "兑换交易已组装"
        );
        Ok(ComposedSwap { draft, output })
    }

    /// withdraw → swap → deposit，全部在同一笔交易内完成。
    pub fn treasury_swap(
        &self,
        source: &TreasuryReference,
        target: &TreasuryReference,
        route: &Route,
        slippage: Slippage,
    ) -> ComposeResult<TransactionDraft> {
        let config_id = source
            .config_id
            .ok_or(ComposeError::MissingTreasuryConfig(source.treasury_id))?;

        let mut draft = self.draft();
        let amount = self.router.input_budget(route, slippage);
        let config = draft.object_readonly(config_id)?;
        let source_obj = draft.object(source.treasury_id)?;
        let amount_arg = draft.pure_u64(amount)?;
        let withdrawn = draft.move_call(
            source.contract.withdraw_target(),
            vec![route.from_coin().type_tag()],
            vec![config, source_obj, amount_arg],
            1,
        )?;

        let swapped = self
            .router
            .build_swap_step(route, &mut draft, withdrawn[0], slippage)?;

        let target_obj = draft.object(target.treasury_id)?;
        draft.move_call(
            target.contract.deposit_target(),
            vec![route.to_coin().type_tag()],
            vec![target_obj, Operand::Take(swapped)],
            0,
        )?;

        debug!(
            target: "engine::composer",
            source = %source.treasury_id,
            target = %target.treasury_id,
            from = %route.from_coin(),
            to = %route.to_coin(),
            amount,
            steps = draft.steps().len(),
            "金库中转兑换交易已组装"
        );
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::draft::{DraftInput, Step};
    use crate::engine::route::tests::{
        CETUS, coin, reverse_single_hop_route, router, single_hop_route, slippage,
    };
    use crate::engine::types::TreasuryContract;
    use crate::sui::SuiAddress;

    fn treasury(id: u8, config: Option<u8>) -> TreasuryReference {
        TreasuryReference {
            contract: TreasuryContract {
                package: SuiAddress::from_low_byte(0x42),
                module: "treasury".to_string(),
            },
            treasury_id: SuiAddress::from_low_byte(id),
            config_id: config.map(SuiAddress::from_low_byte),
        }
    }

    fn function_of(step: &Step) -> Option<&str> {
        match step {
            Step::MoveCall { target, .. } => Some(target.function.as_str()),
            _ => None,
        }
    }

    #[test]
    fn deposit_has_exactly_two_steps() {
        let router = router("http://127.0.0.1:1");
        let composer = TransactionComposer::new(&router, Some(10_000_000));
        let draft = composer
            .deposit(&treasury(0x10, None), &CoinType::sui(), 10_000_000)
            .unwrap();

        assert_eq!(draft.steps().len(), 2);
        assert!(matches!(draft.steps()[0], Step::SplitCoins { source: Operand::Gas, .. }));
        assert_eq!(function_of(&draft.steps()[1]), Some("deposit"));
        assert_eq!(draft.gas_budget(), Some(10_000_000));
        draft.validate().unwrap();
    }

    #[test]
    fn treasury_swap_orders_withdraw_swap_deposit() {
        let router = router("http://127.0.0.1:1");
        let composer = TransactionComposer::new(&router, None);
        let draft = composer
            .treasury_swap(
                &treasury(0x10, Some(0x11)),
                &treasury(0x20, None),
                &single_hop_route(),
                slippage("0.01"),
            )
            .unwrap();

        let functions: Vec<_> = draft.steps().iter().filter_map(function_of).collect();
        assert_eq!(
            functions,
            vec!["withdraw", "swap_a2b", "check_coin_threshold", "deposit"]
        );

        // deposit 消费的是 swap 的输出，而不是 withdraw 的原始输出
        let Step::MoveCall { arguments, .. } = draft.steps().last().unwrap() else {
            unreachable!();
        };
        assert_eq!(arguments[1], Operand::Take(HandleRef { step: 1, slot: 0 }));
        assert_ne!(arguments[1], Operand::Take(HandleRef { step: 0, slot: 0 }));

        // withdraw 数量等于路由输入
        let Step::MoveCall { arguments, .. } = &draft.steps()[0] else {
            unreachable!();
        };
        let Operand::Input(index) = arguments[2] else {
            unreachable!();
        };
        assert_eq!(
            draft.inputs()[usize::from(index)],
            DraftInput::Pure(1_000_000u64.to_le_bytes().to_vec())
        );

        // 预期 950 000，滑点 1% → 最少 940 500
        let Step::MoveCall { arguments, .. } = &draft.steps()[2] else {
            unreachable!();
        };
        let Operand::Input(index) = arguments[1] else {
            unreachable!();
        };
        assert_eq!(
            draft.inputs()[usize::from(index)],
            DraftInput::Pure(940_500u64.to_le_bytes().to_vec())
        );

        // config 对象只读，金库对象可变
        assert!(draft.inputs().contains(&DraftInput::Object {
            id: SuiAddress::from_low_byte(0x11),
            mutable: false,
        }));
        assert!(draft.inputs().contains(&DraftInput::Object {
            id: SuiAddress::from_low_byte(0x20),
            mutable: true,
        }));
        draft.validate().unwrap();
    }

    #[test]
    fn treasury_swap_type_arguments_follow_route() {
        let router = router("http://127.0.0.1:1");
        let composer = TransactionComposer::new(&router, None);
        let draft = composer
            .treasury_swap(
                &treasury(0x10, Some(0x11)),
                &treasury(0x20, None),
                &single_hop_route(),
                slippage("0.01"),
            )
            .unwrap();

        let Step::MoveCall { type_arguments, .. } = &draft.steps()[0] else {
            unreachable!();
        };
        assert_eq!(type_arguments, &vec![CoinType::sui().type_tag()]);
        let Step::MoveCall { type_arguments, .. } = draft.steps().last().unwrap() else {
            unreachable!();
        };
        assert_eq!(type_arguments, &vec![coin(CETUS).type_tag()]);
    }

    #[test]
    fn missing_config_object_is_rejected() {
        let router = router("http://127.0.0.1:1");
        let composer = TransactionComposer::new(&router, None);
        let err = composer
            .treasury_swap(
                &treasury(0x10, None),
                &treasury(0x20, None),
                &single_hop_route(),
                slippage("0.01"),
            )
            .unwrap_err();
        assert!(matches!(err, ComposeError::MissingTreasuryConfig(id) if id == SuiAddress::from_low_byte(0x10)));
    }

    #[test]
    fn plain_swap_returns_unconsumed_output() {
        let router = router("http://127.0.0.1:1");
        let composer = TransactionComposer::new(&router, None);
        let ComposedSwap { mut draft, output } =
            composer.swap(&single_hop_route(), slippage("0.01")).unwrap();

        assert_eq!(draft.gas_outflow(), 1_000_000);
        assert!(matches!(
            draft.validate().unwrap_err(),
            DraftError::UnconsumedHandle(handle) if handle == output
        ));

        let recipient = draft.pure_address(SuiAddress::from_low_byte(1)).unwrap();
        draft
            .transfer_objects(vec![Operand::Take(output)], recipient)
            .unwrap();
        draft.validate().unwrap();
    }

    #[test]
    fn deposit_rejects_non_sui_asset() {
        let router = router("http://127.0.0.1:1");
        let composer = TransactionComposer::new(&router, Some(10_000_000));
        let err = composer
            .deposit(&treasury(0x10, None), &coin(CETUS), 10_000_000)
            .unwrap_err();
        assert!(matches!(err, ComposeError::UnsupportedInputAsset(asset) if asset == coin(CETUS)));
    }

    #[test]
    fn swap_rejects_non_sui_input() {
        let router = router("http://127.0.0.1:1");
        let composer = TransactionComposer::new(&router, None);
        let err = composer
            .swap(&reverse_single_hop_route(), slippage("0.01"))
            .unwrap_err();
        assert!(matches!(err, ComposeError::UnsupportedInputAsset(asset) if asset == coin(CETUS)));
    }

    #[test]
    fn treasury_swap_accepts_non_sui_source() {
        let router = router("http://127.0.0.1:1");
        let composer = TransactionComposer::new(&router, None);
        let draft = composer
            .treasury_swap(
                &treasury(0x10, Some(0x11)),
                &treasury(0x20, None),
                &reverse_single_hop_route(),
                slippage("0.01"),
            )
            .unwrap();
        assert!(
            !draft
                .steps()
                .iter()
                .any(|step| matches!(step, Step::SplitCoins { source: Operand::Gas, .. }))
        );
        draft.validate().unwrap();
    }
}
