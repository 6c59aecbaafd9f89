use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::sui::ObjectId;

use super::draft::MoveTarget;
use super::error::{EngineError, EngineResult};

pub const DEPOSIT_FUNCTION: &str = "deposit";
pub const WITHDRAW_FUNCTION: &str = "withdraw";

/// 可接受的不利价格变动比例，取值 (0, 1)。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slippage(Decimal);

impl Slippage {
    pub fn new(tolerance: Decimal) -> EngineResult<Self> {
        if tolerance <= Decimal::ZERO || tolerance >= Decimal::ONE {
            return Err(EngineError::InvalidSlippage(tolerance));
        }
        Ok(Self(tolerance))
    }

    pub fn tolerance(&self) -> Decimal {
        self.0
    }

    /// `floor(expected × (1 − t))`
    pub fn min_output(&self, expected_out: u64) -> u64 {
        let bound = (Decimal::from(expected_out) * (Decimal::ONE - self.0)).floor();
        bound.to_u64().unwrap_or(0)
    }

    /// `ceil(expected × (1 + t))`，超过 u64 时截断为 `u64::MAX`。
    pub fn max_input(&self, expected_in: u64) -> u64 {
        Decimal::from(expected_in)
            .checked_mul(Decimal::ONE + self.0)
            .map(|value| value.ceil())
            .and_then(|value| value.to_u64())
            .unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Slippage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    /// 固定输入，输出随价格浮动。
    AmountIn,
    /// 固定输出，输入随价格浮动。
    AmountOut,
}

impl SwapDirection {
    pub fn by_amount_in(self) -> bool {
        matches!(self, Self::AmountIn)
    }
}

/// 已部署的金库合约（package + module）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreasuryContract {
    pub package: ObjectId,
    pub module: String,
}

impl TreasuryContract {
    pub fn deposit_target(&self) -> MoveTarget {
        MoveTarget::new(self.package, &self.module, DEPOSIT_FUNCTION)
    }

    pub fn withdraw_target(&self) -> MoveTarget {
        MoveTarget::new(self.package, &self.module, WITHDRAW_FUNCTION)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreasuryReference {
    pub contract: TreasuryContract,
    pub treasury_id: ObjectId,
    pub config_id: Option<ObjectId>,
}

/// 单次运行的状态机阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    IdentityResolved,
    RouteAttempted { found: bool },
    Composed,
    Submitted,
    Settled { success: bool },
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::IdentityResolved => f.write_str("identity_resolved"),
            Self::RouteAttempted { found: true } => f.write_str("route_attempted(found)"),
            Self::RouteAttempted { found: false } => f.write_str("route_attempted(not_found)"),
            Self::Composed => f.write_str("composed"),
            Self::Submitted => f.write_str("submitted"),
            Self::Settled { success: true } => f.write_str("settled(success)"),
            Self::Settled { success: false } => f.write_str("settled(failure)"),
        }
    }
}
