//! 可编程交易草稿：只追加的步骤列表 + 基于下标的句柄。
//!
//! 每次追加步骤时立即校验句柄的生产/消费关系，校验失败不会修改草稿。

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::sui::transaction::transaction_digest;
use crate::sui::{
    Argument, CallArg, Command, GasData, ObjectArg, ObjectId, ObjectOwnership, ObjectRef,
    ProgrammableMoveCall, ProgrammableTransaction, ResolvedObject, SuiAddress, TransactionData,
    TransactionDataV1, TransactionExpiration, TransactionKind, TypeTag,
};

pub const MAX_STEPS: usize = 1024;
pub const MAX_INPUTS: usize = 2048;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("步骤 #{step} 引用了尚未产生的句柄 {handle}")]
    DanglingHandle { handle: HandleRef, step: u16 },
    #[error("句柄 {handle} 已在步骤 #{consumed_at} 被消费，步骤 #{step} 不能再次使用")]
    HandleReused {
        handle: HandleRef,
        consumed_at: u16,
        step: u16,
    },
    #[error("步骤 #{step} 引用了不存在的输入 {index}")]
    UnknownInput { index: u16, step: u16 },
    #[error("句柄 {0} 产生后从未被消费")]
    UnconsumedHandle(HandleRef),
    #[error("交易步骤数超过上限 {MAX_STEPS}")]
    TooManySteps,
    #[error("交易输入数超过上限 {MAX_INPUTS}")]
    TooManyInputs,
    #[error("对象 {0} 未解析到链上引用")]
    UnresolvedObject(ObjectId),
    #[error("交易草稿为空")]
    Empty,
    #[error("BCS 编码失败: {0}")]
    Encode(#[from] bcs::Error),
}

pub type DraftResult<T> = Result<T, DraftError>;

/// 第 `step` 个步骤的第 `slot` 个输出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleRef {
    pub step: u16,
    pub slot: u16,
}

impl fmt::Display for HandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.step, self.slot)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Gas,
    Input(u16),
    /// 按值使用，句柄随之失效。
    Take(HandleRef),
    /// 按引用使用（`&Coin` / `&mut Coin`），句柄仍可被后续步骤消费。
    Borrow(HandleRef),
}

impl Operand {
    fn handle(&self) -> Option<HandleRef> {
        match self {
            Self::Take(handle) | Self::Borrow(handle) => Some(*handle),
            Self::Gas | Self::Input(_) => None,
        }
    }

    fn to_argument(self) -> Argument {
        match self {
            Self::Gas => Argument::GasCoin,
            Self::Input(index) => Argument::Input(index),
            Self::Take(handle) | Self::Borrow(handle) => {
                Argument::NestedResult(handle.step, handle.slot)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftInput {
    Pure(Vec<u8>),
    Object { id: ObjectId, mutable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTarget {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
}

impl MoveTarget {
    pub fn new(package: ObjectId, module: &str, function: &str) -> Self {
        Self {
            package,
            module: module.to_string(),
            function: function.to_string(),
        }
    }
}

impl fmt::Display for MoveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.package, self.module, self.function)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    SplitCoins {
        source: Operand,
        amounts: Vec<Operand>,
    },
    MergeCoins {
        target: Operand,
        sources: Vec<Operand>,
    },
    MoveCall {
        target: MoveTarget,
        type_arguments: Vec<TypeTag>,
        arguments: Vec<Operand>,
        results: u16,
    },
    TransferObjects {
        objects: Vec<Operand>,
        recipient: Operand,
    },
}

impl Step {
    pub fn result_count(&self) -> u16 {
        match self {
            Self::SplitCoins { amounts, .. } => amounts.len() as u16,
            Self::MoveCall { results, .. } => *results,
            Self::MergeCoins { .. } | Self::TransferObjects { .. } => 0,
        }
    }

    fn operands(&self) -> Vec<Operand> {
        match self {
            Self::SplitCoins { source, amounts } => {
                std::iter::once(*source).chain(amounts.iter().copied()).collect()
            }
            Self::MergeCoins { target, sources } => {
                std::iter::once(*target).chain(sources.iter().copied()).collect()
            }
            Self::MoveCall { arguments, .. } => arguments.clone(),
            Self::TransferObjects { objects, recipient } => objects
                .iter()
                .copied()
                .chain(std::iter::once(*recipient))
                .collect(),
        }
    }

    fn lower(&self) -> Command {
        let args = |operands: &[Operand]| {
            operands
                .iter()
                .map(|operand| operand.to_argument())
                .collect::<Vec<_>>()
        };
        match self {
            Self::SplitCoins { source, amounts } => {
                Command::SplitCoins(source.to_argument(), args(amounts))
            }
            Self::MergeCoins { target, sources } => {
                Command::MergeCoins(target.to_argument(), args(sources))
            }
            Self::MoveCall {
                target,
                type_arguments,
                arguments,
                ..
            } => Command::MoveCall(Box::new(ProgrammableMoveCall {
                package: target.package,
                module: target.module.clone(),
                function: target.function.clone(),
                type_arguments: type_arguments.clone(),
                arguments: args(arguments),
            })),
            Self::TransferObjects { objects, recipient } => {
                Command::TransferObjects(args(objects), recipient.to_argument())
            }
        }
    }
}

/// 最终化时使用的 gas 参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPlan {
    pub payment: Vec<ObjectRef>,
    pub price: u64,
    pub budget: u64,
}

#[derive(Debug, Clone)]
pub struct FinalizedTransaction {
    pub data: TransactionData,
    pub bytes: Vec<u8>,
    pub digest: String,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionDraft {
    inputs: Vec<DraftInput>,
    steps: Vec<Step>,
    consumed: HashMap<HandleRef, u16>,
    gas_budget: Option<u64>,
    gas_outflow: u64,
}

impl TransactionDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pure<T: Serialize>(&mut self, value: &T) -> DraftResult<Operand> {
        let bytes = bcs::to_bytes(value)?;
        self.push_input(DraftInput::Pure(bytes))
    }

    pub fn pure_u64(&mut self, value: u64) -> DraftResult<Operand> {
        self.pure(&value)
    }

    pub fn pure_address(&mut self, address: SuiAddress) -> DraftResult<Operand> {
        self.pure(&address)
    }

    /// 以可变方式引用对象；同一对象重复引用时复用同一个输入。
    pub fn object(&mut self, id: ObjectId) -> DraftResult<Operand> {
        self.object_input(id, true)
    }

    pub fn object_readonly(&mut self, id: ObjectId) -> DraftResult<Operand> {
        self.object_input(id, false)
    }

    fn object_input(&mut self, id: ObjectId, mutable: bool) -> DraftResult<Operand> {
        let existing = self.inputs.iter_mut().enumerate().find_map(|(index, input)| {
            match input {
                DraftInput::Object {
                    id: existing,
                    mutable: flag,
                } if *existing == id => Some((index, flag)),
                _ => None,
            }
        });
        if let Some((index, flag)) = existing {
            *flag |= mutable;
            return Ok(Operand::Input(index as u16));
        }
        self.push_input(DraftInput::Object { id, mutable })
    }

    fn push_input(&mut self, input: DraftInput) -> DraftResult<Operand> {
        if self.inputs.len() >= MAX_INPUTS {
            return Err(DraftError::TooManyInputs);
        }
        self.inputs.push(input);
        Ok(Operand::Input((self.inputs.len() - 1) as u16))
    }

    /// 从 gas 币拆分出若干新币，拆出的总额计入 gas 外流，用于挑选 gas 币。
    pub fn split_gas(&mut self, amounts: &[u64]) -> DraftResult<Vec<HandleRef>> {
        let operands = amounts
            .iter()
            .map(|amount| self.pure_u64(*amount))
            .collect::<DraftResult<Vec<_>>>()?;
        let handles = self.split_coins(Operand::Gas, operands)?;
        let total = amounts
            .iter()
            .fold(0u64, |acc, amount| acc.saturating_add(*amount));
        self.gas_outflow = self.gas_outflow.saturating_add(total);
        Ok(handles)
    }

    pub fn split_coins(
        &mut self,
        source: Operand,
        amounts: Vec<Operand>,
    ) -> DraftResult<Vec<HandleRef>> {
        self.append(Step::SplitCoins { source, amounts })
    }

    pub fn merge_coins(&mut self, target: Operand, sources: Vec<Operand>) -> DraftResult<()> {
        self.append(Step::MergeCoins { target, sources })
            .map(|_| ())
    }

    pub fn move_call(
        &mut self,
        target: MoveTarget,
        type_arguments: Vec<TypeTag>,
        arguments: Vec<Operand>,
        results: u16,
    ) -> DraftResult<Vec<HandleRef>> {
        self.append(Step::MoveCall {
            target,
            type_arguments,
            arguments,
            results,
        })
    }

    pub fn transfer_objects(
        &mut self,
        objects: Vec<Operand>,
        recipient: Operand,
    ) -> DraftResult<()> {
        self.append(Step::TransferObjects { objects, recipient })
            .map(|_| ())
    }

    pub fn with_gas_budget(mut self, budget: Option<u64>) -> Self {
        self.gas_budget = budget;
        self
    }

    pub fn gas_budget(&self) -> Option<u64> {
        self.gas_budget
    }

    /// 从 gas 币拆出、随交易转走的总额。
    pub fn gas_outflow(&self) -> u64 {
        self.gas_outflow
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn inputs(&self) -> &[DraftInput] {
        &self.inputs
    }

    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.inputs
            .iter()
            .filter_map(|input| match input {
                DraftInput::Object { id, .. } => Some(*id),
                DraftInput::Pure(_) => None,
            })
            .collect()
    }

    fn append(&mut self, step: Step) -> DraftResult<Vec<HandleRef>> {
        if self.steps.len() >= MAX_STEPS {
            return Err(DraftError::TooManySteps);
        }
        let index = self.steps.len() as u16;
        let taken = self.check_operands(index, &step.operands())?;

        for handle in taken {
            self.consumed.insert(handle, index);
        }
        let handles = (0..step.result_count())
            .map(|slot| HandleRef { step: index, slot })
            .collect();
        self.steps.push(step);
        Ok(handles)
    }

    /// 校验一个待追加步骤的全部操作数，返回其中被消费的句柄。
    fn check_operands(&self, index: u16, operands: &[Operand]) -> DraftResult<Vec<HandleRef>> {
        let mut taken: HashSet<HandleRef> = HashSet::new();
        let mut borrowed: HashSet<HandleRef> = HashSet::new();

        for operand in operands {
            if let Operand::Input(input) = operand {
                if usize::from(*input) >= self.inputs.len() {
                    return Err(DraftError::UnknownInput {
                        index: *input,
                        step: index,
                    });
                }
                continue;
            }
            let Some(handle) = operand.handle() else {
                continue;
            };

            let produced = self
                .steps
                .get(usize::from(handle.step))
                .map(Step::result_count)
                .unwrap_or(0);
            if handle.step >= index || handle.slot >= produced {
                return Err(DraftError::DanglingHandle {
                    handle,
                    step: index,
                });
            }

            if let Some(consumed_at) = self.consumed.get(&handle) {
                return Err(DraftError::HandleReused {
                    handle,
                    consumed_at: *consumed_at,
                    step: index,
                });
            }

            let conflict = match operand {
                Operand::Take(_) => taken.contains(&handle) || borrowed.contains(&handle),
                _ => taken.contains(&handle),
            };
            if conflict {
                return Err(DraftError::HandleReused {
                    handle,
                    consumed_at: index,
                    step: index,
                });
            }

            match operand {
                Operand::Take(_) => taken.insert(handle),
                _ => borrowed.insert(handle),
            };
        }

        Ok(taken.into_iter().collect())
    }

    /// 校验所有产生的句柄都被消费。
    pub fn validate(&self) -> DraftResult<()> {
        if self.steps.is_empty() {
            return Err(DraftError::Empty);
        }
        for (index, step) in self.steps.iter().enumerate() {
            for slot in 0..step.result_count() {
                let handle = HandleRef {
                    step: index as u16,
                    slot,
                };
                if !self.consumed.contains_key(&handle) {
                    return Err(DraftError::UnconsumedHandle(handle));
                }
            }
        }
        Ok(())
    }

    pub fn to_programmable(
        &self,
        objects: &HashMap<ObjectId, ResolvedObject>,
    ) -> DraftResult<ProgrammableTransaction> {
        let inputs = self
            .inputs
            .iter()
            .map(|input| match input {
                DraftInput::Pure(bytes) => Ok(CallArg::Pure(bytes.clone())),
                DraftInput::Object { id, mutable } => {
                    let resolved = objects
                        .get(id)
                        .ok_or(DraftError::UnresolvedObject(*id))?;
                    let arg = match resolved.ownership {
                        ObjectOwnership::Shared {
                            initial_shared_version,
                        } => ObjectArg::SharedObject {
                            id: *id,
                            initial_shared_version,
                            mutable: *mutable,
                        },
                        ObjectOwnership::Owned | ObjectOwnership::Immutable => {
                            ObjectArg::ImmOrOwnedObject(resolved.object_ref.clone())
                        }
                    };
                    Ok(CallArg::Object(arg))
                }
            })
            .collect::<DraftResult<Vec<_>>>()?;

        Ok(ProgrammableTransaction {
            inputs,
            commands: self.steps.iter().map(Step::lower).collect(),
        })
    }

    pub fn build_transaction_data(
        &self,
        sender: SuiAddress,
        objects: &HashMap<ObjectId, ResolvedObject>,
        gas: GasPlan,
    ) -> DraftResult<TransactionData> {
        self.validate()?;
        let programmable = self.to_programmable(objects)?;
        Ok(TransactionData::V1(TransactionDataV1 {
            kind: TransactionKind::ProgrammableTransaction(programmable),
            sender,
            gas_data: GasData {
                payment: gas.payment,
                owner: sender,
                price: gas.price,
                budget: gas.budget,
            },
            expiration: TransactionExpiration::None,
        }))
    }

    /// 最终化草稿：消耗自身，产出可签名的交易字节。
    pub fn finalize(
        self,
        sender: SuiAddress,
        objects: &HashMap<ObjectId, ResolvedObject>,
        gas: GasPlan,
    ) -> DraftResult<FinalizedTransaction> {
        let data = self.build_transaction_data(sender, objects, gas)?;
        let bytes = data.to_bytes()?;
        let digest = transaction_digest(&bytes);
        debug!(
            target: "engine::draft",
            inputs = self.inputs.len(),
            steps = self.steps.len(),
            bytes = bytes.len(),
            digest = %digest,
            "交易草稿已最终化"
        );
        Ok(FinalizedTransaction {
            data,
            bytes,
            digest,
        })
    }
}
