//! Sui 链上基础类型：地址、对象引用、Move 类型标签与交易线格式（BCS）。

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

pub mod transaction;
pub mod types;

pub use transaction::{
    Argument, CallArg, Command, GasData, ObjectArg, ProgrammableMoveCall,
    ProgrammableTransaction, TransactionData, TransactionDataV1, TransactionExpiration,
    TransactionKind,
};
pub use types::{
    CoinType, ObjectDigest, ObjectId, ObjectOwnership, ObjectRef, ResolvedObject,
    SuiAddress, SuiTypeError, TypeTag,
};

type Blake2b256 = Blake2b<U32>;

/// 依次拼接 `parts` 后计算 blake2b-256。
pub fn blake2b256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}
