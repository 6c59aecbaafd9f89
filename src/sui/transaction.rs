//! 可编程交易（PTB）的 BCS 线格式。
//!
//! 枚举变体的声明顺序即链上约定的序号，新增变体只能追加在末尾。

use serde::Serialize;

use super::blake2b256;
use super::types::{ObjectId, ObjectRef, SuiAddress, TypeTag};

/// 签名时附加在交易字节前的 intent：`TransactionData`、V0、Sui 应用。
pub const TRANSACTION_INTENT: [u8; 3] = [0, 0, 0];
const TRANSACTION_DIGEST_SALT: &[u8] = b"TransactionData::";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionData {
    V1(TransactionDataV1),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionDataV1 {
    pub kind: TransactionKind,
    pub sender: SuiAddress,
    pub gas_data: GasData,
    pub expiration: TransactionExpiration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TransactionKind {
    ProgrammableTransaction(ProgrammableTransaction),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgrammableTransaction {
    pub inputs: Vec<CallArg>,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CallArg {
    Pure(Vec<u8>),
    Object(ObjectArg),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ObjectArg {
    ImmOrOwnedObject(ObjectRef),
    SharedObject {
        id: ObjectId,
        initial_shared_version: u64,
        mutable: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Command {
    MoveCall(Box<ProgrammableMoveCall>),
    TransferObjects(Vec<Argument>, Argument),
    SplitCoins(Argument, Vec<Argument>),
    MergeCoins(Argument, Vec<Argument>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgrammableMoveCall {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_arguments: Vec<TypeTag>,
    pub arguments: Vec<Argument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Argument {
    GasCoin,
    Input(u16),
    Result(u16),
    NestedResult(u16, u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GasData {
    pub payment: Vec<ObjectRef>,
    pub owner: SuiAddress,
    pub price: u64,
    pub budget: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionExpiration {
    None,
    Epoch(u64),
}

impl TransactionData {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bcs::Error> {
        bcs::to_bytes(self)
    }
}

/// 签名消息摘要：blake2b-256(intent ‖ tx_bytes)。
pub fn signing_digest(tx_bytes: &[u8]) -> [u8; 32] {
    blake2b256(&[&TRANSACTION_INTENT, tx_bytes])
}

/// 交易摘要（base58），与链上返回的 digest 一致。
pub fn transaction_digest(tx_bytes: &[u8]) -> String {
    bs58::encode(blake2b256(&[TRANSACTION_DIGEST_SALT, tx_bytes])).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sui::types::ObjectDigest;

    #[test]
    fn argument_encoding_uses_variant_index() {
        assert_eq!(bcs::to_bytes(&Argument::GasCoin).unwrap(), vec![0]);
        assert_eq!(bcs::to_bytes(&Argument::Input(2)).unwrap(), vec![1, 2, 0]);
        assert_eq!(
            bcs::to_bytes(&Argument::NestedResult(1, 0)).unwrap(),
            vec![3, 1, 0, 0, 0]
        );
    }

    #[test]
    fn pure_call_arg_is_length_prefixed() {
        let arg = CallArg::Pure(100u64.to_le_bytes().to_vec());
        let bytes = bcs::to_bytes(&arg).unwrap();
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[1], 8);
        assert_eq!(&bytes[2..], &100u64.to_le_bytes());
    }

    #[test]
    fn object_ref_digest_carries_length_prefix() {
        let object_ref = ObjectRef {
            object_id: SuiAddress::from_low_byte(6),
            version: 1,
            digest: ObjectDigest::new([9u8; 32]),
        };
        let bytes = bcs::to_bytes(&object_ref).unwrap();
        // 32 id + 8 version + 1 length + 32 digest
        assert_eq!(bytes.len(), 73);
        assert_eq!(bytes[40], 32);
    }

    #[test]
    fn transaction_data_starts_with_version_and_kind_tags() {
        let data = TransactionData::V1(TransactionDataV1 {
            kind: TransactionKind::ProgrammableTransaction(ProgrammableTransaction {
                inputs: Vec::new(),
                commands: Vec::new(),
            }),
            sender: SuiAddress::from_low_byte(1),
            gas_data: GasData {
                payment: Vec::new(),
                owner: SuiAddress::from_low_byte(1),
                price: 1_000,
                budget: 10_000_000,
            },
            expiration: TransactionExpiration::None,
        });
        let bytes = data.to_bytes().unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 0]);
        assert_eq!(bytes.len(), 1 + 1 + 2 + 32 + 1 + 32 + 8 + 8 + 1);
        assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn digests_are_deterministic_and_distinct() {
        let bytes = [1u8, 2, 3];
        assert_eq!(signing_digest(&bytes), signing_digest(&bytes));
        assert_ne!(
            bs58::encode(signing_digest(&bytes)).into_string(),
            transaction_digest(&bytes)
        );
    }
}
