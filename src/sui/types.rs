use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

pub const ADDRESS_LENGTH: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SuiTypeError {
    #[error("地址非法 {value}: {reason}")]
    InvalidAddress { value: String, reason: String },
    #[error("对象摘要非法 {value}: {reason}")]
    InvalidDigest { value: String, reason: String },
    #[error("类型标签非法 {value}: {reason}")]
    InvalidTypeTag { value: String, reason: String },
}

/// 32 字节账户地址；对象 ID 与包地址共用同一表示。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SuiAddress([u8; ADDRESS_LENGTH]);

pub type ObjectId = SuiAddress;

impl SuiAddress {
    pub const ZERO: Self = Self([0u8; ADDRESS_LENGTH]);

    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// 形如 `0x6` 的系统对象地址。
    pub const fn from_low_byte(value: u8) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 1] = value;
        Self(bytes)
    }
}

impl FromStr for SuiAddress {
    type Err = SuiTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SuiTypeError::InvalidAddress {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = value.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| invalid("缺少 0x 前缀"))?;
        if hex_part.is_empty() {
            return Err(invalid("地址为空"));
        }
        if hex_part.len() > ADDRESS_LENGTH * 2 {
            return Err(invalid("长度超过 32 字节"));
        }

        let padded = format!("{hex_part:0>width$}", width = ADDRESS_LENGTH * 2);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(&padded, &mut bytes).map_err(|err| invalid(&err.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for SuiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for SuiAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// 对象摘要，BCS 中按带长度前缀的字节串编码。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ObjectDigest([u8; 32]);

impl ObjectDigest {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for ObjectDigest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.0)
    }
}

impl FromStr for ObjectDigest {
    type Err = SuiTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(value.trim())
            .into_vec()
            .map_err(|err| SuiTypeError::InvalidDigest {
                value: value.to_string(),
                reason: err.to_string(),
            })?;
        let bytes: [u8; 32] =
            decoded
                .try_into()
                .map_err(|raw: Vec<u8>| SuiTypeError::InvalidDigest {
                    value: value.to_string(),
                    reason: format!("期望 32 字节，实际 {} 字节", raw.len()),
                })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for ObjectDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: ObjectDigest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectOwnership {
    Owned,
    Immutable,
    Shared { initial_shared_version: u64 },
}

/// 链上查询得到的对象最新引用及所有权。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedObject {
    pub object_ref: ObjectRef,
    pub ownership: ObjectOwnership,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StructTag {
    pub address: SuiAddress,
    pub module: String,
    pub name: String,
    pub type_params: Vec<TypeTag>,
}

/// Move 类型标签，变体顺序即 BCS 枚举序号。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeTag {
    Bool,
    U8,
    U64,
    U128,
    Address,
    Signer,
    Vector(Box<TypeTag>),
    Struct(Box<StructTag>),
    U16,
    U32,
    U256,
}

impl FromStr for TypeTag {
    type Err = SuiTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeTagParser::new(value);
        let tag = parser.parse_type()?;
        parser.skip_whitespace();
        if !parser.at_end() {
            return Err(parser.error("存在多余字符"));
        }
        Ok(tag)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Bool => f.write_str("bool"),
            TypeTag::U8 => f.write_str("u8"),
            TypeTag::U16 => f.write_str("u16"),
            TypeTag::U32 => f.write_str("u32"),
            TypeTag::U64 => f.write_str("u64"),
            TypeTag::U128 => f.write_str("u128"),
            TypeTag::U256 => f.write_str("u256"),
            TypeTag::Address => f.write_str("address"),
            TypeTag::Signer => f.write_str("signer"),
            TypeTag::Vector(inner) => write!(f, "vector<{inner}>"),
            TypeTag::Struct(tag) => fmt::Display::fmt(tag, f),
        }
    }
}

impl fmt::Display for StructTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)?;
        if !self.type_params.is_empty() {
            f.write_str("<")?;
            for (idx, param) in self.type_params.iter().enumerate() {
                if idx > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{param}")?;
            }
            f.write_str(">")?;
        }
        Ok(())
    }
}

/// 同质化资产（Coin）的规范类型，例如 `0x2::sui::SUI`。按值比较。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoinType(StructTag);

impl CoinType {
    pub fn type_tag(&self) -> TypeTag {
        TypeTag::Struct(Box::new(self.0.clone()))
    }

    pub fn sui() -> Self {
        Self(StructTag {
            address: SuiAddress::from_low_byte(2),
            module: "sui".to_string(),
            name: "SUI".to_string(),
            type_params: Vec::new(),
        })
    }
}

impl FromStr for CoinType {
    type Err = SuiTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.parse::<TypeTag>()? {
            TypeTag::Struct(tag) => Ok(Self(*tag)),
            other => Err(SuiTypeError::InvalidTypeTag {
                value: value.to_string(),
                reason: format!("资产类型必须是结构体，实际为 {other}"),
            }),
        }
    }
}

impl fmt::Display for CoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

struct TypeTagParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TypeTagParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, reason: &str) -> SuiTypeError {
        SuiTypeError::InvalidTypeTag {
            value: self.input.to_string(),
            reason: format!("{reason}（位置 {}）", self.pos),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn consume(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<(), SuiTypeError> {
        if self.consume(token) {
            Ok(())
        } else {
            Err(self.error(&format!("期望 `{token}`")))
        }
    }

    fn identifier(&mut self) -> Result<&'a str, SuiTypeError> {
        self.skip_whitespace();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("缺少标识符"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn move_identifier(&mut self) -> Result<String, SuiTypeError> {
        let ident = self.identifier()?;
        let starts_ok = ident
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !starts_ok {
            return Err(self.error(&format!("标识符 {ident} 非法")));
        }
        Ok(ident.to_string())
    }

    fn parse_type(&mut self) -> Result<TypeTag, SuiTypeError> {
        let ident = self.identifier()?;
        let tag = match ident {
            "bool" => TypeTag::Bool,
            "u8" => TypeTag::U8,
            "u16" => TypeTag::U16,
            "u32" => TypeTag::U32,
            "u64" => TypeTag::U64,
            "u128" => TypeTag::U128,
            "u256" => TypeTag::U256,
            "address" => TypeTag::Address,
            "signer" => TypeTag::Signer,
            "vector" => {
                self.expect("<")?;
                let inner = self.parse_type()?;
                self.expect(">")?;
                TypeTag::Vector(Box::new(inner))
            }
            _ if ident.starts_with("0x") || ident.starts_with("0X") => {
                let address = ident.parse::<SuiAddress>().map_err(|err| match err {
                    SuiTypeError::InvalidAddress { reason, .. } => self.error(&reason),
                    other => other,
                })?;
                self.expect("::")?;
                let module = self.move_identifier()?;
                self.expect("::")?;
                let name = self.move_identifier()?;
                let mut type_params = Vec::new();
                if self.consume("<") {
                    loop {
                        type_params.push(self.parse_type()?);
                        if self.consume(",") {
                            continue;
                        }
                        self.expect(">")?;
                        break;
                    }
                }
                TypeTag::Struct(Box::new(StructTag {
                    address,
                    module,
                    name,
                    type_params,
                }))
            }
            other => return Err(self.error(&format!("未知类型 {other}"))),
        };
        Ok(tag)
    }
}
