//! 签名身份解析：把原始私钥或助记词转换为 Ed25519 签名身份与 Sui 地址。
//!
//! 私钥材料只保存在 `Zeroizing` 缓冲区与 `SigningKey` 中，任何日志字段都不携带它。

use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use ed25519_dalek::{Signer, SigningKey};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use crate::sui::SuiAddress;
use crate::sui::blake2b256;
use crate::sui::transaction::signing_digest;

pub mod loader;
pub mod mnemonic;

pub use loader::load_identity;
pub use mnemonic::DEFAULT_DERIVATION_PATH;

/// Bech32 私钥前缀。
pub const SUI_PRIVATE_KEY_HRP: &str = "suiprivkey";
const SECRET_KEY_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("密钥格式非法: {0}")]
    MalformedSecret(String),
    #[error("不支持的签名方案: {scheme:?}，仅支持 Ed25519")]
    UnsupportedKeyScheme { scheme: SignatureScheme },
    #[error("缺少密钥: {0}")]
    MissingSecret(String),
}

pub type KeyResult<T> = Result<T, KeyError>;

/// Sui 签名方案标识（私钥与签名首字节）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    Ed25519,
    Secp256k1,
    Secp256r1,
    MultiSig,
    ZkLogin,
    Passkey,
}

impl SignatureScheme {
    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0x00 => Some(Self::Ed25519),
            0x01 => Some(Self::Secp256k1),
            0x02 => Some(Self::Secp256r1),
            0x03 => Some(Self::MultiSig),
            0x05 => Some(Self::ZkLogin),
            0x06 => Some(Self::Passkey),
            _ => None,
        }
    }

    pub fn flag(self) -> u8 {
        match self {
            Self::Ed25519 => 0x00,
            Self::Secp256k1 => 0x01,
            Self::Secp256r1 => 0x02,
            Self::MultiSig => 0x03,
            Self::ZkLogin => 0x05,
            Self::Passkey => 0x06,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    RawKey,
    Mnemonic,
}

impl KeyFormat {
    /// 含空白的输入视为助记词，否则按原始私钥处理。
    pub fn detect(secret: &str) -> Self {
        if secret.trim().split_whitespace().nth(1).is_some() {
            Self::Mnemonic
        } else {
            Self::RawKey
        }
    }
}

pub struct SigningIdentity {
    address: SuiAddress,
    key: SigningKey,
}

impl SigningIdentity {
    pub fn resolve(secret: &str, format: KeyFormat) -> KeyResult<Self> {
        Self::resolve_with_path(secret, format, DEFAULT_DERIVATION_PATH)
    }

    pub fn resolve_with_path(
        secret: &str,
        format: KeyFormat,
        derivation_path: &str,
    ) -> KeyResult<Self> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(KeyError::MissingSecret("密钥内容为空".to_string()));
        }

        let key_bytes = match format {
            KeyFormat::RawKey => decode_raw_key(secret)?,
            KeyFormat::Mnemonic => mnemonic::derive_ed25519_secret(secret, derivation_path)?,
        };
        let identity = Self::from_secret_bytes(&key_bytes);
        debug!(
            target: "wallet",
            address = %identity.address,
            format = ?format,
            "签名身份已解析"
        );
        Ok(identity)
    }

    pub fn from_secret_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        let key = SigningKey::from_bytes(secret);
        let public_key = key.verifying_key().to_bytes();
        let address = SuiAddress::new(blake2b256(&[
            &[SignatureScheme::Ed25519.flag()],
            &public_key,
        ]));
        Self { address, key }
    }

    pub fn address(&self) -> SuiAddress {
        self.address
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    /// 对交易字节签名，返回 `base64(flag ‖ signature ‖ public_key)`。
    pub fn sign_transaction(&self, tx_bytes: &[u8]) -> String {
        let digest = signing_digest(tx_bytes);
        let signature = self.key.sign(&digest);

        let mut serialized = Vec::with_capacity(1 + 64 + 32);
        serialized.push(SignatureScheme::Ed25519.flag());
        serialized.extend_from_slice(&signature.to_bytes());
        serialized.extend_from_slice(&self.public_key());
        general_purpose::STANDARD.encode(serialized)
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address)
            .field("key", &"<redacted>")
            .finish()
    }
}

fn decode_raw_key(secret: &str) -> KeyResult<Zeroizing<[u8; SECRET_KEY_LENGTH]>> {
    let payload = if secret
        .get(..SUI_PRIVATE_KEY_HRP.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(SUI_PRIVATE_KEY_HRP))
    {
        let (hrp, data) = bech32::decode(secret)
            .map_err(|err| KeyError::MalformedSecret(format!("Bech32 解码失败: {err}")))?;
        if !hrp.as_str().eq_ignore_ascii_case(SUI_PRIVATE_KEY_HRP) {
            return Err(KeyError::MalformedSecret(format!(
                "Bech32 前缀应为 {SUI_PRIVATE_KEY_HRP}，实际为 {}",
                hrp.as_str()
            )));
        }
        Zeroizing::new(data)
    } else {
        Zeroizing::new(
            general_purpose::STANDARD
                .decode(secret.as_bytes())
                .map_err(|err| KeyError::MalformedSecret(format!("Base64 解码失败: {err}")))?,
        )
    };

    if payload.len() != SECRET_KEY_LENGTH + 1 {
        return Err(KeyError::MalformedSecret(format!(
            "私钥长度应为 {} 字节（含方案标识），实际为 {}",
            SECRET_KEY_LENGTH + 1,
            payload.len()
        )));
    }

    match SignatureScheme::from_flag(payload[0]) {
        Some(SignatureScheme::Ed25519) => {}
        Some(scheme) => return Err(KeyError::UnsupportedKeyScheme { scheme }),
        None => {
            return Err(KeyError::MalformedSecret(format!(
                "未知的签名方案标识 0x{:02x}",
                payload[0]
            )));
        }
    }

    let mut key = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
    key.copy_from_slice(&payload[1..]);
    Ok(key)
}
