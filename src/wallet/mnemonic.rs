//! BIP-39 助记词 → SLIP-0010 Ed25519 私钥派生。

use bip39::Mnemonic;
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

use super::KeyError;

pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/784'/0'/0'/0'";

const ED25519_CURVE_SEED: &[u8] = b"ed25519 seed";
const HARDENED_OFFSET: u32 = 0x8000_0000;

type HmacSha512 = Hmac<Sha512>;

/// 解析形如 `m/44'/784'/0'/0'/0'` 的派生路径；Ed25519 只允许硬化节点。
pub fn parse_derivation_path(path: &str) -> Result<Vec<u32>, KeyError> {
    let mut segments = path.trim().split('/');
    if segments.next() != Some("m") {
        return Err(KeyError::MalformedSecret(format!(
            "派生路径 {path} 必须以 m/ 开头"
        )));
    }

    let mut indexes = Vec::new();
    for segment in segments {
        let raw = segment.strip_suffix('\'').ok_or_else(|| {
            KeyError::MalformedSecret(format!("派生路径 {path} 中 {segment} 不是硬化节点"))
        })?;
        let index = raw.parse::<u32>().map_err(|err| {
            KeyError::MalformedSecret(format!("派生路径 {path} 中 {segment} 非法: {err}"))
        })?;
        if index >= HARDENED_OFFSET {
            return Err(KeyError::MalformedSecret(format!(
                "派生路径 {path} 中 {segment} 超出范围"
            )));
        }
        indexes.push(index | HARDENED_OFFSET);
    }

    if indexes.is_empty() {
        return Err(KeyError::MalformedSecret(format!("派生路径 {path} 为空")));
    }
    Ok(indexes)
}

pub fn derive_ed25519_secret(
    phrase: &str,
    path: &str,
) -> Result<Zeroizing<[u8; 32]>, KeyError> {
    let normalized = Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    );
    let mnemonic = Mnemonic::parse_normalized(normalized.as_str())
        .map_err(|err| KeyError::MalformedSecret(format!("助记词校验失败: {err}")))?;
    let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));
    let indexes = parse_derivation_path(path)?;

    let (mut key, mut chain_code) = hmac_split(ED25519_CURVE_SEED, seed.as_ref())?;
    for index in indexes {
        let mut data = Zeroizing::new(Vec::with_capacity(37));
        data.push(0u8);
        data.extend_from_slice(key.as_ref());
        data.extend_from_slice(&index.to_be_bytes());
        let (next_key, next_chain) = hmac_split(chain_code.as_ref(), &data)?;
        key = next_key;
        chain_code = next_chain;
    }

    Ok(key)
}

fn hmac_split(
    key: &[u8],
    data: &[u8],
) -> Result<(Zeroizing<[u8; 32]>, Zeroizing<[u8; 32]>), KeyError> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|err| KeyError::MalformedSecret(format!("HMAC 初始化失败: {err}")))?;
    mac.update(data);
    let mut output = Zeroizing::new([0u8; 64]);
    output.copy_from_slice(&mac.finalize().into_bytes());

    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&output[..32]);
    right.copy_from_slice(&output[32..]);
    Ok((left, right))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn default_path_is_fully_hardened() {
        let indexes = parse_derivation_path(DEFAULT_DERIVATION_PATH).unwrap();
        assert_eq!(indexes.len(), 5);
        assert_eq!(indexes[1], 784 | HARDENED_OFFSET);
    }

    #[test]
    fn rejects_soft_segments() {
        assert!(parse_derivation_path("m/44'/784'/0'/0/0").is_err());
        assert!(parse_derivation_path("44'/784'").is_err());
        assert!(parse_derivation_path("m").is_err());
    }

    #[test]
    fn derivation_ignores_case_and_spacing() {
        let spaced = format!("  {}  ", PHRASE.to_uppercase().replace(' ', "   "));
        let a = derive_ed25519_secret(PHRASE, DEFAULT_DERIVATION_PATH).unwrap();
        let b = derive_ed25519_secret(&spaced, DEFAULT_DERIVATION_PATH).unwrap();
        assert_eq!(*a, *b);
    }

    #[test]
    fn different_accounts_yield_different_keys() {
        let a = derive_ed25519_secret(PHRASE, "m/44'/784'/0'/0'/0'").unwrap();
        let b = derive_ed25519_secret(PHRASE, "m/44'/784'/1'/0'/0'").unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn invalid_checksum_is_malformed() {
        let phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        let err = derive_ed25519_secret(phrase, DEFAULT_DERIVATION_PATH).unwrap_err();
        assert!(matches!(err, KeyError::MalformedSecret(_)));
    }
}
