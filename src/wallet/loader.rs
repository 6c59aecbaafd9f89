use std::env;

use tracing::info;
use zeroize::Zeroizing;

use crate::config::WalletConfig;

use super::{KeyError, KeyFormat, KeyResult, SigningIdentity};

pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";
pub const MNEMONICS_ENV: &str = "MNEMONICS";

/// 依次从环境变量 `PRIVATE_KEY`、`MNEMONICS` 与 `global.wallet` 中解析签名身份。
pub fn load_identity(wallet: &WalletConfig) -> KeyResult<SigningIdentity> {
    load_identity_with(wallet, |name| env::var(name).ok())
}

pub fn load_identity_with<F>(wallet: &WalletConfig, lookup: F) -> KeyResult<SigningIdentity>
where
    F: Fn(&str) -> Option<String>,
{
    let path = wallet.derivation_path.as_str();

    if let Some(value) = lookup(PRIVATE_KEY_ENV).map(Zeroizing::new) {
        if !value.trim().is_empty() {
            info!(target: "wallet", source = PRIVATE_KEY_ENV, "使用环境变量中的私钥");
            return SigningIdentity::resolve_with_path(&value, KeyFormat::RawKey, path);
        }
    }

    if let Some(value) = lookup(MNEMONICS_ENV).map(Zeroizing::new) {
        if !value.trim().is_empty() {
            info!(target: "wallet", source = MNEMONICS_ENV, "使用环境变量中的助记词");
            return SigningIdentity::resolve_with_path(&value, KeyFormat::Mnemonic, path);
        }
    }

    if !wallet.private_key.trim().is_empty() {
        let format = wallet
            .key_format
            .unwrap_or_else(|| KeyFormat::detect(&wallet.private_key));
        info!(target: "wallet", source = "global.wallet.private_key", "使用配置文件中的密钥");
        return SigningIdentity::resolve_with_path(&wallet.private_key, format, path);
    }

    if !wallet.mnemonic.trim().is_empty() {
        info!(target: "wallet", source = "global.wallet.mnemonic", "使用配置文件中的助记词");
        return SigningIdentity::resolve_with_path(&wallet.mnemonic, KeyFormat::Mnemonic, path);
    }

    Err(KeyError::MissingSecret(format!(
        "请设置环境变量 {PRIVATE_KEY_ENV} / {MNEMONICS_ENV}，或在 global.wallet 中配置 private_key / mnemonic"
    )))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const BECH32_KEY: &str =
        "suiprivkey1qqqsyqcyq5rqwzqfpg9scrgwpugpzysnzs23v9ccrydpk8qarc0jqa4ffsr";
    const PHRASE: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn env_private_key_wins_over_config() {
        let wallet = WalletConfig {
            mnemonic: PHRASE.to_string(),
            ..WalletConfig::default()
        };
        let identity =
            load_identity_with(&wallet, lookup(&[(PRIVATE_KEY_ENV, BECH32_KEY)])).unwrap();
        assert_eq!(
            identity.address().to_string(),
            "0x7573c697fa68450f04fa0dee2d39dcdc8a5ccf5db547f3e47638a6f8eeeec110"
        );
    }

    #[test]
    fn env_mnemonic_is_used_when_private_key_blank() {
        let identity = load_identity_with(
            &WalletConfig::default(),
            lookup(&[(PRIVATE_KEY_ENV, "  "), (MNEMONICS_ENV, PHRASE)]),
        )
        .unwrap();
        assert_eq!(
            identity.address().to_string(),
            "0x5e93a736d04fbb25737aa40bee40171ef79f65fae833749e3c089fe7cc2161f1"
        );
    }

    #[test]
    fn config_private_key_detects_mnemonic() {
        let wallet = WalletConfig {
            private_key: PHRASE.to_string(),
            ..WalletConfig::default()
        };
        let identity = load_identity_with(&wallet, lookup(&[])).unwrap();
        assert_eq!(
            identity.address().to_string(),
            "0x5e93a736d04fbb25737aa40bee40171ef79f65fae833749e3c089fe7cc2161f1"
        );
    }

    #[test]
    fn missing_everything_is_missing_secret() {
        let err = load_identity_with(&WalletConfig::default(), lookup(&[])).unwrap_err();
        assert!(matches!(err, KeyError::MissingSecret(_)));
    }
}
