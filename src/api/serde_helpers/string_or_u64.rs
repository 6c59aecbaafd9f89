//! JSON 中的 u64 字段既可能是字符串也可能是数字。

use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|err| de::Error::custom(format!("数值 {raw} 解析失败: {err}"))),
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| de::Error::custom(format!("数值 {number} 不是无符号整数"))),
        other => Err(de::Error::custom(format!("数值字段类型非法: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "super::deserialize")]
        amount: u64,
    }

    #[test]
    fn accepts_strings_and_numbers() {
        let a: Holder = serde_json::from_str(r#"{"amount":"950000"}"#).unwrap();
        let b: Holder = serde_json::from_str(r#"{"amount":950000}"#).unwrap();
        assert_eq!(a.amount, 950_000);
        assert_eq!(b.amount, 950_000);
    }

    #[test]
    fn rejects_negative_and_fractional() {
        assert!(serde_json::from_str::<Holder>(r#"{"amount":-1}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"amount":"1.5"}"#).is_err());
        assert!(serde_json::from_str::<Holder>(r#"{"amount":null}"#).is_err());
    }
}
