use alloy_primitives::U256;
use serde_json::Value;

/// Coerce a quantity result into minimal 0x-prefixed hex.
///
/// Numbers and decimal or hex strings are converted. Anything else is
/// returned untouched.
pub fn normalize_quantity(value: Value) -> Value {
    let parsed = match &value {
        Value::Number(number) => number.as_u64().map(U256::from),
        Value::String(text) => match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some("") => None,
            Some(digits) => U256::from_str_radix(digits, 16).ok(),
            None => U256::from_str_radix(text, 10).ok(),
        },
        _ => None,
    };

    parsed.map_or(value, |quantity| Value::String(format!("0x{quantity:x}")))
}
