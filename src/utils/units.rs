use anyhow::{Context, Result};
use rust_decimal::Decimal;

const NATIVE_DECIMALS: u32 = 18;

/// Converts a JSON-RPC hex wei quantity (e.g. "0x38d7ea4c68000") into the
/// chain's native unit.
pub fn wei_hex_to_native(hex: &str) -> Result<Decimal> {
    let digits = hex.strip_prefix("0x").unwrap_or(hex);
    let wei = u128::from_str_radix(digits, 16)
        .with_context(|| format!("Invalid wei quantity: {}", hex))?;
    let wei = i128::try_from(wei).context("Balance exceeds representable range")?;
    Decimal::try_from_i128_with_scale(wei, NATIVE_DECIMALS)
        .context("Balance exceeds representable range")
}

/// Dashboard formatting: fixed four decimal places, sign preserved.
pub fn format_native(value: Decimal) -> String {
    format!("{:.4}", value.round_dp(NATIVE_DECIMALS))
}
