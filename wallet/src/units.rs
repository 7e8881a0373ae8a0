use primitive_types::U256;

use crate::error::WalletError;

pub const ETHER_DECIMALS: usize = 18;
pub const GWEI_DECIMALS: usize = 9;

pub fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(ETHER_DECIMALS)
}

pub fn gwei(amount: u64) -> U256 {
    U256::from(amount) * U256::exp10(GWEI_DECIMALS)
}

/// Renders wei as ether the way `fromWei` does: no trailing fractional zeros.
pub fn format_ether(wei: U256) -> String {
    let unit = U256::exp10(ETHER_DECIMALS);
    let whole = wei / unit;
    let fraction = wei % unit;
    if fraction.is_zero() {
        return whole.to_string();
    }
    let digits = format!("{:0>width$}", fraction.to_string(), width = ETHER_DECIMALS);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Parses a decimal ether amount such as `"1"` or `"0.25"` into wei.
pub fn parse_ether(text: &str) -> Result<U256, WalletError> {
    let text = text.trim();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(WalletError::InvalidArgument("empty ether amount"));
    }
    if fraction.len() > ETHER_DECIMALS {
        return Err(WalletError::InvalidArgument(
            "ether amount has more than 18 decimals",
        ));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(WalletError::InvalidArgument("ether amount must be decimal"));
    }
    let padded = format!("{whole}{fraction:0<width$}", width = ETHER_DECIMALS);
    U256::from_dec_str(&padded).map_err(|_| WalletError::InvalidArgument("ether amount overflow"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_whole_and_fractional_amounts() {
        assert_eq!(format_ether(ether(15)), "15");
        assert_eq!(format_ether(U256::zero()), "0");
        assert_eq!(format_ether(U256::one()), "0.000000000000000001");
        let spent = ether(14) + U256::from_dec_str("999580000000000000").unwrap();
        assert_eq!(format_ether(spent), "14.99958");
    }

    #[test]
    fn parse_ether_amounts() {
        assert_eq!(parse_ether("1").unwrap(), ether(1));
        assert_eq!(parse_ether("0.5").unwrap(), ether(1) / 2);
        assert_eq!(parse_ether(".000000000000000001").unwrap(), U256::one());
        assert!(parse_ether("1.0000000000000000001").is_err());
        assert!(parse_ether("1e18").is_err());
        assert!(parse_ether("").is_err());
    }

    #[test]
    fn gwei_scale() {
        assert_eq!(gwei(20), U256::from(20_000_000_000u64));
    }
}
