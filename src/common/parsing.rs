// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use alloy::primitives::{Address, U256};
use std::str::FromStr;

pub fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn parse_address_hex(s: &str) -> Option<Address> {
    let trimmed = strip_0x(s.trim());
    if trimmed.len() != 40 {
        return None;
    }
    Address::from_str(trimmed).ok()
}

pub fn parse_u256_hex(s: &str) -> Option<U256> {
    U256::from_str_radix(strip_0x(s), 16).ok()
}

/// Decimal wei amount, or hex when prefixed with `0x`.
pub fn parse_u256_amount(s: &str) -> Option<U256> {
    let trimmed = s.trim().replace('_', "");
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        return parse_u256_hex(&trimmed);
    }
    U256::from_str_radix(&trimmed, 10).ok()
}

/// Splits a comma or whitespace separated list, dropping empty items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsers_accept_lower_and_upper_prefixes() {
        assert_eq!(parse_u256_hex("0X0"), Some(U256::ZERO));
        assert_eq!(parse_u256_amount("0x2a"), Some(U256::from(42u64)));
        assert_eq!(
            parse_address_hex("0XEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"),
            Some(Address::repeat_byte(0xee))
        );
        assert_eq!(parse_address_hex("0x1234"), None);
    }

    #[test]
    fn decimal_amounts_allow_separators() {
        assert_eq!(
            parse_u256_amount("1_000_000"),
            Some(U256::from(1_000_000u64))
        );
        assert_eq!(parse_u256_amount("-5"), None);
    }

    #[test]
    fn split_list_handles_commas_and_spaces() {
        assert_eq!(split_list(" a, b c,,"), vec!["a", "b", "c"]);
        assert!(split_list("  ").is_empty());
    }
}
