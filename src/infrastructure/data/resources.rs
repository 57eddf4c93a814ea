// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

//! Line-based resource files: one private key or address per line, `#` comments
//! and blank lines ignored.

use crate::common::parsing::parse_address_hex;
use crate::domain::error::AppError;
use crate::domain::wallet::Wallet;
use alloy::primitives::Address;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn content_lines(raw: &str) -> impl Iterator<Item = (usize, &str)> {
    raw.lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.split('#').next().unwrap_or("").trim()))
        .filter(|(_, line)| !line.is_empty())
}

fn read(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read {}: {e}", path.display())))
}

pub fn parse_wallets(raw: &str) -> Result<Vec<Wallet>, AppError> {
    let mut seen = HashSet::new();
    let mut wallets = Vec::new();
    for (line_no, line) in content_lines(raw) {
        let wallet = Wallet::from_private_key(line)
            .map_err(|_| AppError::Config(format!("Invalid private key on line {line_no}")))?;
        if !seen.insert(wallet.address()) {
            tracing::warn!(
                target: "resources",
                wallet = %format!("{:#x}", wallet.address()),
                line = line_no,
                "Duplicate wallet dropped"
            );
            continue;
        }
        wallets.push(wallet);
    }
    Ok(wallets)
}

pub fn parse_addresses(raw: &str) -> Result<Vec<Address>, AppError> {
    content_lines(raw)
        .map(|(line_no, line)| {
            parse_address_hex(line)
                .ok_or_else(|| AppError::InvalidAddress(format!("{line} (line {line_no})")))
        })
        .collect()
}

pub fn load_wallets(path: &Path) -> Result<Vec<Wallet>, AppError> {
    let wallets = parse_wallets(&read(path)?)?;
    if wallets.is_empty() {
        return Err(AppError::Config(format!(
            "No wallets loaded from {}",
            path.display()
        )));
    }
    tracing::info!(target: "resources", count = wallets.len(), "Wallets loaded");
    Ok(wallets)
}

pub fn load_addresses(path: &Path) -> Result<Vec<Address>, AppError> {
    let addresses = parse_addresses(&read(path)?)?;
    tracing::info!(
        target: "resources",
        path = %path.display(),
        count = addresses.len(),
        "Addresses loaded"
    );
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_A: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    const KEY_B: &str = "0x8da4ef21b864d2cc526dbdb2a120bd2874c36c9d0a1fb7f8c63d7f7a8b41de8f";

    #[test]
    fn wallets_skip_comments_and_duplicates() {
        let raw = format!("# keys\n{KEY_A}\n\n{KEY_B} # second\n0x{KEY_A}\n");
        let wallets = parse_wallets(&raw).unwrap();
        assert_eq!(wallets.len(), 2);
        assert_ne!(wallets[0].address(), wallets[1].address());
    }

    #[test]
    fn bad_key_reports_line_without_echoing_it() {
        let err = parse_wallets("\nnot-a-key\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 2"));
        assert!(!msg.contains("not-a-key"));
    }

    #[test]
    fn addresses_parse_in_order() {
        let raw = "0x1111111111111111111111111111111111111111\n# x\n2222222222222222222222222222222222222222\n";
        let parsed = parse_addresses(raw).unwrap();
        assert_eq!(
            parsed,
            vec![Address::repeat_byte(0x11), Address::repeat_byte(0x22)]
        );
        assert!(matches!(
            parse_addresses("0x12"),
            Err(AppError::InvalidAddress(_))
        ));
    }

    #[test]
    fn empty_wallet_file_is_configuration_error() {
        let path = std::env::temp_dir().join(format!("wallets-empty-{}.txt", std::process::id()));
        std::fs::write(&path, "# nothing here\n").unwrap();
        let res = load_wallets(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(res, Err(AppError::Config(_))));
    }
}
