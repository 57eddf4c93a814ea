// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::domain::constants::MULTICALL3;
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    #[sol(rpc)]
    contract ERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function transfer(address to, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

sol! {
    #[derive(Debug, PartialEq, Eq)]
    contract IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
        function getEthBalance(address addr) external view returns (uint256 balance);
    }
}

pub fn approve_calldata(spender: Address, amount: U256) -> Bytes {
    ERC20::approveCall { spender, amount }.abi_encode().into()
}

pub fn transfer_calldata(to: Address, amount: U256) -> Bytes {
    ERC20::transferCall { to, amount }.abi_encode().into()
}

/// `aggregate3` payload reading `owner`'s balance of each entry. `None` reads the
/// native coin through the multicall contract itself.
pub fn balances_calldata(owner: Address, tokens: &[Option<Address>]) -> Bytes {
    let calls = tokens
        .iter()
        .map(|token| match token {
            Some(token) => IMulticall3::Call3 {
                target: *token,
                allowFailure: true,
                callData: ERC20::balanceOfCall { owner }.abi_encode().into(),
            },
            None => IMulticall3::Call3 {
                target: MULTICALL3,
                allowFailure: true,
                callData: IMulticall3::getEthBalanceCall { addr: owner }
                    .abi_encode()
                    .into(),
            },
        })
        .collect();
    IMulticall3::aggregate3Call { calls }.abi_encode().into()
}

/// One balance per `aggregate3` result. Failed or short entries are `None`.
pub fn decode_balances(data: &[u8]) -> Result<Vec<Option<U256>>, alloy::sol_types::Error> {
    let results = IMulticall3::aggregate3Call::abi_decode_returns(data)?;
    Ok(results
        .iter()
        .map(|r| {
            (r.success && r.returnData.len() >= 32)
                .then(|| U256::from_be_slice(&r.returnData[..32]))
        })
        .collect())
}
