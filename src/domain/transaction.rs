// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use alloy::primitives::{Address, B256, Bytes, U256};
use alloy::rpc::types::eth::{TransactionInput, TransactionRequest};

/// Fee caps for one transaction, EIP-1559 where the chain supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeCaps {
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
    Legacy {
        gas_price: u128,
    },
}

impl FeeCaps {
    /// Highest price per gas unit the transaction may pay.
    pub fn price_ceiling(&self) -> u128 {
        match self {
            FeeCaps::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
            FeeCaps::Legacy { gas_price } => *gas_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasParams {
    pub fees: FeeCaps,
    pub gas_limit: u64,
}

impl GasParams {
    pub fn max_cost(&self) -> U256 {
        U256::from(self.fees.price_ceiling()).saturating_mul(U256::from(self.gas_limit))
    }
}

/// Destination, value and calldata of a transaction before gas and nonce are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCall {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl TxCall {
    pub fn native_transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            value,
            data: Bytes::new(),
        }
    }

    pub fn contract(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: data.into(),
        }
    }

    pub fn to_request(&self, from: Address) -> TransactionRequest {
        TransactionRequest::default()
            .from(from)
            .to(self.to)
            .value(self.value)
            .input(TransactionInput::new(self.data.clone()))
    }
}

/// Fully specified, unsigned transaction. Built once and signed once.
#[derive(Debug, Clone)]
pub struct TransactionIntent {
    pub from: Address,
    pub chain_id: u64,
    pub call: TxCall,
    pub gas: GasParams,
    pub nonce: u64,
}

#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub hash: B256,
    pub raw: Bytes,
    pub from: Address,
    pub to: Address,
    pub nonce: u64,
}
