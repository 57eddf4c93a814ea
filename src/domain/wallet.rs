// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::parsing::strip_0x;
use crate::domain::error::AppError;
use crate::domain::transaction::{FeeCaps, SignedTransaction, TransactionIntent};
use crate::domain::nonce::NonceSequence;
use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind};
use alloy::signers::local::PrivateKeySigner;
use std::fmt;
use std::str::FromStr;

/// One signing identity for the duration of a run.
pub struct Wallet {
    signer: PrivateKeySigner,
    address: Address,
    nonce: Option<NonceSequence>,
}

impl Wallet {
    pub fn from_signer(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self {
            signer,
            address,
            nonce: None,
        }
    }

    pub fn from_private_key(raw: &str) -> Result<Self, AppError> {
        let signer = PrivateKeySigner::from_str(strip_0x(raw.trim()))
            .map_err(|e| AppError::Config(format!("Invalid wallet private key: {e}")))?;
        Ok(Self::from_signer(signer))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn attach_nonce(&mut self, sequence: NonceSequence) {
        self.nonce = Some(sequence);
    }

    pub fn nonce(&self) -> Option<&NonceSequence> {
        self.nonce.as_ref()
    }

    pub fn next_nonce(&self) -> Result<u64, AppError> {
        self.nonce
            .as_ref()
            .map(NonceSequence::peek)
            .ok_or_else(|| AppError::Validation {
                field: "nonce".into(),
                message: format!("nonce not loaded for wallet {:#x}", self.address),
            })
    }

    /// Records an accepted submission. Call only after the network acknowledged `nonce`.
    pub fn commit_nonce(&mut self, nonce: u64) -> Result<(), AppError> {
        let address = self.address;
        let seq = self.nonce.as_mut().ok_or_else(|| AppError::Validation {
            field: "nonce".into(),
            message: format!("nonce not loaded for wallet {address:#x}"),
        })?;
        seq.commit(nonce)
    }

    pub fn sign(&self, intent: &TransactionIntent) -> Result<SignedTransaction, AppError> {
        if intent.from != self.address {
            return Err(AppError::Signing(format!(
                "intent sender {:#x} does not match wallet {:#x}",
                intent.from, self.address
            )));
        }

        let envelope: TxEnvelope = match intent.gas.fees {
            FeeCaps::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut tx = TxEip1559 {
                    chain_id: intent.chain_id,
                    nonce: intent.nonce,
                    gas_limit: intent.gas.gas_limit,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    to: TxKind::Call(intent.call.to),
                    value: intent.call.value,
                    access_list: Default::default(),
                    input: intent.call.data.clone(),
                };
                let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut tx)
                    .map_err(|e| AppError::Signing(format!("Sign tx failed: {e}")))?;
                tx.into_signed(sig).into()
            }
            FeeCaps::Legacy { gas_price } => {
                let mut tx = TxLegacy {
                    chain_id: Some(intent.chain_id),
                    nonce: intent.nonce,
                    gas_price,
                    gas_limit: intent.gas.gas_limit,
                    to: TxKind::Call(intent.call.to),
                    value: intent.call.value,
                    input: intent.call.data.clone(),
                };
                let sig = TxSignerSync::sign_transaction_sync(&self.signer, &mut tx)
                    .map_err(|e| AppError::Signing(format!("Sign tx failed: {e}")))?;
                tx.into_signed(sig).into()
            }
        };

        Ok(SignedTransaction {
            hash: *envelope.tx_hash(),
            raw: Bytes::from(envelope.encoded_2718()),
            from: self.address,
            to: intent.call.to,
            nonce: intent.nonce,
        })
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}
