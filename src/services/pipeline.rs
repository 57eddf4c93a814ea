// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Gas sizing, signing, broadcast and confirmation of single wallet transactions.
//!
//! The pipeline owns the nonce discipline: a wallet's nonce is committed only once
//! the network acknowledged the payload, and an acknowledged transaction is never
//! broadcast again.

use crate::domain::chain::ChainTarget;
use crate::domain::constants::{CONFIRMATION_EXTENSIONS, CONFIRMATION_TIMEOUT};
use crate::domain::error::AppError;
use crate::domain::transaction::{GasParams, SignedTransaction, TransactionIntent, TxCall};
use crate::domain::wallet::Wallet;
use crate::network::chain_client::{ChainClient, ReceiptStatus};
use crate::network::gas::GasStrategy;
use alloy::primitives::{Address, B256, U256};
use std::sync::Arc;
use std::time::Duration;

/// How long to wait for a receipt, and how many times the wait may be extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub timeout: Duration,
    pub extensions: u32,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            timeout: CONFIRMATION_TIMEOUT,
            extensions: CONFIRMATION_EXTENSIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub hash: B256,
    pub block: Option<u64>,
}

pub struct TxPipeline {
    client: Arc<ChainClient>,
    target: ChainTarget,
    gas: Arc<GasStrategy>,
    confirmation: ConfirmationPolicy,
    dry_run: bool,
}

impl TxPipeline {
    pub fn new(
        client: Arc<ChainClient>,
        target: ChainTarget,
        gas: Arc<GasStrategy>,
        confirmation: ConfirmationPolicy,
        dry_run: bool,
    ) -> Self {
        Self {
            client,
            target,
            gas,
            confirmation,
            dry_run,
        }
    }

    pub fn client(&self) -> &Arc<ChainClient> {
        &self.client
    }

    pub fn target(&self) -> &ChainTarget {
        &self.target
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Gas estimate and fee caps for `call`, without checking the wallet can pay.
    ///
    /// `gas_hint` replaces the node estimate only when estimation failed
    /// transiently; a rejected estimate means the call would revert.
    pub async fn estimate(
        &self,
        from: Address,
        call: &TxCall,
        gas_hint: Option<u64>,
    ) -> Result<GasParams, AppError> {
        let estimated = match self.client.estimate_gas(from, call).await {
            Ok(gas) => gas,
            Err(e) if e.is_transient() => match gas_hint.filter(|g| *g > 0) {
                Some(hint) => {
                    tracing::warn!(
                        target: "gas",
                        wallet = %format!("{from:#x}"),
                        hint,
                        error = %e,
                        "Gas estimation unavailable; using route hint"
                    );
                    hint
                }
                None => return Err(e),
            },
            Err(e) => return Err(e),
        };
        self.gas
            .params_for(&self.client, &self.target, estimated)
            .await
    }

    /// Fails with `InsufficientFunds` when the native balance cannot cover value plus
    /// the worst-case fee.
    pub async fn ensure_affordable(
        &self,
        from: Address,
        value: U256,
        gas: &GasParams,
    ) -> Result<(), AppError> {
        let required = value.saturating_add(gas.max_cost());
        let available = self
            .client
            .get_balance(from, self.target.chain.native_token())
            .await?;
        if available < required {
            return Err(AppError::InsufficientFunds {
                required: format!("{required} wei"),
                available: format!("{available} wei"),
            });
        }
        Ok(())
    }

    pub async fn size_gas(
        &self,
        from: Address,
        call: &TxCall,
        gas_hint: Option<u64>,
    ) -> Result<GasParams, AppError> {
        let gas = self.estimate(from, call, gas_hint).await?;
        self.ensure_affordable(from, call.value, &gas).await?;
        Ok(gas)
    }

    /// Signs `call` with the wallet's next nonce. The nonce is not consumed here.
    pub fn sign(
        &self,
        wallet: &Wallet,
        call: TxCall,
        gas: GasParams,
    ) -> Result<SignedTransaction, AppError> {
        let intent = TransactionIntent {
            from: wallet.address(),
            chain_id: self.target.chain_id(),
            call,
            gas,
            nonce: wallet.next_nonce()?,
        };
        wallet.sign(&intent)
    }

    /// Broadcasts once and commits the nonce on acknowledgement.
    ///
    /// An ambiguous broadcast is resolved by waiting for a receipt: if one shows up
    /// the nonce is spent and the hash is returned, otherwise the wallet needs
    /// manual attention.
    pub async fn submit(
        &self,
        wallet: &mut Wallet,
        signed: &SignedTransaction,
    ) -> Result<B256, AppError> {
        if self.dry_run {
            tracing::info!(
                target: "pipeline",
                wallet = %format!("{:#x}", signed.from),
                tx_hash = %format!("{:#x}", signed.hash),
                nonce = signed.nonce,
                "Dry-run: signed transaction not submitted"
            );
            return Err(AppError::DryRun(format!(
                "signed {:#x} with nonce {}, not submitted",
                signed.hash, signed.nonce
            )));
        }

        match self.client.submit(signed).await {
            Ok(hash) => {
                wallet.commit_nonce(signed.nonce)?;
                Ok(hash)
            }
            Err(AppError::SubmissionUnconfirmed { hash, reason }) => {
                match self
                    .client
                    .wait_for_receipt(hash, self.confirmation.timeout)
                    .await
                {
                    Ok(ReceiptStatus::Success { .. } | ReceiptStatus::Reverted { .. }) => {
                        tracing::info!(
                            target: "pipeline",
                            tx_hash = %format!("{hash:#x}"),
                            nonce = signed.nonce,
                            "Receipt found for unconfirmed submission"
                        );
                        wallet.commit_nonce(signed.nonce)?;
                        Ok(hash)
                    }
                    Err(e) if e.is_fatal() => Err(e),
                    Ok(ReceiptStatus::Timeout) | Err(_) => {
                        Err(AppError::SubmissionUnconfirmed { hash, reason })
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Waits for the receipt of an accepted transaction, extending the wait a
    /// bounded number of times. Never rebroadcasts.
    pub async fn confirm(&self, hash: B256) -> Result<Confirmation, AppError> {
        let mut waited = Duration::ZERO;
        for round in 0..=self.confirmation.extensions {
            match self
                .client
                .wait_for_receipt(hash, self.confirmation.timeout)
                .await?
            {
                ReceiptStatus::Success { block } => {
                    tracing::info!(
                        target: "pipeline",
                        tx_hash = %format!("{hash:#x}"),
                        block = ?block,
                        "Transaction confirmed"
                    );
                    return Ok(Confirmation { hash, block });
                }
                ReceiptStatus::Reverted { block } => {
                    return Err(AppError::Reverted { hash, block });
                }
                ReceiptStatus::Timeout => {
                    waited += self.confirmation.timeout;
                    if round < self.confirmation.extensions {
                        tracing::warn!(
                            target: "pipeline",
                            tx_hash = %format!("{hash:#x}"),
                            waited_secs = waited.as_secs(),
                            "No receipt yet; extending confirmation wait"
                        );
                    }
                }
            }
        }
        Err(AppError::ConfirmationTimeout {
            hash,
            waited_secs: waited.as_secs(),
        })
    }

    /// Size, sign, submit and confirm in one go.
    pub async fn execute(
        &self,
        wallet: &mut Wallet,
        call: TxCall,
        gas_hint: Option<u64>,
    ) -> Result<Confirmation, AppError> {
        let gas = self.size_gas(wallet.address(), &call, gas_hint).await?;
        let signed = self.sign(wallet, call, gas)?;
        let hash = self.submit(wallet, &signed).await?;
        self.confirm(hash).await
    }
}
