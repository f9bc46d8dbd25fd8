//! [`SolanaRail`], the Solana implementation of [`PaymentRail`].
//!
//! Owns the RPC handle, the catalog handle, and the rail tuning; all three
//! are injected at construction so nothing here is process-global.

use async_trait::async_trait;
use solana_pubkey::{Pubkey, pubkey};

use payrail::catalog::DatasetCatalog;
use payrail::error::PaymentError;
use payrail::rail::PaymentRail;
use payrail::types::{Dataset, Payment};

use crate::broadcast::{self, BroadcastConfig};
use crate::draft::{self, DraftRequest};
use crate::fees::PriorityLevel;
use crate::rpc::SolanaRpc;
use crate::validate::{self, ValidateConfig};

/// USDC mint on Solana mainnet, the default payment token.
pub const USDC_MINT: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// Tuning and token selection for the Solana rail.
#[derive(Debug, Clone, Copy)]
pub struct RailConfig {
    /// Mint of the payment token all purchases settle in.
    pub mint: Pubkey,
    /// Target inclusion service level for drafts.
    pub priority_level: PriorityLevel,
    /// Send/confirm loop tuning.
    pub broadcast: BroadcastConfig,
    /// Settled-transaction fetch tuning.
    pub validate: ValidateConfig,
}

impl Default for RailConfig {
    fn default() -> Self {
        Self {
            mint: USDC_MINT,
            priority_level: PriorityLevel::default(),
            broadcast: BroadcastConfig::default(),
            validate: ValidateConfig::default(),
        }
    }
}

/// The Solana payment rail.
pub struct SolanaRail<R, C> {
    rpc: R,
    catalog: C,
    config: RailConfig,
}

impl<R, C> std::fmt::Debug for SolanaRail<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRail")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<R, C> SolanaRail<R, C> {
    /// Creates a rail over the given RPC and catalog handles.
    pub const fn new(rpc: R, catalog: C, config: RailConfig) -> Self {
        Self {
            rpc,
            catalog,
            config,
        }
    }
}

#[async_trait]
impl<R, C> PaymentRail for SolanaRail<R, C>
where
    R: SolanaRpc,
    C: DatasetCatalog,
{
    async fn build_draft(
        &self,
        dataset: &Dataset,
        dataset_id: &str,
        signer: &str,
    ) -> Result<String, PaymentError> {
        let payer: Pubkey = signer
            .parse()
            .map_err(|_| PaymentError::InputInvalid(format!("invalid signer address {signer:?}")))?;
        let payee: Pubkey = dataset.owner.parse().map_err(|_| {
            PaymentError::InputInvalid(format!("invalid dataset owner {:?}", dataset.owner))
        })?;
        let price = dataset
            .price
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PaymentError::DatasetNotPayable(dataset_id.to_owned()))?;

        // The HTTP contract distinguishes an unknown signer wallet from an
        // unready token sub-account.
        if self.rpc.get_account(&payer).await?.is_none() {
            return Err(PaymentError::AccountNotReady(format!(
                "signer account {payer} not found"
            )));
        }

        draft::assemble(
            &self.rpc,
            &self.config.mint,
            self.config.priority_level,
            DraftRequest {
                payer,
                payee,
                price,
                dataset_id,
            },
        )
        .await
    }

    async fn broadcast_and_confirm(
        &self,
        signed_transaction: &str,
    ) -> Result<String, PaymentError> {
        broadcast::broadcast_and_confirm(&self.rpc, &self.config.broadcast, signed_transaction)
            .await
            .map(|signature| signature.to_string())
    }

    async fn validate_settlement(
        &self,
        signature: &str,
        dataset_id: &str,
    ) -> Result<Payment, PaymentError> {
        validate::validate_transfer(
            &self.rpc,
            &self.catalog,
            &self.config.validate,
            signature,
            dataset_id,
        )
        .await
    }
}
