//! RPC client abstraction for the Solana settlement network.
//!
//! The rail only needs a handful of RPC shapes, exposed here as the
//! [`SolanaRpc`] trait so the pipeline can be exercised against scripted
//! doubles in tests. [`SolanaRpcClient`] is the HTTP implementation backing
//! production deployments.

use async_trait::async_trait;
use solana_account::Account;
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{
    RpcSendTransactionConfig, RpcSimulateTransactionConfig, RpcTransactionConfig,
};
use solana_commitment_config::CommitmentConfig;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use solana_transaction_status_client_types::UiTransactionEncoding;

use payrail::error::PaymentError;

/// Transport or protocol failure talking to the settlement network.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct RpcError(pub String);

impl From<ClientError> for RpcError {
    fn from(e: ClientError) -> Self {
        Self(e.to_string())
    }
}

impl From<RpcError> for PaymentError {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e.0)
    }
}

/// Observed state of a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Not yet visible at the watched commitment level.
    Pending,
    /// Reached the watched commitment level successfully.
    Confirmed,
    /// Included but failed during execution.
    Failed(String),
}

/// The settlement network operations the rail depends on.
///
/// Methods return decoded domain values rather than raw RPC envelopes;
/// implementations own the wire details.
#[async_trait]
pub trait SolanaRpc: Send + Sync {
    /// Fetches an account at confirmed commitment, `None` if it does not
    /// exist.
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, RpcError>;

    /// Returns a finalized recent blockhash and its last valid block height.
    async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcError>;

    /// Current block height of the cluster.
    async fn block_height(&self) -> Result<u64, RpcError>;

    /// Recent per-compute-unit prioritization fees paid on transactions
    /// touching the given writable accounts, in micro-lamports.
    async fn recent_prioritization_fees(
        &self,
        writable_accounts: &[Pubkey],
    ) -> Result<Vec<u64>, RpcError>;

    /// Dry-runs a transaction (no signature verification, recent blockhash
    /// replaced, no state mutation) and returns the consumed compute units
    /// when the simulation reports them.
    async fn simulated_units(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Option<u64>, RpcError>;

    /// Submits a transaction with preflight disabled and zero transport
    /// retries; resubmission policy belongs to the caller.
    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, RpcError>;

    /// Looks up a signature's status at confirmed commitment.
    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus, RpcError>;

    /// Fetches the settled transaction for a signature at confirmed
    /// commitment, `None` while it is not yet visible.
    async fn settled_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<VersionedTransaction>, RpcError>;
}

/// HTTP JSON-RPC implementation of [`SolanaRpc`].
pub struct SolanaRpcClient {
    inner: RpcClient,
}

impl std::fmt::Debug for SolanaRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpcClient").finish_non_exhaustive()
    }
}

impl SolanaRpcClient {
    /// Creates a client for the given RPC endpoint URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: RpcClient::new(url.into()),
        }
    }
}

#[async_trait]
impl SolanaRpc for SolanaRpcClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, RpcError> {
        let response = self
            .inner
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await?;
        Ok(response.value)
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
        let (blockhash, last_valid_block_height) = self
            .inner
            .get_latest_blockhash_with_commitment(CommitmentConfig::finalized())
            .await?;
        Ok((blockhash, last_valid_block_height))
    }

    async fn block_height(&self) -> Result<u64, RpcError> {
        Ok(self.inner.get_block_height().await?)
    }

    async fn recent_prioritization_fees(
        &self,
        writable_accounts: &[Pubkey],
    ) -> Result<Vec<u64>, RpcError> {
        let fees = self
            .inner
            .get_recent_prioritization_fees(writable_accounts)
            .await?;
        Ok(fees.into_iter().map(|f| f.prioritization_fee).collect())
    }

    async fn simulated_units(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Option<u64>, RpcError> {
        let config = RpcSimulateTransactionConfig {
            sig_verify: false,
            replace_recent_blockhash: true,
            ..RpcSimulateTransactionConfig::default()
        };
        let response = self
            .inner
            .simulate_transaction_with_config(transaction, config)
            .await?;
        Ok(response.value.units_consumed)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, RpcError> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            max_retries: Some(0),
            ..RpcSendTransactionConfig::default()
        };
        Ok(self
            .inner
            .send_transaction_with_config(transaction, config)
            .await?)
    }

    async fn signature_status(&self, signature: &Signature) -> Result<SignatureStatus, RpcError> {
        let response = self.inner.get_signature_statuses(&[*signature]).await?;
        let Some(Some(status)) = response.value.first().cloned() else {
            return Ok(SignatureStatus::Pending);
        };
        if let Some(err) = status.err {
            return Ok(SignatureStatus::Failed(err.to_string()));
        }
        if status.satisfies_commitment(CommitmentConfig::confirmed()) {
            Ok(SignatureStatus::Confirmed)
        } else {
            Ok(SignatureStatus::Pending)
        }
    }

    async fn settled_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<VersionedTransaction>, RpcError> {
        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Base64),
            commitment: Some(CommitmentConfig::confirmed()),
            max_supported_transaction_version: Some(0),
        };
        match self
            .inner
            .get_transaction_with_config(signature, config)
            .await
        {
            Ok(settled) => settled
                .transaction
                .transaction
                .decode()
                .map(Some)
                .ok_or_else(|| RpcError(format!("transaction {signature} is not decodable"))),
            // The node answers a plain RPC error while the transaction has
            // not propagated to it yet; the caller retries.
            Err(e) if matches!(*e.kind, ClientErrorKind::RpcError(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
