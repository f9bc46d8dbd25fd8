//! Send/confirm state machine for signed transactions.
//!
//! `Submitted -> Confirmed`, or `Submitted -> TimedOut -> Resubmitted ->
//! ...` until either confirmation, the transaction's block-height validity
//! window closing (`ConfirmationFailed`), or the bounded round ceiling
//! (`DeadlineExceeded`). Resubmission reuses the exact signed bytes, so the
//! chain can only ever finalize one instance of the signature.

use std::time::Duration;

use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;

use payrail::encoding;
use payrail::error::PaymentError;

use crate::rpc::{SignatureStatus, SolanaRpc};

/// Tuning for the send/confirm loop.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// How long one confirmation race lasts before resubmitting.
    pub confirm_timeout: Duration,
    /// Interval between signature status polls inside a race.
    pub status_poll_interval: Duration,
    /// Maximum submit/confirm rounds before giving up.
    pub max_rounds: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: Duration::from_secs(2),
            status_poll_interval: Duration::from_millis(400),
            max_rounds: 150,
        }
    }
}

/// Submits a signed, serialized transaction and drives it to confirmed
/// commitment.
///
/// # Errors
///
/// Returns [`PaymentError::InputInvalid`] if the payload does not decode,
/// [`PaymentError::ConfirmationFailed`] when the validity window closes or
/// the chain reports execution failure, and
/// [`PaymentError::DeadlineExceeded`] when the round ceiling is reached.
pub async fn broadcast_and_confirm<R: SolanaRpc + ?Sized>(
    rpc: &R,
    config: &BroadcastConfig,
    signed_transaction: &str,
) -> Result<Signature, PaymentError> {
    let bytes = encoding::from_base64(signed_transaction)
        .map_err(|e| PaymentError::InputInvalid(format!("transaction encoding: {e}")))?;
    let transaction: VersionedTransaction = bincode::deserialize(&bytes)
        .map_err(|e| PaymentError::InputInvalid(format!("transaction payload: {e}")))?;

    // The window is anchored at submission time; once the chain's block
    // height passes it, the signed bytes can never land.
    let (_blockhash, last_valid_block_height) = rpc.latest_blockhash().await?;

    let signature = rpc.send_transaction(&transaction).await?;
    tracing::info!(%signature, last_valid_block_height, "submitted transaction");

    for round in 1..=config.max_rounds {
        let watch = watch_signature(rpc, &signature, config.status_poll_interval);
        match tokio::time::timeout(config.confirm_timeout, watch).await {
            Ok(outcome) => {
                outcome?;
                tracing::info!(%signature, round, "transaction confirmed");
                return Ok(signature);
            }
            Err(_elapsed) => {
                let height = rpc.block_height().await?;
                if height > last_valid_block_height {
                    return Err(PaymentError::ConfirmationFailed(format!(
                        "block height {height} passed validity window \
                         {last_valid_block_height} for {signature}"
                    )));
                }
                // Identical signed bytes, identical signature; replay-safe
                // while the window is open. A transient send failure here is
                // tolerable because the next race keeps watching the status.
                if let Err(e) = rpc.send_transaction(&transaction).await {
                    tracing::warn!(%signature, round, error = %e, "resubmission failed");
                } else {
                    tracing::debug!(%signature, round, "resubmitted after confirmation timeout");
                }
            }
        }
    }

    Err(PaymentError::DeadlineExceeded(format!(
        "no confirmation for {signature} after {} rounds",
        config.max_rounds
    )))
}

async fn watch_signature<R: SolanaRpc + ?Sized>(
    rpc: &R,
    signature: &Signature,
    poll_interval: Duration,
) -> Result<(), PaymentError> {
    loop {
        match rpc.signature_status(signature).await? {
            SignatureStatus::Confirmed => return Ok(()),
            SignatureStatus::Failed(err) => {
                return Err(PaymentError::ConfirmationFailed(format!(
                    "transaction {signature} failed on-chain: {err}"
                )));
            }
            SignatureStatus::Pending => tokio::time::sleep(poll_interval).await,
        }
    }
}
