//! The `PaymentRail` capability trait.
//!
//! A payment rail is one settlement pathway: it drafts a transfer for a
//! dataset purchase, drives a signed transfer to finality, and independently
//! validates the settled transfer against the dataset's declared terms.
//! Rails are independent implementations of this trait, not a shared
//! inheritance hierarchy; the service wires in whichever rails it supports
//! at construction time.

use async_trait::async_trait;

use crate::error::PaymentError;
use crate::types::{Dataset, Payment};

/// One settlement pathway for dataset purchases.
#[async_trait]
pub trait PaymentRail: Send + Sync {
    /// Builds an unsigned, fully budgeted draft transfer for `signer` buying
    /// `dataset`, serialized to a transport-safe encoding. Signing is the
    /// client's responsibility.
    ///
    /// # Errors
    ///
    /// Fails without side effects on invalid input, unready token accounts,
    /// or an unpayable dataset.
    async fn build_draft(
        &self,
        dataset: &Dataset,
        dataset_id: &str,
        signer: &str,
    ) -> Result<String, PaymentError>;

    /// Submits a signed, serialized transaction and drives it to a confirmed
    /// commitment, resubmitting the identical bytes on timeout. Returns the
    /// transaction signature.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::ConfirmationFailed`] when the transaction's
    /// validity window expires and [`PaymentError::DeadlineExceeded`] when
    /// the bounded resubmit loop gives up.
    async fn broadcast_and_confirm(&self, signed_transaction: &str)
    -> Result<String, PaymentError>;

    /// Re-derives the payment facts from the settled transaction identified
    /// by `signature` and cross-checks them against the dataset's current
    /// terms, producing a verified [`Payment`].
    ///
    /// # Errors
    ///
    /// Returns the integrity errors of the taxonomy
    /// ([`PaymentError::AmountMismatch`], [`PaymentError::WrongReference`],
    /// [`PaymentError::WrongSeller`]) when the settled transfer does not
    /// match the dataset's declared terms.
    async fn validate_settlement(
        &self,
        signature: &str,
        dataset_id: &str,
    ) -> Result<Payment, PaymentError>;
}
