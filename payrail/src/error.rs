//! The payment error taxonomy.
//!
//! Every failure the payment pipeline can surface is a variant here. The
//! variants split into three propagation classes:
//!
//! - **Pre-broadcast** ([`PaymentError::InputInvalid`],
//!   [`PaymentError::AccountNotReady`], [`PaymentError::InsufficientFunds`],
//!   [`PaymentError::DatasetNotPayable`]) - detected before any money moves,
//!   returned to the caller with no side effects.
//! - **Post-settlement integrity** ([`PaymentError::AmountMismatch`],
//!   [`PaymentError::WrongReference`], [`PaymentError::WrongSeller`]) - the
//!   transfer already settled on-chain; access is withheld and the failure is
//!   logged with full transaction context for out-of-band reconciliation.
//! - **Infrastructure** (confirmation, publish, ledger, transport) - retriable
//!   or operator-facing conditions.

/// Errors surfaced by the payment pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// A request parameter could not be parsed (bad address, bad dataset id).
    #[error("invalid input: {0}")]
    InputInvalid(String),

    /// A token sub-account is missing, uninitialized, or frozen.
    #[error("token account not ready: {0}")]
    AccountNotReady(String),

    /// The payer's token balance does not cover the dataset price.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Base units the transfer requires.
        required: u64,
        /// Base units the payer holds.
        available: u64,
    },

    /// The dataset is free, unavailable, or could not be fetched.
    #[error("dataset {0} is not payable")]
    DatasetNotPayable(String),

    /// The settled transfer amount differs from the dataset price.
    #[error("transferred amount {actual} does not match expected {expected}")]
    AmountMismatch {
        /// Base units the dataset price converts to.
        expected: u64,
        /// Base units actually transferred on-chain.
        actual: u64,
    },

    /// A reference tag on the settled transfer does not match the one
    /// re-derived for the requested dataset or for this application.
    #[error("wrong {kind} reference: expected {expected}, found {found}")]
    WrongReference {
        /// Which tag mismatched (`dataset` or `app`).
        kind: ReferenceKind,
        /// The independently re-derived address.
        expected: String,
        /// The address found on the settled transfer.
        found: String,
    },

    /// The settled transfer pays an account not owned by the dataset owner.
    #[error("wrong seller: dataset owner is {expected}, funds went to {found}")]
    WrongSeller {
        /// The dataset's declared owner.
        expected: String,
        /// The wallet that owns the destination token account.
        found: String,
    },

    /// The transaction's block-height validity window expired, or the chain
    /// reported the transaction as failed, before confirmation.
    #[error("transaction confirmation failed: {0}")]
    ConfirmationFailed(String),

    /// A bounded retry loop exhausted its deadline or attempt ceiling.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// One or more permission grant publishes failed; no grants are
    /// guaranteed and the transaction must not be recorded.
    #[error("permission publish failed for {}: {reason}", .failed_units.join(", "))]
    Publish {
        /// Resource unit ids whose publish failed.
        failed_units: Vec<String>,
        /// First underlying failure.
        reason: String,
    },

    /// A ledger row for this signature already exists. Callers treat this as
    /// "already processed", not as a failure.
    #[error("transaction {0} already recorded")]
    LedgerConflict(String),

    /// Ledger storage failure other than a duplicate key.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Settlement network transport or RPC failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// External message store transport failure.
    #[error("message store error: {0}")]
    Store(String),
}

/// Which deterministic reference tag failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// The tag binding the transfer to a dataset.
    Dataset,
    /// The tag binding the transfer to this application.
    App,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dataset => write!(f, "dataset"),
            Self::App => write!(f, "app"),
        }
    }
}

impl PaymentError {
    /// Whether the failure was detected before any transaction was broadcast
    /// and is correctable by the caller.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InputInvalid(_)
                | Self::AccountNotReady(_)
                | Self::InsufficientFunds { .. }
                | Self::DatasetNotPayable(_)
        )
    }

    /// Whether money has already moved on-chain when this error surfaces.
    ///
    /// These failures cannot be rolled back; they withhold access and demand
    /// out-of-band reconciliation.
    #[must_use]
    pub const fn is_post_settlement(&self) -> bool {
        matches!(
            self,
            Self::AmountMismatch { .. } | Self::WrongReference { .. } | Self::WrongSeller { .. }
        )
    }

    /// Stable machine-readable kind, used in the HTTP error envelope.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "input_invalid",
            Self::AccountNotReady(_) => "account_not_ready",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::DatasetNotPayable(_) => "dataset_not_payable",
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::WrongReference { .. } => "wrong_reference",
            Self::WrongSeller { .. } => "wrong_seller",
            Self::ConfirmationFailed(_) => "confirmation_failed",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::Publish { .. } => "publish_error",
            Self::LedgerConflict(_) => "ledger_conflict",
            Self::Ledger(_) => "ledger_error",
            Self::Rpc(_) => "rpc_error",
            Self::Store(_) => "store_error",
        }
    }
}
