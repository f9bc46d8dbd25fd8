//! Independent validation of settled transfers.
//!
//! The client only supplies a signature and a dataset id. Everything used
//! for authorization - amount, parties, dataset and app bindings - is
//! re-derived here from the settled transaction and the catalog's current
//! state, never trusted from request parameters. The integrity failures
//! (`AmountMismatch`, `WrongReference`, `WrongSeller`) surface after money
//! has moved, so they are logged with full transaction context before being
//! returned; access is withheld and reconciliation is out-of-band.

use std::time::Duration;

use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::instruction::TokenInstruction;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account as TokenAccount, Mint};

use payrail::amount::price_to_base_units;
use payrail::catalog::DatasetCatalog;
use payrail::error::{PaymentError, ReferenceKind};
use payrail::timestamp::UnixTimestamp;
use payrail::types::Payment;

use crate::reference;
use crate::rpc::SolanaRpc;

/// Tuning for the settled-transaction fetch loop.
#[derive(Debug, Clone, Copy)]
pub struct ValidateConfig {
    /// Delay between fetch attempts while the transaction propagates.
    pub fetch_retry_delay: Duration,
    /// Attempt ceiling before reporting `DeadlineExceeded`.
    pub max_fetch_attempts: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            fetch_retry_delay: Duration::from_secs(1),
            max_fetch_attempts: 30,
        }
    }
}

/// The transfer facts recovered from a settled transaction, before any
/// cross-checking against the dataset.
#[derive(Debug, Clone, Copy)]
pub struct DecodedTransfer {
    /// Raw transferred amount in token base units.
    pub amount: u64,
    /// Source token sub-account.
    pub source: Pubkey,
    /// Token mint.
    pub mint: Pubkey,
    /// Destination token sub-account.
    pub destination: Pubkey,
    /// Transfer authority (the buyer's wallet).
    pub authority: Pubkey,
    /// Dataset reference tag found on the instruction.
    pub dataset_reference: Pubkey,
    /// Application reference tag found on the instruction.
    pub app_reference: Pubkey,
}

/// Recovers the transfer facts from a settled transaction.
///
/// By construction the transfer is the last compiled instruction (budget
/// instructions precede it) and the two reference tags are its trailing
/// accounts, so no ordering assumption beyond "last instruction" is needed.
///
/// # Errors
///
/// Returns [`PaymentError::InputInvalid`] if the last instruction is not a
/// checked SPL Token transfer carrying both reference tags.
pub fn decode_transfer(transaction: &VersionedTransaction) -> Result<DecodedTransfer, PaymentError> {
    let message = &transaction.message;
    let transfer = message
        .instructions()
        .last()
        .ok_or_else(|| PaymentError::InputInvalid("transaction has no instructions".into()))?;

    let keys = message.static_account_keys();
    if *transfer.program_id(keys) != spl_token::ID {
        return Err(PaymentError::InputInvalid(
            "last instruction is not an SPL Token instruction".into(),
        ));
    }

    let TokenInstruction::TransferChecked { amount, .. } =
        TokenInstruction::unpack(&transfer.data)
            .map_err(|e| PaymentError::InputInvalid(format!("transfer payload: {e}")))?
    else {
        return Err(PaymentError::InputInvalid(
            "last instruction is not a checked transfer".into(),
        ));
    };

    let account_at = |position: usize| -> Result<Pubkey, PaymentError> {
        transfer
            .accounts
            .get(position)
            .and_then(|index| keys.get(*index as usize))
            .copied()
            .ok_or_else(|| {
                PaymentError::InputInvalid(format!(
                    "transfer instruction missing account at position {position}"
                ))
            })
    };

    Ok(DecodedTransfer {
        amount,
        source: account_at(0)?,
        mint: account_at(1)?,
        destination: account_at(2)?,
        authority: account_at(3)?,
        dataset_reference: account_at(4)?,
        app_reference: account_at(5)?,
    })
}

/// Validates the settled transaction for `signature` as payment for
/// `dataset_id`, producing a verified [`Payment`].
///
/// # Errors
///
/// Returns the integrity errors of the taxonomy when the settled transfer
/// does not match the dataset's current terms, and
/// [`PaymentError::DeadlineExceeded`] if the transaction never becomes
/// visible within the fetch ceiling.
pub async fn validate_transfer<R, C>(
    rpc: &R,
    catalog: &C,
    config: &ValidateConfig,
    signature: &str,
    dataset_id: &str,
) -> Result<Payment, PaymentError>
where
    R: SolanaRpc + ?Sized,
    C: DatasetCatalog + ?Sized,
{
    let parsed_signature: Signature = signature
        .parse()
        .map_err(|_| PaymentError::InputInvalid(format!("invalid signature {signature:?}")))?;

    let transaction = fetch_settled(rpc, config, &parsed_signature).await?;
    let transfer = decode_transfer(&transaction)?;

    // Fresh read; price and owner may have changed since the draft.
    let dataset = catalog.dataset(dataset_id).await?;
    let price = dataset
        .price
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| PaymentError::DatasetNotPayable(dataset_id.to_owned()))?;

    let expected_dataset_ref = reference::dataset_reference(dataset_id)?;
    if transfer.dataset_reference != expected_dataset_ref {
        let err = PaymentError::WrongReference {
            kind: ReferenceKind::Dataset,
            expected: expected_dataset_ref.to_string(),
            found: transfer.dataset_reference.to_string(),
        };
        log_integrity_failure(signature, dataset_id, &transfer, &err);
        return Err(err);
    }
    let expected_app_ref = *reference::APP_REFERENCE;
    if transfer.app_reference != expected_app_ref {
        let err = PaymentError::WrongReference {
            kind: ReferenceKind::App,
            expected: expected_app_ref.to_string(),
            found: transfer.app_reference.to_string(),
        };
        log_integrity_failure(signature, dataset_id, &transfer, &err);
        return Err(err);
    }

    // Token sub-accounts are owned by wallets distinct from their own
    // addresses; resolve the owners to get the buyer and seller identities.
    let (source_account, destination_account, mint_account) = tokio::join!(
        fetch_token_account(rpc, &transfer.source),
        fetch_token_account(rpc, &transfer.destination),
        fetch_mint(rpc, &transfer.mint),
    );
    let signer = source_account?.owner;
    let seller = destination_account?.owner;
    let mint = mint_account?;

    let expected_amount = price_to_base_units(price, mint.decimals)
        .map_err(|e| PaymentError::DatasetNotPayable(format!("{dataset_id}: {e}")))?;
    if transfer.amount != expected_amount {
        let err = PaymentError::AmountMismatch {
            expected: expected_amount,
            actual: transfer.amount,
        };
        log_integrity_failure(signature, dataset_id, &transfer, &err);
        return Err(err);
    }

    // The funds must land in a sub-account owned by the dataset's declared
    // owner; anything else is a payment to the wrong party.
    if seller.to_string() != dataset.owner {
        let err = PaymentError::WrongSeller {
            expected: dataset.owner.clone(),
            found: seller.to_string(),
        };
        log_integrity_failure(signature, dataset_id, &transfer, &err);
        return Err(err);
    }

    Ok(Payment {
        signature: parsed_signature.to_string(),
        dataset_id: dataset_id.to_owned(),
        dataset_name: dataset.name,
        signer: signer.to_string(),
        seller: seller.to_string(),
        currency: transfer.mint.to_string(),
        amount: transfer.amount.to_string(),
        timestamp: UnixTimestamp::now(),
    })
}

async fn fetch_settled<R: SolanaRpc + ?Sized>(
    rpc: &R,
    config: &ValidateConfig,
    signature: &Signature,
) -> Result<VersionedTransaction, PaymentError> {
    let mut attempts = 0;
    loop {
        if let Some(transaction) = rpc.settled_transaction(signature).await? {
            return Ok(transaction);
        }
        attempts += 1;
        if attempts >= config.max_fetch_attempts {
            return Err(PaymentError::DeadlineExceeded(format!(
                "transaction {signature} not visible after {attempts} fetch attempts"
            )));
        }
        // Propagation lag is expected, not an error.
        tokio::time::sleep(config.fetch_retry_delay).await;
    }
}

async fn fetch_token_account<R: SolanaRpc + ?Sized>(
    rpc: &R,
    address: &Pubkey,
) -> Result<TokenAccount, PaymentError> {
    let account = rpc.get_account(address).await?.ok_or_else(|| {
        PaymentError::AccountNotReady(format!("token account {address} not found"))
    })?;
    TokenAccount::unpack(&account.data)
        .map_err(|e| PaymentError::AccountNotReady(format!("token account {address}: {e}")))
}

async fn fetch_mint<R: SolanaRpc + ?Sized>(
    rpc: &R,
    address: &Pubkey,
) -> Result<Mint, PaymentError> {
    let account = rpc
        .get_account(address)
        .await?
        .ok_or_else(|| PaymentError::AccountNotReady(format!("mint {address} not found")))?;
    Mint::unpack(&account.data)
        .map_err(|e| PaymentError::AccountNotReady(format!("mint {address}: {e}")))
}

fn log_integrity_failure(
    signature: &str,
    dataset_id: &str,
    transfer: &DecodedTransfer,
    err: &PaymentError,
) {
    tracing::error!(
        signature,
        dataset_id,
        amount = transfer.amount,
        source = %transfer.source,
        mint = %transfer.mint,
        destination = %transfer.destination,
        authority = %transfer.authority,
        dataset_reference = %transfer.dataset_reference,
        app_reference = %transfer.app_reference,
        error = %err,
        "settled transfer failed validation; access withheld, reconcile out-of-band"
    );
}
