//! Unsigned transfer transaction assembly.
//!
//! Builds the checked SPL Token transfer with its two trailing reference
//! tags, prepends the compute budget instructions, and serializes the
//! compiled transaction for the client to sign. The instruction order is a
//! contract with the validator: budget instructions first, the transfer
//! last, reference tags as trailing accounts on the transfer itself.

use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_message::VersionedMessage;
use solana_message::v0::Message as MessageV0;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::instruction::transfer_checked;
use spl_token::solana_program::instruction::AccountMeta;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account as TokenAccount, Mint};

use payrail::amount::price_to_base_units;
use payrail::encoding;
use payrail::error::PaymentError;

use crate::fees::{self, PriorityLevel};
use crate::reference;
use crate::rpc::SolanaRpc;

/// Inputs for one draft transfer.
#[derive(Debug, Clone, Copy)]
pub struct DraftRequest<'a> {
    /// The buyer's wallet; pays the transfer and the fees.
    pub payer: Pubkey,
    /// The seller's wallet, per the dataset's declared owner.
    pub payee: Pubkey,
    /// Dataset price in human units of the payment token.
    pub price: &'a str,
    /// Hex identifier of the dataset being purchased.
    pub dataset_id: &'a str,
}

/// Assembles and serializes an unsigned draft transfer.
///
/// Returns the base64 encoding of the compiled transaction. Never signs.
///
/// # Errors
///
/// Fails with [`PaymentError::AccountNotReady`] when a token sub-account is
/// missing, uninitialized, or frozen, [`PaymentError::InsufficientFunds`]
/// when the payer balance cannot cover the price, and
/// [`PaymentError::InputInvalid`] on malformed identifiers.
pub async fn assemble<R: SolanaRpc + ?Sized>(
    rpc: &R,
    mint_address: &Pubkey,
    level: PriorityLevel,
    request: DraftRequest<'_>,
) -> Result<String, PaymentError> {
    let mint = fetch_mint(rpc, mint_address).await?;

    let amount = price_to_base_units(request.price, mint.decimals)
        .map_err(|e| PaymentError::DatasetNotPayable(format!("{}: {e}", request.dataset_id)))?;

    let source = reference::associated_token_address(&request.payer, mint_address);
    let destination = reference::associated_token_address(&request.payee, mint_address);
    let (payer_account, payee_account) = tokio::join!(
        fetch_token_account(rpc, &source, "payer"),
        fetch_token_account(rpc, &destination, "payee"),
    );
    let payer_account = payer_account?;
    payee_account?;

    if payer_account.amount < amount {
        return Err(PaymentError::InsufficientFunds {
            required: amount,
            available: payer_account.amount,
        });
    }

    let mut transfer = transfer_checked(
        &spl_token::ID,
        &source,
        mint_address,
        &destination,
        &request.payer,
        &[],
        amount,
        mint.decimals,
    )
    .map_err(|e| PaymentError::InputInvalid(format!("transfer instruction: {e}")))?;

    // Trailing read-only tags; the validator recovers the dataset and app
    // bindings from these two accounts.
    let dataset_ref = reference::dataset_reference(request.dataset_id)?;
    transfer
        .accounts
        .push(AccountMeta::new_readonly(dataset_ref, false));
    transfer
        .accounts
        .push(AccountMeta::new_readonly(*reference::APP_REFERENCE, false));

    let budget = fees::estimate(rpc, &request.payer, std::slice::from_ref(&transfer), level).await;

    let instructions = vec![
        ComputeBudgetInstruction::set_compute_unit_limit(budget.compute_unit_limit),
        ComputeBudgetInstruction::set_compute_unit_price(budget.priority_fee),
        transfer,
    ];

    let (recent_blockhash, _last_valid_block_height) = rpc.latest_blockhash().await?;
    let message = MessageV0::try_compile(&request.payer, &instructions, &[], recent_blockhash)
        .map_err(|e| PaymentError::InputInvalid(format!("message compile: {e:?}")))?;
    let num_required = message.header.num_required_signatures as usize;
    let transaction = VersionedTransaction {
        signatures: vec![Signature::default(); num_required],
        message: VersionedMessage::V0(message),
    };

    let bytes = bincode::serialize(&transaction)
        .map_err(|e| PaymentError::InputInvalid(format!("serialize draft: {e}")))?;

    tracing::debug!(
        payer = %request.payer,
        payee = %request.payee,
        amount,
        compute_unit_limit = budget.compute_unit_limit,
        priority_fee = budget.priority_fee,
        "assembled draft transfer"
    );

    Ok(encoding::to_base64(bytes))
}

async fn fetch_mint<R: SolanaRpc + ?Sized>(
    rpc: &R,
    mint_address: &Pubkey,
) -> Result<Mint, PaymentError> {
    let account = rpc
        .get_account(mint_address)
        .await?
        .ok_or_else(|| PaymentError::AccountNotReady(format!("mint {mint_address} not found")))?;
    Mint::unpack(&account.data)
        .map_err(|e| PaymentError::AccountNotReady(format!("mint {mint_address}: {e}")))
}

async fn fetch_token_account<R: SolanaRpc + ?Sized>(
    rpc: &R,
    address: &Pubkey,
    role: &str,
) -> Result<TokenAccount, PaymentError> {
    let account = rpc.get_account(address).await?.ok_or_else(|| {
        PaymentError::AccountNotReady(format!("{role} token account {address} does not exist"))
    })?;
    let token_account = TokenAccount::unpack(&account.data).map_err(|e| {
        PaymentError::AccountNotReady(format!("{role} token account {address}: {e}"))
    })?;
    if token_account.is_frozen() {
        return Err(PaymentError::AccountNotReady(format!(
            "{role} token account {address} is frozen"
        )));
    }
    Ok(token_account)
}
