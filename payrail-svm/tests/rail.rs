//! End-to-end rail tests against a scripted RPC double: draft assembly,
//! the send/confirm loop, and settled-transfer validation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use solana_account::Account;
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_message::VersionedMessage;
use solana_message::v0::Message as MessageV0;
use solana_message::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::versioned::VersionedTransaction;
use spl_token::instruction::transfer_checked;
use spl_token::solana_program::instruction::AccountMeta;
use spl_token::solana_program::program_option::COption;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account as TokenAccount, AccountState, Mint};

use payrail::catalog::DatasetCatalog;
use payrail::encoding;
use payrail::error::{PaymentError, ReferenceKind};
use payrail::types::Dataset;
use payrail_svm::broadcast::{self, BroadcastConfig};
use payrail_svm::draft::{self, DraftRequest};
use payrail_svm::fees::PriorityLevel;
use payrail_svm::reference;
use payrail_svm::rpc::{RpcError, SignatureStatus, SolanaRpc};
use payrail_svm::validate::{self, ValidateConfig, decode_transfer};

const DATASET_X: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const DATASET_Y: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

#[derive(Default)]
struct MockRpc {
    accounts: Mutex<HashMap<Pubkey, Account>>,
    settled: Mutex<HashMap<Signature, VersionedTransaction>>,
    fees: Vec<u64>,
    units: Option<u64>,
    sends: AtomicUsize,
    status_lookups: AtomicUsize,
    /// Status reads report `Confirmed` once at least this many sends landed.
    confirm_after_sends: usize,
    block_height: AtomicU64,
    last_valid_block_height: u64,
    fail_status: Option<String>,
}

impl MockRpc {
    fn insert_account(&self, address: Pubkey, account: Account) {
        self.accounts.lock().unwrap().insert(address, account);
    }

    fn insert_settled(&self, signature: Signature, transaction: VersionedTransaction) {
        self.settled.lock().unwrap().insert(signature, transaction);
    }
}

#[async_trait]
impl SolanaRpc for MockRpc {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, RpcError> {
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
        Ok((Hash::default(), self.last_valid_block_height))
    }

    async fn block_height(&self) -> Result<u64, RpcError> {
        Ok(self.block_height.load(Ordering::SeqCst))
    }

    async fn recent_prioritization_fees(
        &self,
        _writable_accounts: &[Pubkey],
    ) -> Result<Vec<u64>, RpcError> {
        Ok(self.fees.clone())
    }

    async fn simulated_units(
        &self,
        _transaction: &VersionedTransaction,
    ) -> Result<Option<u64>, RpcError> {
        Ok(self.units)
    }

    async fn send_transaction(
        &self,
        transaction: &VersionedTransaction,
    ) -> Result<Signature, RpcError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        Ok(transaction.signatures.first().copied().unwrap_or_default())
    }

    async fn signature_status(&self, _signature: &Signature) -> Result<SignatureStatus, RpcError> {
        self.status_lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail_status {
            return Ok(SignatureStatus::Failed(err.clone()));
        }
        if self.sends.load(Ordering::SeqCst) >= self.confirm_after_sends {
            Ok(SignatureStatus::Confirmed)
        } else {
            Ok(SignatureStatus::Pending)
        }
    }

    async fn settled_transaction(
        &self,
        signature: &Signature,
    ) -> Result<Option<VersionedTransaction>, RpcError> {
        Ok(self.settled.lock().unwrap().get(signature).cloned())
    }
}

struct StaticCatalog(Dataset);

#[async_trait]
impl DatasetCatalog for StaticCatalog {
    async fn dataset(&self, _dataset_id: &str) -> Result<Dataset, PaymentError> {
        Ok(self.0.clone())
    }
}

fn spl_account(data: Vec<u8>) -> Account {
    Account {
        lamports: 1_000_000,
        data,
        owner: spl_token::ID,
        executable: false,
        rent_epoch: 0,
    }
}

fn packed_mint(decimals: u8) -> Account {
    let mint = Mint {
        mint_authority: COption::None,
        supply: 1_000_000_000,
        decimals,
        is_initialized: true,
        freeze_authority: COption::None,
    };
    let mut data = vec![0u8; Mint::LEN];
    Mint::pack(mint, &mut data).unwrap();
    spl_account(data)
}

fn packed_token_account(mint: Pubkey, owner: Pubkey, amount: u64) -> Account {
    let token_account = TokenAccount {
        mint,
        owner,
        amount,
        delegate: COption::None,
        state: AccountState::Initialized,
        is_native: COption::None,
        delegated_amount: 0,
        close_authority: COption::None,
    };
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(token_account, &mut data).unwrap();
    spl_account(data)
}

struct Fixture {
    rpc: MockRpc,
    mint: Pubkey,
    buyer: Pubkey,
    seller: Pubkey,
    buyer_ata: Pubkey,
    seller_ata: Pubkey,
}

fn fixture() -> Fixture {
    let mint = Pubkey::new_unique();
    let buyer = Pubkey::new_unique();
    let seller = Pubkey::new_unique();
    let buyer_ata = reference::associated_token_address(&buyer, &mint);
    let seller_ata = reference::associated_token_address(&seller, &mint);

    let rpc = MockRpc {
        fees: vec![100, 200, 300],
        units: Some(12_345),
        confirm_after_sends: 1,
        last_valid_block_height: 1_000,
        ..MockRpc::default()
    };
    rpc.insert_account(mint, packed_mint(6));
    rpc.insert_account(buyer_ata, packed_token_account(mint, buyer, 100_000_000));
    rpc.insert_account(seller_ata, packed_token_account(mint, seller, 0));

    Fixture {
        rpc,
        mint,
        buyer,
        seller,
        buyer_ata,
        seller_ata,
    }
}

fn dataset(owner: &Pubkey, price: &str) -> Dataset {
    Dataset {
        name: "tides".into(),
        owner: owner.to_string(),
        price: Some(price.into()),
        timeseries_ids: vec!["ts1".into(), "ts2".into(), "ts3".into()],
        available: true,
        owns_all_timeseries: true,
        desc: None,
        view_ids: None,
    }
}

/// Builds a settled-looking transfer the way the assembler would, but with
/// an arbitrary raw amount and reference pair.
fn settled_transfer(
    fx: &Fixture,
    amount: u64,
    dataset_id: &str,
) -> VersionedTransaction {
    let mut transfer = transfer_checked(
        &spl_token::ID,
        &fx.buyer_ata,
        &fx.mint,
        &fx.seller_ata,
        &fx.buyer,
        &[],
        amount,
        6,
    )
    .unwrap();
    transfer.accounts.push(AccountMeta::new_readonly(
        reference::dataset_reference(dataset_id).unwrap(),
        false,
    ));
    transfer
        .accounts
        .push(AccountMeta::new_readonly(*reference::APP_REFERENCE, false));

    let instructions = vec![
        ComputeBudgetInstruction::set_compute_unit_limit(20_000),
        ComputeBudgetInstruction::set_compute_unit_price(100),
        transfer,
    ];
    let message = MessageV0::try_compile(&fx.buyer, &instructions, &[], Hash::default()).unwrap();
    let num_required = message.header.num_required_signatures as usize;
    VersionedTransaction {
        signatures: vec![Signature::from([7u8; 64]); num_required],
        message: VersionedMessage::V0(message),
    }
}

fn validate_config() -> ValidateConfig {
    ValidateConfig {
        fetch_retry_delay: Duration::from_millis(5),
        max_fetch_attempts: 3,
    }
}

#[tokio::test]
async fn draft_round_trips_through_the_validator_decoder() {
    let fx = fixture();
    let draft_b64 = draft::assemble(
        &fx.rpc,
        &fx.mint,
        PriorityLevel::High,
        DraftRequest {
            payer: fx.buyer,
            payee: fx.seller,
            price: "2.50",
            dataset_id: DATASET_X,
        },
    )
    .await
    .unwrap();

    let bytes = encoding::from_base64(&draft_b64).unwrap();
    let transaction: VersionedTransaction = bincode::deserialize(&bytes).unwrap();

    // Budget instructions precede the transfer: limit (discriminator 2),
    // then price (discriminator 3).
    let instructions = transaction.message.instructions();
    assert_eq!(instructions.len(), 3);
    assert_eq!(instructions[0].data.first(), Some(&2));
    assert_eq!(instructions[1].data.first(), Some(&3));

    let transfer = decode_transfer(&transaction).unwrap();
    assert_eq!(transfer.amount, 2_500_000);
    assert_eq!(transfer.source, fx.buyer_ata);
    assert_eq!(transfer.destination, fx.seller_ata);
    assert_eq!(transfer.mint, fx.mint);
    assert_eq!(transfer.authority, fx.buyer);
    assert_eq!(
        transfer.dataset_reference,
        reference::dataset_reference(DATASET_X).unwrap()
    );
    assert_eq!(transfer.app_reference, *reference::APP_REFERENCE);
}

#[tokio::test]
async fn draft_uses_simulated_units_and_oracle_fee() {
    let fx = fixture();
    let draft_b64 = draft::assemble(
        &fx.rpc,
        &fx.mint,
        PriorityLevel::High,
        DraftRequest {
            payer: fx.buyer,
            payee: fx.seller,
            price: "2.50",
            dataset_id: DATASET_X,
        },
    )
    .await
    .unwrap();

    let bytes = encoding::from_base64(&draft_b64).unwrap();
    let transaction: VersionedTransaction = bincode::deserialize(&bytes).unwrap();
    let instructions = transaction.message.instructions();

    let limit = u32::from_le_bytes(instructions[0].data[1..5].try_into().unwrap());
    assert_eq!(limit, 12_345);
    let price = u64::from_le_bytes(instructions[1].data[1..9].try_into().unwrap());
    assert_eq!(price, 200);
}

#[tokio::test]
async fn draft_fails_for_insufficient_balance() {
    let fx = fixture();
    fx.rpc
        .insert_account(fx.buyer_ata, packed_token_account(fx.mint, fx.buyer, 1));

    let result = draft::assemble(
        &fx.rpc,
        &fx.mint,
        PriorityLevel::High,
        DraftRequest {
            payer: fx.buyer,
            payee: fx.seller,
            price: "2.50",
            dataset_id: DATASET_X,
        },
    )
    .await;
    assert!(matches!(
        result,
        Err(PaymentError::InsufficientFunds {
            required: 2_500_000,
            available: 1
        })
    ));
}

#[tokio::test]
async fn draft_fails_for_missing_token_account() {
    let fx = fixture();
    fx.rpc.accounts.lock().unwrap().remove(&fx.seller_ata);

    let result = draft::assemble(
        &fx.rpc,
        &fx.mint,
        PriorityLevel::High,
        DraftRequest {
            payer: fx.buyer,
            payee: fx.seller,
            price: "2.50",
            dataset_id: DATASET_X,
        },
    )
    .await;
    assert!(matches!(result, Err(PaymentError::AccountNotReady(_))));
}

#[tokio::test]
async fn broadcast_confirms_after_one_resubmission() {
    let fx = fixture();
    // First race times out (confirmation requires two sends), second race
    // sees the resubmitted transaction confirmed.
    let rpc = MockRpc {
        confirm_after_sends: 2,
        last_valid_block_height: 1_000,
        ..MockRpc::default()
    };
    let transaction = settled_transfer(&fx, 2_500_000, DATASET_X);
    let expected_signature = transaction.signatures[0];
    let payload = encoding::to_base64(bincode::serialize(&transaction).unwrap());

    let config = BroadcastConfig {
        confirm_timeout: Duration::from_millis(50),
        status_poll_interval: Duration::from_millis(10),
        max_rounds: 5,
    };
    let signature = broadcast::broadcast_and_confirm(&rpc, &config, &payload)
        .await
        .unwrap();

    assert_eq!(signature, expected_signature);
    assert_eq!(rpc.sends.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn broadcast_fails_when_validity_window_closes() {
    let fx = fixture();
    let rpc = MockRpc {
        confirm_after_sends: usize::MAX,
        last_valid_block_height: 100,
        ..MockRpc::default()
    };
    rpc.block_height.store(101, Ordering::SeqCst);
    let transaction = settled_transfer(&fx, 2_500_000, DATASET_X);
    let payload = encoding::to_base64(bincode::serialize(&transaction).unwrap());

    let config = BroadcastConfig {
        confirm_timeout: Duration::from_millis(30),
        status_poll_interval: Duration::from_millis(10),
        max_rounds: 5,
    };
    let result = broadcast::broadcast_and_confirm(&rpc, &config, &payload).await;
    assert!(matches!(result, Err(PaymentError::ConfirmationFailed(_))));
    // One initial submission, no resubmission after the window closed.
    assert_eq!(rpc.sends.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn broadcast_surfaces_on_chain_failure() {
    let fx = fixture();
    let rpc = MockRpc {
        confirm_after_sends: 1,
        last_valid_block_height: 1_000,
        fail_status: Some("custom program error".into()),
        ..MockRpc::default()
    };
    let transaction = settled_transfer(&fx, 2_500_000, DATASET_X);
    let payload = encoding::to_base64(bincode::serialize(&transaction).unwrap());

    let config = BroadcastConfig {
        confirm_timeout: Duration::from_millis(50),
        status_poll_interval: Duration::from_millis(10),
        max_rounds: 5,
    };
    let result = broadcast::broadcast_and_confirm(&rpc, &config, &payload).await;
    assert!(matches!(result, Err(PaymentError::ConfirmationFailed(_))));
}

#[tokio::test]
async fn broadcast_rejects_garbage_payloads() {
    let rpc = MockRpc::default();
    let config = BroadcastConfig::default();
    let result = broadcast::broadcast_and_confirm(&rpc, &config, "@@not-base64@@").await;
    assert!(matches!(result, Err(PaymentError::InputInvalid(_))));
}

#[tokio::test]
async fn validator_accepts_exact_amount() {
    let fx = fixture();
    let transaction = settled_transfer(&fx, 2_500_000, DATASET_X);
    let signature = transaction.signatures[0];
    fx.rpc.insert_settled(signature, transaction);

    let catalog = StaticCatalog(dataset(&fx.seller, "2.50"));
    let payment = validate::validate_transfer(
        &fx.rpc,
        &catalog,
        &validate_config(),
        &signature.to_string(),
        DATASET_X,
    )
    .await
    .unwrap();

    assert_eq!(payment.amount, "2500000");
    assert_eq!(payment.signer, fx.buyer.to_string());
    assert_eq!(payment.seller, fx.seller.to_string());
    assert_eq!(payment.currency, fx.mint.to_string());
    assert_eq!(payment.dataset_name, "tides");
}

#[tokio::test]
async fn validator_rejects_off_by_one_amount() {
    let fx = fixture();
    let transaction = settled_transfer(&fx, 2_499_999, DATASET_X);
    let signature = transaction.signatures[0];
    fx.rpc.insert_settled(signature, transaction);

    let catalog = StaticCatalog(dataset(&fx.seller, "2.50"));
    let result = validate::validate_transfer(
        &fx.rpc,
        &catalog,
        &validate_config(),
        &signature.to_string(),
        DATASET_X,
    )
    .await;

    assert!(matches!(
        result,
        Err(PaymentError::AmountMismatch {
            expected: 2_500_000,
            actual: 2_499_999
        })
    ));
}

#[tokio::test]
async fn validator_rejects_reference_for_another_dataset() {
    let fx = fixture();
    let transaction = settled_transfer(&fx, 2_500_000, DATASET_X);
    let signature = transaction.signatures[0];
    fx.rpc.insert_settled(signature, transaction);

    let catalog = StaticCatalog(dataset(&fx.seller, "2.50"));
    let result = validate::validate_transfer(
        &fx.rpc,
        &catalog,
        &validate_config(),
        &signature.to_string(),
        DATASET_Y,
    )
    .await;

    assert!(matches!(
        result,
        Err(PaymentError::WrongReference {
            kind: ReferenceKind::Dataset,
            ..
        })
    ));
}

#[tokio::test]
async fn validator_rejects_wrong_seller() {
    let fx = fixture();
    let transaction = settled_transfer(&fx, 2_500_000, DATASET_X);
    let signature = transaction.signatures[0];
    fx.rpc.insert_settled(signature, transaction);

    // Dataset declares a different owner than the destination's wallet.
    let impostor = Pubkey::new_unique();
    let catalog = StaticCatalog(dataset(&impostor, "2.50"));
    let result = validate::validate_transfer(
        &fx.rpc,
        &catalog,
        &validate_config(),
        &signature.to_string(),
        DATASET_X,
    )
    .await;

    assert!(matches!(result, Err(PaymentError::WrongSeller { .. })));
}

#[tokio::test]
async fn validator_rejects_free_dataset() {
    let fx = fixture();
    let transaction = settled_transfer(&fx, 2_500_000, DATASET_X);
    let signature = transaction.signatures[0];
    fx.rpc.insert_settled(signature, transaction);

    let mut free = dataset(&fx.seller, "2.50");
    free.price = None;
    let catalog = StaticCatalog(free);
    let result = validate::validate_transfer(
        &fx.rpc,
        &catalog,
        &validate_config(),
        &signature.to_string(),
        DATASET_X,
    )
    .await;

    assert!(matches!(result, Err(PaymentError::DatasetNotPayable(_))));
}

#[tokio::test]
async fn validator_gives_up_after_fetch_ceiling() {
    let fx = fixture();
    let catalog = StaticCatalog(dataset(&fx.seller, "2.50"));
    let missing = Signature::from([9u8; 64]);

    let result = validate::validate_transfer(
        &fx.rpc,
        &catalog,
        &validate_config(),
        &missing.to_string(),
        DATASET_X,
    )
    .await;

    assert!(matches!(result, Err(PaymentError::DeadlineExceeded(_))));
}
