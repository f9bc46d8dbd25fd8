//! Axum route handlers.
//!
//! Thin routing over the payment pipeline. One `sendTransaction` call
//! drives one sequential pipeline: broadcast -> confirm -> validate ->
//! grant -> record, and returns a single success or error envelope; no
//! intermediate state is exposed.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use payrail::catalog::{DatasetCatalog, PermissionStore};
use payrail::error::PaymentError;
use payrail::rail::PaymentRail;
use payrail::types::TransactionRecord;

use crate::error::ApiError;
use crate::grants;
use crate::ledger::Ledger;

/// Shared application state, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    /// The settlement pathway purchases ride on.
    pub rail: Arc<dyn PaymentRail>,
    /// Dataset catalog reads.
    pub catalog: Arc<dyn DatasetCatalog>,
    /// Permission grant publishes.
    pub permissions: Arc<dyn PermissionStore>,
    /// The sale ledger.
    pub ledger: Ledger,
    /// Decimals used to render ledger amounts back to human units.
    pub display_decimals: u8,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("display_decimals", &self.display_decimals)
            .finish_non_exhaustive()
    }
}

/// Query parameters for `createTransaction`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransactionParams {
    /// Dataset being purchased.
    pub dataset_id: String,
    /// Buyer wallet address.
    pub signer: String,
}

/// Response body carrying the unsigned draft.
#[derive(Debug, Serialize)]
pub struct CreateTransactionResponse {
    /// Base64 serialized unsigned draft.
    pub transaction: String,
}

/// Request body for `sendTransaction`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendTransactionBody {
    /// Dataset the payment is for.
    pub dataset_id: String,
    /// Base64 serialized signed transaction.
    pub transaction: String,
}

/// Response body for a settled purchase.
#[derive(Debug, Serialize)]
pub struct SendTransactionResponse {
    /// Always `"success"`; failures use the error envelope.
    pub message: String,
    /// Signature of the settled payment transaction.
    pub signature: String,
}

/// Query parameters for `getTransactions`.
#[derive(Debug, Deserialize)]
pub struct GetTransactionsParams {
    /// Wallet to report on, as buyer and as seller.
    pub address: String,
}

/// Per-dataset sales aggregate.
#[derive(Debug, Serialize)]
pub struct DatasetSales {
    /// Number of completed sales.
    pub sales: u64,
    /// Summed proceeds in human units.
    pub profit: String,
}

/// History and aggregates for one wallet.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsReport {
    /// Summed sale proceeds in human units.
    pub total_profit: String,
    /// Number of completed sales.
    pub total_sales: usize,
    /// Rows where the wallet is the buyer, amounts in human units.
    pub purchases: Vec<TransactionRecord>,
    /// Rows where the wallet is the seller, amounts in human units.
    pub sales: Vec<TransactionRecord>,
    /// Sales grouped by dataset.
    pub dataset_sales: HashMap<String, DatasetSales>,
}

/// `GET /solana/createTransaction` - builds an unsigned draft for a
/// purchase.
///
/// # Errors
///
/// 400 for a free or missing dataset (no network submission is attempted),
/// 404 for an unknown signer account.
pub async fn create_transaction(
    State(state): State<AppState>,
    Query(params): Query<CreateTransactionParams>,
) -> Result<Json<CreateTransactionResponse>, ApiError> {
    let dataset = state.catalog.dataset(&params.dataset_id).await?;
    if !dataset.is_payable() {
        return Err(PaymentError::DatasetNotPayable(params.dataset_id).into());
    }

    let transaction = state
        .rail
        .build_draft(&dataset, &params.dataset_id, &params.signer)
        .await?;
    Ok(Json(CreateTransactionResponse { transaction }))
}

/// `POST /solana/sendTransaction` - settles a signed purchase end to end.
///
/// Grants and the ledger row happen only after the settled transfer passes
/// independent validation. A duplicate signature on the ledger is reported
/// as success so client retries converge.
///
/// # Errors
///
/// Propagates the full payment error taxonomy as the JSON envelope.
pub async fn send_transaction(
    State(state): State<AppState>,
    Json(body): Json<SendTransactionBody>,
) -> Result<Json<SendTransactionResponse>, ApiError> {
    let signature = state.rail.broadcast_and_confirm(&body.transaction).await?;
    let payment = state
        .rail
        .validate_settlement(&signature, &body.dataset_id)
        .await?;

    let dataset = state.catalog.dataset(&body.dataset_id).await?;
    let permission_hashes =
        grants::grant_permissions(state.permissions.as_ref(), &payment, &dataset.timeseries_ids)
            .await?;

    let record = TransactionRecord {
        payment,
        permission_hashes,
    };
    match state.ledger.record(&record) {
        Ok(()) => {}
        Err(PaymentError::LedgerConflict(sig)) => {
            tracing::info!(signature = %sig, "transaction already recorded, treating as success");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Json(SendTransactionResponse {
        message: "success".to_owned(),
        signature,
    }))
}

/// `GET /solana/getTransactions` - history and aggregates for a wallet.
///
/// # Errors
///
/// 500 on ledger failure.
pub async fn get_transactions(
    State(state): State<AppState>,
    Query(params): Query<GetTransactionsParams>,
) -> Result<Json<TransactionsReport>, ApiError> {
    let purchases = state.ledger.by_signer(&params.address)?;
    let sales = state.ledger.by_seller(&params.address)?;

    let mut total_units: u128 = 0;
    let mut dataset_sales: HashMap<String, (u64, u128)> = HashMap::new();
    for sale in &sales {
        let units = parse_units(&sale.payment.amount)?;
        total_units += u128::from(units);
        let entry = dataset_sales
            .entry(sale.payment.dataset_id.clone())
            .or_insert((0, 0));
        entry.0 += 1;
        entry.1 += u128::from(units);
    }

    let decimals = state.display_decimals;
    let report = TransactionsReport {
        total_profit: display_units(total_units, decimals),
        total_sales: sales.len(),
        purchases: to_display_rows(purchases, decimals)?,
        sales: to_display_rows(sales, decimals)?,
        dataset_sales: dataset_sales
            .into_iter()
            .map(|(dataset_id, (count, units))| {
                (
                    dataset_id,
                    DatasetSales {
                        sales: count,
                        profit: display_units(units, decimals),
                    },
                )
            })
            .collect(),
    };
    Ok(Json(report))
}

/// `GET /health` - liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Builds the service router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/solana/createTransaction", get(create_transaction))
        .route("/solana/sendTransaction", post(send_transaction))
        .route("/solana/getTransactions", get(get_transactions))
        .route("/health", get(health))
        .with_state(state)
}

fn parse_units(amount: &str) -> Result<u64, PaymentError> {
    amount
        .parse::<u64>()
        .map_err(|_| PaymentError::Ledger(format!("corrupt amount {amount:?}")))
}

fn display_units(units: u128, decimals: u8) -> String {
    i128::try_from(units)
        .ok()
        .and_then(|value| Decimal::try_from_i128_with_scale(value, u32::from(decimals)).ok())
        .map_or_else(|| units.to_string(), |value| value.normalize().to_string())
}

fn to_display_rows(
    rows: Vec<TransactionRecord>,
    decimals: u8,
) -> Result<Vec<TransactionRecord>, PaymentError> {
    rows.into_iter()
        .map(|mut row| {
            let units = parse_units(&row.payment.amount)?;
            row.payment.amount = display_units(u128::from(units), decimals);
            Ok(row)
        })
        .collect()
}
