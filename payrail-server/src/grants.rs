//! Permission grant fan-out.
//!
//! One record per resource unit, published concurrently and jointly
//! awaited. The fan-out is all-or-nothing: any failed publish fails the
//! whole batch with the failed units named, and the caller must not record
//! the transaction. There is no idempotency key, so a retry after a partial
//! failure can duplicate grant records on the store; the store is
//! append-only and tolerates duplicates.

use futures_util::future::join_all;

use payrail::catalog::PermissionStore;
use payrail::error::PaymentError;
use payrail::types::{Payment, PermissionRecord, PermissionStatus};

/// Publishes one `GRANTED` record per resource unit for a verified payment.
///
/// Returns the store's opaque identifiers in the same order as
/// `timeseries_ids`.
///
/// # Errors
///
/// Returns [`PaymentError::Publish`] naming every unit whose publish
/// failed; in that case no grants are guaranteed.
pub async fn grant_permissions<S: PermissionStore + ?Sized>(
    store: &S,
    payment: &Payment,
    timeseries_ids: &[String],
) -> Result<Vec<String>, PaymentError> {
    tracing::info!(
        signature = %payment.signature,
        dataset_id = %payment.dataset_id,
        units = timeseries_ids.len(),
        "granting permissions for verified payment"
    );

    let publishes = timeseries_ids.iter().map(|timeseries_id| {
        let record = PermissionRecord {
            authorizer: payment.seller.clone(),
            requestor: payment.signer.clone(),
            dataset_id: payment.dataset_id.clone(),
            timeseries_id: timeseries_id.clone(),
            status: PermissionStatus::Granted,
        };
        async move { store.publish(&record).await }
    });
    let results = join_all(publishes).await;

    let mut hashes = Vec::with_capacity(results.len());
    let mut failed_units = Vec::new();
    let mut first_reason = None;
    for (timeseries_id, result) in timeseries_ids.iter().zip(results) {
        match result {
            Ok(hash) => hashes.push(hash),
            Err(e) => {
                failed_units.push(timeseries_id.clone());
                first_reason.get_or_insert_with(|| e.to_string());
            }
        }
    }

    if failed_units.is_empty() {
        Ok(hashes)
    } else {
        Err(PaymentError::Publish {
            failed_units,
            reason: first_reason.unwrap_or_default(),
        })
    }
}
