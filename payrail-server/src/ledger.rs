//! Sled-backed transaction ledger.
//!
//! One row per verified payment, keyed by signature. The insert is a single
//! atomic compare-and-swap, so the uniqueness constraint on the signature is
//! the storage engine's own atomicity guarantee; concurrent requests need no
//! cross-request locking. Rows are never updated or deleted.

use std::path::Path;

use payrail::error::PaymentError;
use payrail::types::TransactionRecord;

/// The transaction ledger.
#[derive(Debug, Clone)]
pub struct Ledger {
    db: sled::Db,
}

impl Ledger {
    /// Opens (or creates) the ledger at the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Ledger`] if the database cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PaymentError> {
        let db = sled::open(path).map_err(|e| PaymentError::Ledger(e.to_string()))?;
        Ok(Self { db })
    }

    /// Inserts a row for a verified payment. Atomic and insert-only: a row
    /// already keyed by this signature fails with
    /// [`PaymentError::LedgerConflict`], which callers treat as "already
    /// processed".
    ///
    /// # Errors
    ///
    /// [`PaymentError::LedgerConflict`] on a duplicate signature,
    /// [`PaymentError::Ledger`] on storage failure.
    pub fn record(&self, record: &TransactionRecord) -> Result<(), PaymentError> {
        let signature = &record.payment.signature;
        let value =
            serde_json::to_vec(record).map_err(|e| PaymentError::Ledger(e.to_string()))?;
        let outcome = self
            .db
            .compare_and_swap(
                signature.as_bytes(),
                None::<&[u8]>,
                Some(value),
            )
            .map_err(|e| PaymentError::Ledger(e.to_string()))?;
        match outcome {
            Ok(()) => {
                self.db
                    .flush()
                    .map_err(|e| PaymentError::Ledger(e.to_string()))?;
                tracing::info!(%signature, "recorded transaction");
                Ok(())
            }
            Err(_existing) => Err(PaymentError::LedgerConflict(signature.clone())),
        }
    }

    /// All rows whose buyer is `address`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Ledger`] on storage or decode failure.
    pub fn by_signer(&self, address: &str) -> Result<Vec<TransactionRecord>, PaymentError> {
        self.scan(|row| row.payment.signer == address)
    }

    /// All rows whose seller is `address`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Ledger`] on storage or decode failure.
    pub fn by_seller(&self, address: &str) -> Result<Vec<TransactionRecord>, PaymentError> {
        self.scan(|row| row.payment.seller == address)
    }

    fn scan(
        &self,
        keep: impl Fn(&TransactionRecord) -> bool,
    ) -> Result<Vec<TransactionRecord>, PaymentError> {
        let mut rows = Vec::new();
        for entry in self.db.iter() {
            let (_key, value) = entry.map_err(|e| PaymentError::Ledger(e.to_string()))?;
            let row: TransactionRecord = serde_json::from_slice(&value)
                .map_err(|e| PaymentError::Ledger(format!("corrupt row: {e}")))?;
            if keep(&row) {
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrail::timestamp::UnixTimestamp;
    use payrail::types::Payment;

    fn row(signature: &str, signer: &str, seller: &str) -> TransactionRecord {
        TransactionRecord {
            payment: Payment {
                signature: signature.into(),
                dataset_id: "d".into(),
                dataset_name: "tides".into(),
                signer: signer.into(),
                seller: seller.into(),
                currency: "mint".into(),
                amount: "2500000".into(),
                timestamp: UnixTimestamp::from_secs(0),
            },
            permission_hashes: vec!["h1".into(), "h2".into(), "h3".into()],
        }
    }

    fn temp_ledger() -> (tempfile::TempDir, Ledger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::open(dir.path()).unwrap();
        (dir, ledger)
    }

    #[test]
    fn duplicate_signature_conflicts_without_a_second_row() {
        let (_dir, ledger) = temp_ledger();
        ledger.record(&row("sig-1", "buyer", "seller")).unwrap();

        let result = ledger.record(&row("sig-1", "buyer", "seller"));
        assert!(matches!(result, Err(PaymentError::LedgerConflict(s)) if s == "sig-1"));

        assert_eq!(ledger.by_signer("buyer").unwrap().len(), 1);
    }

    #[test]
    fn queries_split_by_role() {
        let (_dir, ledger) = temp_ledger();
        ledger.record(&row("sig-1", "alice", "bob")).unwrap();
        ledger.record(&row("sig-2", "bob", "carol")).unwrap();
        ledger.record(&row("sig-3", "dave", "bob")).unwrap();

        assert_eq!(ledger.by_signer("bob").unwrap().len(), 1);
        assert_eq!(ledger.by_seller("bob").unwrap().len(), 2);
        assert!(ledger.by_signer("nobody").unwrap().is_empty());
    }

    #[test]
    fn rows_keep_permission_hash_order() {
        let (_dir, ledger) = temp_ledger();
        ledger.record(&row("sig-1", "alice", "bob")).unwrap();
        let rows = ledger.by_signer("alice").unwrap();
        assert_eq!(rows[0].permission_hashes, vec!["h1", "h2", "h3"]);
    }
}
