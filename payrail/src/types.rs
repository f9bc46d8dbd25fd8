//! Domain data model: datasets, verified payments, ledger rows, and
//! permission records.
//!
//! Wire names follow the catalog's JSON conventions (camelCase, with the
//! historical `timeseriesIDs` / `viewIDs` capitalisation), so these types
//! round-trip against the external message store unchanged.

use serde::{Deserialize, Serialize};

use crate::timestamp::UnixTimestamp;

/// A dataset as published on the external catalog.
///
/// Read-only from this service's perspective: fetched fresh for every
/// request and never cached, since price and owner may change between a
/// draft being issued and its settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Display name.
    pub name: String,
    /// Wallet address of the payee.
    pub owner: String,
    /// Price in human units of the payment token. `None` means the dataset
    /// is free and the whole payment path must short-circuit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    /// Ordered resource unit identifiers access is granted to.
    #[serde(rename = "timeseriesIDs", default)]
    pub timeseries_ids: Vec<String>,
    /// Whether the dataset is currently offered.
    #[serde(default = "default_true")]
    pub available: bool,
    /// Whether the owner also owns every listed resource unit.
    #[serde(default)]
    pub owns_all_timeseries: bool,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    /// Associated view identifiers, passed through untouched.
    #[serde(rename = "viewIDs", default, skip_serializing_if = "Option::is_none")]
    pub view_ids: Option<Vec<String>>,
}

const fn default_true() -> bool {
    true
}

impl Dataset {
    /// Whether this dataset can be paid for at all.
    #[must_use]
    pub fn is_payable(&self) -> bool {
        self.available && self.price.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// A verified payment, produced only by the transfer validator.
///
/// Every field is re-derived from the settled transaction and the catalog's
/// current state; nothing here is trusted from request parameters. Immutable
/// once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Unique transaction identifier on the settlement network.
    pub signature: String,
    /// Identifier of the purchased dataset.
    pub dataset_id: String,
    /// Dataset name at validation time.
    pub dataset_name: String,
    /// Wallet that funded the transfer (the buyer).
    pub signer: String,
    /// Wallet that received the transfer (the seller).
    pub seller: String,
    /// Mint address of the payment token.
    pub currency: String,
    /// Transferred amount in the token's base units, as a decimal string.
    pub amount: String,
    /// Wall-clock time the payment was validated.
    pub timestamp: UnixTimestamp,
}

/// A ledger row: a verified payment plus the grant receipts it produced.
///
/// Created exactly once per validated signature, never updated, never
/// deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// The verified payment.
    #[serde(flatten)]
    pub payment: Payment,
    /// Opaque identifiers returned by the permission store, one per resource
    /// unit, in the dataset's resource unit order.
    pub permission_hashes: Vec<String>,
}

/// An access grant record published to the external message store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRecord {
    /// The seller granting access.
    pub authorizer: String,
    /// The buyer receiving access.
    pub requestor: String,
    /// The purchased dataset.
    #[serde(rename = "datasetID")]
    pub dataset_id: String,
    /// The resource unit this record covers.
    #[serde(rename = "timeseriesID")]
    pub timeseries_id: String,
    /// Grant status; always `GRANTED` when published by this service.
    pub status: PermissionStatus,
}

/// Status carried on a [`PermissionRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionStatus {
    /// Access granted.
    Granted,
    /// Access revoked (written by other tooling, never by this service).
    Revoked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_deserializes_catalog_wire_names() {
        let json = r#"{
            "name": "tides",
            "owner": "SellerWallet111",
            "price": "2.50",
            "timeseriesIDs": ["a", "b", "c"],
            "ownsAllTimeseries": true
        }"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        assert_eq!(dataset.timeseries_ids.len(), 3);
        assert!(dataset.available);
        assert!(dataset.is_payable());
    }

    #[test]
    fn free_dataset_is_not_payable() {
        let json = r#"{"name": "open", "owner": "w", "timeseriesIDs": []}"#;
        let dataset: Dataset = serde_json::from_str(json).unwrap();
        assert!(dataset.price.is_none());
        assert!(!dataset.is_payable());
    }

    #[test]
    fn permission_record_uses_catalog_field_names() {
        let record = PermissionRecord {
            authorizer: "seller".into(),
            requestor: "buyer".into(),
            dataset_id: "d".into(),
            timeseries_id: "t".into(),
            status: PermissionStatus::Granted,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["datasetID"], "d");
        assert_eq!(json["timeseriesID"], "t");
        assert_eq!(json["status"], "GRANTED");
    }

    #[test]
    fn transaction_record_flattens_payment() {
        let record = TransactionRecord {
            payment: Payment {
                signature: "sig".into(),
                dataset_id: "d".into(),
                dataset_name: "tides".into(),
                signer: "buyer".into(),
                seller: "seller".into(),
                currency: "mint".into(),
                amount: "2500000".into(),
                timestamp: UnixTimestamp::from_secs(1_700_000_000),
            },
            permission_hashes: vec!["h1".into(), "h2".into()],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["signature"], "sig");
        assert_eq!(json["datasetName"], "tides");
        assert_eq!(json["permissionHashes"][1], "h2");
    }
}
