//! Capability traits for the external catalog and permission store.
//!
//! Both collaborators live on a content-addressed messaging network and are
//! reached over HTTP. The traits keep the payment pipeline testable and keep
//! connection state explicitly constructed rather than process-global.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::PaymentError;
use crate::types::{Dataset, PermissionRecord};

/// Read access to the dataset catalog.
///
/// Implementations must perform a fresh read per call; the pipeline relies
/// on seeing the catalog's current price and owner at validation time.
#[async_trait]
pub trait DatasetCatalog: Send + Sync {
    /// Fetches the dataset published under `dataset_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::DatasetNotPayable`] if the dataset does not
    /// exist, or [`PaymentError::Store`] on transport failure.
    async fn dataset(&self, dataset_id: &str) -> Result<Dataset, PaymentError>;
}

/// Write access to the append-only permission message store.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Publishes one grant record and returns the store's opaque identifier
    /// for it.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Store`] if the record could not be published.
    async fn publish(&self, record: &PermissionRecord) -> Result<String, PaymentError>;
}

#[async_trait]
impl<T: DatasetCatalog + ?Sized> DatasetCatalog for Arc<T> {
    async fn dataset(&self, dataset_id: &str) -> Result<Dataset, PaymentError> {
        (**self).dataset(dataset_id).await
    }
}

#[async_trait]
impl<T: PermissionStore + ?Sized> PermissionStore for Arc<T> {
    async fn publish(&self, record: &PermissionRecord) -> Result<String, PaymentError> {
        (**self).publish(record).await
    }
}
