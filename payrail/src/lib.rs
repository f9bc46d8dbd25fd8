#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the payrail dataset payment service.
//!
//! This crate provides the chain-agnostic foundation shared by the payment
//! rails and the HTTP service: the domain data model, the payment error
//! taxonomy, decimal price conversion, and the capability traits behind
//! which chain-specific rails and external collaborators sit.
//!
//! # Overview
//!
//! A buyer pays a seller in a stablecoin for access to a dataset. The
//! service builds a budgeted draft transaction, the buyer signs it
//! client-side, and the service drives the signed transaction to finality,
//! independently re-derives the transfer facts from the settled chain state,
//! and only then fans out access grants and records the sale.
//!
//! # Modules
//!
//! - [`amount`] - Human-readable price to base-unit conversion
//! - [`catalog`] - Dataset catalog and permission store capability traits
//! - [`encoding`] - Base64 helpers for serialized transactions
//! - [`error`] - The payment error taxonomy
//! - [`rail`] - The `PaymentRail` capability trait
//! - [`timestamp`] - Unix timestamp newtype used on ledger rows
//! - [`types`] - Dataset, payment, and permission record types

pub mod amount;
pub mod catalog;
pub mod encoding;
pub mod error;
pub mod rail;
pub mod timestamp;
pub mod types;

pub use error::PaymentError;
pub use rail::PaymentRail;
pub use types::{Dataset, Payment, PermissionRecord, TransactionRecord};
