#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP service for payrail dataset purchases.
//!
//! Thin request routing over the payment pipeline: draft creation, the
//! broadcast/validate/grant/record sequence, and transaction history with
//! aggregates. External collaborators (the settlement RPC and the message
//! store) are constructed once at startup and injected; there is no
//! process-global connection state.
//!
//! # Modules
//!
//! - [`config`] - TOML + environment configuration loader
//! - [`error`] - JSON error envelope mapping
//! - [`grants`] - Permission grant fan-out
//! - [`handlers`] - Axum route handlers
//! - [`ledger`] - Sled-backed transaction ledger
//! - [`mesh`] - Message-store client (catalog reads, permission publishes)

pub mod config;
pub mod error;
pub mod grants;
pub mod handlers;
pub mod ledger;
pub mod mesh;
