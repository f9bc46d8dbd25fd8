#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana payment rail for the payrail dataset marketplace.
//!
//! Implements [`payrail::PaymentRail`] on top of the Solana settlement
//! network: SPL Token checked transfers with deterministic reference tags,
//! compute-budget pricing, a bounded send/confirm loop, and independent
//! validation of settled transfers against the dataset catalog.
//!
//! # Modules
//!
//! - [`broadcast`] - Send/confirm state machine with bounded resubmission
//! - [`draft`] - Unsigned transfer transaction assembly
//! - [`fees`] - Priority fee and compute unit estimation
//! - [`rail`] - [`SolanaRail`], the `PaymentRail` implementation
//! - [`reference`] - Deterministic reference tag derivation
//! - [`rpc`] - The RPC client abstraction and its HTTP implementation
//! - [`validate`] - Settled transfer validation

pub mod broadcast;
pub mod draft;
pub mod fees;
pub mod rail;
pub mod reference;
pub mod rpc;
pub mod validate;

pub use rail::{RailConfig, SolanaRail, USDC_MINT};
pub use rpc::{RpcError, SignatureStatus, SolanaRpc, SolanaRpcClient};
