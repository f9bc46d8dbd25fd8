//! Priority fee and compute unit estimation for draft transactions.
//!
//! Both legs degrade to fixed conservative defaults on any oracle or
//! simulation failure; estimation must never abort transaction
//! construction. The two network queries are independent and run
//! concurrently.

use serde::{Deserialize, Serialize};
use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_message::v0::Message as MessageV0;
use solana_message::{Hash, VersionedMessage};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_transaction::Instruction;
use solana_transaction::versioned::VersionedTransaction;

use crate::rpc::SolanaRpc;

/// Fallback priority fee rate in micro-lamports per compute unit.
pub const DEFAULT_PRIORITY_FEE: u64 = 5_000;

/// Fallback compute unit ceiling, also used as the probe limit during
/// simulation.
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Target service level for transaction inclusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityLevel {
    /// Cheapest inclusion, tolerates delay.
    Low,
    /// Median of recent fees.
    Medium,
    /// Competitive inclusion.
    #[default]
    High,
}

impl PriorityLevel {
    const fn percentile(self) -> usize {
        match self {
            Self::Low => 25,
            Self::Medium => 50,
            Self::High => 75,
        }
    }
}

/// A priced compute budget for one draft transaction.
#[derive(Debug, Clone, Copy)]
pub struct FeeBudget {
    /// Priority fee rate in micro-lamports per compute unit.
    pub priority_fee: u64,
    /// Compute unit ceiling.
    pub compute_unit_limit: u32,
}

/// Estimates a fee budget for the given unpriced instruction list.
///
/// Priority fee comes from the recent-fee oracle at the requested service
/// level; the compute ceiling comes from a dry-run of the instruction set
/// against the network. Either source failing substitutes its default.
pub async fn estimate<R: SolanaRpc + ?Sized>(
    rpc: &R,
    payer: &Pubkey,
    instructions: &[Instruction],
    level: PriorityLevel,
) -> FeeBudget {
    let (priority_fee, compute_unit_limit) = tokio::join!(
        priority_fee(rpc, payer, instructions, level),
        compute_unit_limit(rpc, payer, instructions),
    );
    FeeBudget {
        priority_fee,
        compute_unit_limit,
    }
}

async fn priority_fee<R: SolanaRpc + ?Sized>(
    rpc: &R,
    payer: &Pubkey,
    instructions: &[Instruction],
    level: PriorityLevel,
) -> u64 {
    let mut writable = vec![*payer];
    for instruction in instructions {
        writable.extend(
            instruction
                .accounts
                .iter()
                .filter(|meta| meta.is_writable)
                .map(|meta| meta.pubkey),
        );
    }

    match rpc.recent_prioritization_fees(&writable).await {
        Ok(fees) => pick_percentile(fees, level.percentile()).unwrap_or(DEFAULT_PRIORITY_FEE),
        Err(e) => {
            tracing::warn!(error = %e, "priority fee oracle unavailable, using default rate");
            DEFAULT_PRIORITY_FEE
        }
    }
}

async fn compute_unit_limit<R: SolanaRpc + ?Sized>(
    rpc: &R,
    payer: &Pubkey,
    instructions: &[Instruction],
) -> u32 {
    let probe = match probe_transaction(payer, instructions) {
        Ok(probe) => probe,
        Err(e) => {
            tracing::warn!(error = %e, "could not compile simulation probe, using default limit");
            return DEFAULT_COMPUTE_UNIT_LIMIT;
        }
    };

    match rpc.simulated_units(&probe).await {
        Ok(Some(units)) => u32::try_from(units).unwrap_or(DEFAULT_COMPUTE_UNIT_LIMIT),
        Ok(None) => DEFAULT_COMPUTE_UNIT_LIMIT,
        Err(e) => {
            tracing::warn!(error = %e, "compute unit simulation failed, using default limit");
            DEFAULT_COMPUTE_UNIT_LIMIT
        }
    }
}

/// Builds the unsigned transaction used for the compute dry-run.
///
/// The blockhash is a placeholder; the simulation replaces it, and the
/// dry-run never mutates on-chain state.
fn probe_transaction(
    payer: &Pubkey,
    instructions: &[Instruction],
) -> Result<VersionedTransaction, String> {
    let mut probe_ixs = Vec::with_capacity(instructions.len() + 2);
    probe_ixs.push(ComputeBudgetInstruction::set_compute_unit_limit(
        DEFAULT_COMPUTE_UNIT_LIMIT,
    ));
    probe_ixs.push(ComputeBudgetInstruction::set_compute_unit_price(
        DEFAULT_PRIORITY_FEE,
    ));
    probe_ixs.extend(instructions.iter().cloned());

    let message = MessageV0::try_compile(payer, &probe_ixs, &[], Hash::default())
        .map_err(|e| format!("{e:?}"))?;
    let num_required = message.header.num_required_signatures as usize;
    Ok(VersionedTransaction {
        signatures: vec![Signature::default(); num_required],
        message: VersionedMessage::V0(message),
    })
}

fn pick_percentile(fees: Vec<u64>, percentile: usize) -> Option<u64> {
    let mut fees: Vec<u64> = fees.into_iter().filter(|fee| *fee > 0).collect();
    if fees.is_empty() {
        return None;
    }
    fees.sort_unstable();
    let index = (fees.len() - 1) * percentile / 100;
    fees.get(index).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_ignores_zero_samples() {
        assert_eq!(pick_percentile(vec![0, 0, 0], 75), None);
        assert_eq!(pick_percentile(vec![0, 100], 75), Some(100));
    }

    #[test]
    fn percentile_picks_by_service_level() {
        let fees = vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
        assert_eq!(
            pick_percentile(fees.clone(), PriorityLevel::Low.percentile()),
            Some(30)
        );
        assert_eq!(
            pick_percentile(fees.clone(), PriorityLevel::Medium.percentile()),
            Some(50)
        );
        assert_eq!(
            pick_percentile(fees, PriorityLevel::High.percentile()),
            Some(70)
        );
    }

    #[test]
    fn empty_oracle_yields_none() {
        assert_eq!(pick_percentile(vec![], 75), None);
    }
}
