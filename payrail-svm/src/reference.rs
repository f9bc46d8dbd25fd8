//! Deterministic reference tag derivation.
//!
//! A reference tag is a program-derived address computed purely from fixed
//! seed bytes. No private key exists for it; it is appended to the transfer
//! instruction as a read-only, non-signing account so the validator can
//! later recover which dataset (and which application) a settled transfer
//! belongs to without a side channel.

use solana_pubkey::{Pubkey, pubkey};
use std::sync::LazyLock;

use payrail::error::PaymentError;

/// Seed prefix binding a transfer to a dataset.
const DATASET_REFERENCE_SEED: &[u8] = b"reference";

/// Seed binding a transfer to this application.
pub const APP_REFERENCE_SEED: &[u8] = b"payrail";

/// System program address, used as the derivation domain for the app tag.
const SYSTEM_PROGRAM_ID: Pubkey = pubkey!("11111111111111111111111111111111");

/// Associated Token Account program address.
pub const ATA_PROGRAM_ID: Pubkey = pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

/// Program-derived address seeds are capped at this many bytes.
const MAX_SEED_LEN: usize = 32;

/// The application reference tag, identical across all transfers made
/// through this service.
pub static APP_REFERENCE: LazyLock<Pubkey> = LazyLock::new(|| {
    Pubkey::find_program_address(&[APP_REFERENCE_SEED], &SYSTEM_PROGRAM_ID).0
});

/// Derives the reference tag for a dataset.
///
/// Dataset identifiers are content hashes in hex; the decoded bytes seed
/// the derivation, so distinct datasets get distinct tags and the same
/// dataset always gets the same tag.
///
/// # Errors
///
/// Returns [`PaymentError::InputInvalid`] if the identifier is not hex, is
/// longer than a derivation seed allows, or yields no valid address.
pub fn dataset_reference(dataset_id: &str) -> Result<Pubkey, PaymentError> {
    let id_bytes = hex::decode(dataset_id)
        .map_err(|_| PaymentError::InputInvalid(format!("dataset id {dataset_id:?} is not hex")))?;
    if id_bytes.is_empty() || id_bytes.len() > MAX_SEED_LEN {
        return Err(PaymentError::InputInvalid(format!(
            "dataset id {dataset_id:?} must decode to 1..={MAX_SEED_LEN} bytes"
        )));
    }
    Pubkey::try_find_program_address(&[DATASET_REFERENCE_SEED, &id_bytes], &spl_token::ID)
        .map(|(address, _bump)| address)
        .ok_or_else(|| {
            PaymentError::InputInvalid(format!("no reference address for dataset {dataset_id:?}"))
        })
}

/// Derives the token sub-account holding `mint` tokens for `owner`.
#[must_use]
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[owner.as_ref(), spl_token::ID.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_ID,
    )
    .0
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID_A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const ID_B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn derivation_is_deterministic() {
        assert_eq!(
            dataset_reference(ID_A).unwrap(),
            dataset_reference(ID_A).unwrap()
        );
    }

    #[test]
    fn distinct_datasets_get_distinct_tags() {
        assert_ne!(
            dataset_reference(ID_A).unwrap(),
            dataset_reference(ID_B).unwrap()
        );
    }

    #[test]
    fn dataset_tag_differs_from_app_tag() {
        assert_ne!(dataset_reference(ID_A).unwrap(), *APP_REFERENCE);
    }

    #[test]
    fn rejects_non_hex_ids() {
        assert!(matches!(
            dataset_reference("not-hex!"),
            Err(PaymentError::InputInvalid(_))
        ));
    }

    #[test]
    fn rejects_oversized_ids() {
        let oversized = "cc".repeat(MAX_SEED_LEN + 1);
        assert!(matches!(
            dataset_reference(&oversized),
            Err(PaymentError::InputInvalid(_))
        ));
    }

    #[test]
    fn ata_derivation_depends_on_owner_and_mint() {
        let owner_a = Pubkey::new_unique();
        let owner_b = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        assert_ne!(
            associated_token_address(&owner_a, &mint),
            associated_token_address(&owner_b, &mint)
        );
    }
}
