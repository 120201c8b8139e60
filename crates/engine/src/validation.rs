//! Transfer validation.
//!
//! Two gates run before a transfer touches any balance:
//!
//! 1. [`check_proposal`] rejects malformed input (amounts below `0.01`, blank
//!    owner). These are [`ErrorKind::Invalid`] failures.
//! 2. [`validate_transfer`] checks the proposal against the current obligation
//!    snapshot, stopping at the first failing rule:
//!    existence, ownership, VAT compatibility, open status, currency.
//!
//! Both are pure: no I/O and no mutation.
//!
//!  [`ErrorKind::Invalid`]: crate::ErrorKind::Invalid

use crate::{EngineError, Money, NewTransferCmd, Obligation, ResultEngine, util::normalize_owner};

/// Shape checks on a proposal, independent of any obligation.
pub fn check_proposal(proposal: &NewTransferCmd) -> ResultEngine<()> {
    if proposal.netto < Money::MIN_POSITIVE {
        return Err(EngineError::InvalidAmount(
            "netto must be >= 0.01".to_string(),
        ));
    }
    if proposal.vat < Money::MIN_POSITIVE {
        return Err(EngineError::InvalidAmount("vat must be >= 0.01".to_string()));
    }
    normalize_owner(&proposal.owner)?;
    Ok(())
}

/// Decides whether `proposal` may be applied to `obligation`.
///
/// Returns the obligation back so callers can go on mutating it.
pub fn validate_transfer<'a>(
    proposal: &NewTransferCmd,
    obligation: Option<&'a Obligation>,
) -> ResultEngine<&'a Obligation> {
    let Some(obligation) = obligation else {
        return Err(EngineError::KeyNotFound(
            "obligation not exists".to_string(),
        ));
    };
    if proposal.owner.trim() != obligation.owner() {
        return Err(EngineError::OwnershipMismatch(
            "transfer owner differs from obligation owner".to_string(),
        ));
    }
    if proposal.is_vat && !obligation.requires_vat() {
        return Err(EngineError::VatMismatch(
            "VAT transfer on an obligation that does not require VAT".to_string(),
        ));
    }
    if obligation.is_settled() {
        return Err(EngineError::AlreadySettled(format!(
            "obligation {} is already settled",
            obligation.id()
        )));
    }
    if &proposal.currency != obligation.currency() {
        return Err(EngineError::CurrencyMismatch(format!(
            "obligation currency is {}, got {}",
            obligation.currency(),
            proposal.currency
        )));
    }
    Ok(obligation)
}
