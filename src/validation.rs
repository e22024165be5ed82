//! Input validation for billing operations.
//!
//! Validation happens before any transaction is opened; a failure here
//! guarantees no state was touched.

use chrono::Datelike;

use crate::error::{BillingError, Result};
use crate::payment_method::NewCard;

/// Maximum length for user IDs.
const MAX_USER_ID_LENGTH: usize = 256;

/// Maximum length for card holder names.
const MAX_CARD_HOLDER_LENGTH: usize = 128;

/// Exact length of an accepted card number.
const CARD_NUMBER_LENGTH: usize = 16;

/// Exact length of an accepted CVV.
const CVV_LENGTH: usize = 3;

/// How far in the future an expiry year may lie.
const MAX_EXPIRY_YEARS_AHEAD: i32 = 20;

/// Validate a user ID.
///
/// User IDs must:
/// - Not be empty
/// - Not exceed 256 characters
/// - Contain only alphanumeric characters, underscores, and hyphens
///
/// # Errors
///
/// Returns [`BillingError::InvalidUserId`] if validation fails.
pub fn validate_user_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(BillingError::InvalidUserId {
            id: id.to_string(),
            reason: "user_id cannot be empty".to_string(),
        });
    }

    if id.len() > MAX_USER_ID_LENGTH {
        return Err(BillingError::InvalidUserId {
            id: truncate_for_error(id),
            reason: format!("user_id exceeds maximum length of {}", MAX_USER_ID_LENGTH),
        });
    }

    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(BillingError::InvalidUserId {
            id: sanitize_for_error(id),
            reason: "user_id contains invalid characters (only alphanumeric, underscore, and hyphen allowed)"
                .to_string(),
        });
    }

    Ok(())
}

/// Validate the fields of a card submission.
///
/// The CVV is checked for shape and then discarded by the caller; it is
/// never persisted anywhere in this crate.
///
/// # Errors
///
/// Returns the matching `Invalid*` variant for the first failing field.
pub fn validate_card(card: &NewCard, now: chrono::DateTime<chrono::Utc>) -> Result<()> {
    if card.card_holder.trim().is_empty() {
        return Err(BillingError::InvalidCardHolder {
            reason: "card holder cannot be empty".to_string(),
        });
    }

    if card.card_holder.len() > MAX_CARD_HOLDER_LENGTH {
        return Err(BillingError::InvalidCardHolder {
            reason: format!(
                "card holder exceeds maximum length of {}",
                MAX_CARD_HOLDER_LENGTH
            ),
        });
    }

    if card.card_number.len() != CARD_NUMBER_LENGTH
        || !card.card_number.chars().all(|c| c.is_ascii_digit())
    {
        return Err(BillingError::InvalidCardNumber {
            reason: format!("card number must be exactly {} digits", CARD_NUMBER_LENGTH),
        });
    }

    if !(1..=12).contains(&card.expiry_month) {
        return Err(BillingError::InvalidExpiry {
            reason: format!("expiry month {} is not in 1-12", card.expiry_month),
        });
    }

    let current_year = now.year();
    if card.expiry_year < current_year || card.expiry_year > current_year + MAX_EXPIRY_YEARS_AHEAD
    {
        return Err(BillingError::InvalidExpiry {
            reason: format!(
                "expiry year {} is not in {}-{}",
                card.expiry_year,
                current_year,
                current_year + MAX_EXPIRY_YEARS_AHEAD
            ),
        });
    }

    if card.cvv.len() != CVV_LENGTH || !card.cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(BillingError::InvalidCvv {
            reason: format!("CVV must be exactly {} digits", CVV_LENGTH),
        });
    }

    Ok(())
}

/// Validate a cancellation reason against the configured minimum length.
///
/// The reason is measured after trimming surrounding whitespace.
///
/// # Errors
///
/// Returns [`BillingError::CancellationReasonTooShort`] if too short.
pub fn validate_cancellation_reason(reason: &str, min_len: usize) -> Result<()> {
    let actual_len = reason.trim().chars().count();
    if actual_len < min_len {
        return Err(BillingError::CancellationReasonTooShort {
            min_len,
            actual_len,
        });
    }
    Ok(())
}

/// Truncate an overlong value for inclusion in an error message.
fn truncate_for_error(value: &str) -> String {
    const ERROR_DISPLAY_LENGTH: usize = 32;
    let truncated: String = value.chars().take(ERROR_DISPLAY_LENGTH).collect();
    format!("{}...", truncated)
}

/// Replace non-identifier characters so error messages cannot echo markup.
fn sanitize_for_error(value: &str) -> String {
    value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '?'
            }
        })
        .take(64)
        .collect()
}
