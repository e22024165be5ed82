//! Billing-specific error types.
//!
//! Provides granular error types for billing operations, enabling better
//! error handling and more informative error messages for callers. Every
//! failure carries enough context for a UI layer to render appropriate
//! feedback without inspecting message strings.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Billing-specific errors.
///
/// Variants fall into four families, exposed via [`BillingError::kind`]:
/// malformed input, missing records, business-rule violations, and
/// persistence failures. No error is retried internally; callers re-submit
/// if they choose to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    // Validation errors
    /// The user ID is malformed.
    InvalidUserId { id: String, reason: String },
    /// The card holder name is malformed.
    InvalidCardHolder { reason: String },
    /// The card number is malformed.
    InvalidCardNumber { reason: String },
    /// The card expiry is out of range.
    InvalidExpiry { reason: String },
    /// The CVV is malformed.
    InvalidCvv { reason: String },
    /// The cancellation reason is too short.
    CancellationReasonTooShort { min_len: usize, actual_len: usize },

    // Not-found errors
    /// The specified plan was not found.
    PlanNotFound { plan_id: String },
    /// No subscription exists for the user.
    SubscriptionNotFound { user_id: String },
    /// The payment method does not exist or does not belong to the user.
    PaymentMethodNotFound { payment_method_id: String },
    /// The invoice does not exist or does not belong to the user.
    InvoiceNotFound { invoice_number: String },

    // Business-rule violations
    /// The plan exists but is not open for purchase.
    PlanInactive { plan_id: String },
    /// The user already has a subscription with access remaining.
    AlreadySubscribed { user_id: String },
    /// The operation needs a chargeable payment method and none is set.
    NoDefaultPaymentMethod { user_id: String },
    /// The subscription is not in the active state.
    SubscriptionNotActive { user_id: String },
    /// The subscription is not in the cancelled state.
    SubscriptionNotCancelled { user_id: String },
    /// The subscription is already on the requested plan.
    SamePlan { plan_id: String },
    /// The last remaining payment method cannot be deleted.
    LastPaymentMethod { user_id: String },

    // Persistence failures
    /// A multi-write operation failed and was rolled back in full.
    TransactionFailure { operation: String, message: String },
}

/// Coarse error classification matching the crate's failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; no transaction was opened.
    Validation,
    /// A referenced record does not exist for the requesting user.
    NotFound,
    /// A business rule refused the operation; no state was mutated.
    Constraint,
    /// A persistence error rolled back the in-flight transaction.
    Transaction,
}

impl BillingError {
    /// Classify this error into the four-way taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUserId { .. }
            | Self::InvalidCardHolder { .. }
            | Self::InvalidCardNumber { .. }
            | Self::InvalidExpiry { .. }
            | Self::InvalidCvv { .. }
            | Self::CancellationReasonTooShort { .. } => ErrorKind::Validation,

            Self::PlanNotFound { .. }
            | Self::SubscriptionNotFound { .. }
            | Self::PaymentMethodNotFound { .. }
            | Self::InvoiceNotFound { .. } => ErrorKind::NotFound,

            Self::PlanInactive { .. }
            | Self::AlreadySubscribed { .. }
            | Self::NoDefaultPaymentMethod { .. }
            | Self::SubscriptionNotActive { .. }
            | Self::SubscriptionNotCancelled { .. }
            | Self::SamePlan { .. }
            | Self::LastPaymentMethod { .. } => ErrorKind::Constraint,

            Self::TransactionFailure { .. } => ErrorKind::Transaction,
        }
    }

    /// Check if this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Check if this is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this is a business-rule violation.
    #[must_use]
    pub fn is_constraint_violation(&self) -> bool {
        self.kind() == ErrorKind::Constraint
    }

    /// Check if this is a persistence failure.
    #[must_use]
    pub fn is_transaction_failure(&self) -> bool {
        self.kind() == ErrorKind::Transaction
    }
}

impl fmt::Display for BillingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUserId { id, reason } => {
                write!(f, "Invalid user ID '{}': {}", id, reason)
            }
            Self::InvalidCardHolder { reason } => {
                write!(f, "Invalid card holder: {}", reason)
            }
            Self::InvalidCardNumber { reason } => {
                write!(f, "Invalid card number: {}", reason)
            }
            Self::InvalidExpiry { reason } => {
                write!(f, "Invalid card expiry: {}", reason)
            }
            Self::InvalidCvv { reason } => {
                write!(f, "Invalid CVV: {}", reason)
            }
            Self::CancellationReasonTooShort { min_len, actual_len } => {
                write!(
                    f,
                    "Cancellation reason must be at least {} characters ({} given)",
                    min_len, actual_len
                )
            }
            Self::PlanNotFound { plan_id } => {
                write!(f, "Plan not found: {}", plan_id)
            }
            Self::SubscriptionNotFound { user_id } => {
                write!(f, "No subscription found for '{}'", user_id)
            }
            Self::PaymentMethodNotFound { payment_method_id } => {
                write!(f, "Payment method not found: {}", payment_method_id)
            }
            Self::InvoiceNotFound { invoice_number } => {
                write!(f, "Invoice not found: {}", invoice_number)
            }
            Self::PlanInactive { plan_id } => {
                write!(f, "Plan '{}' is not available for purchase", plan_id)
            }
            Self::AlreadySubscribed { user_id } => {
                write!(f, "User '{}' already has a subscription with access remaining", user_id)
            }
            Self::NoDefaultPaymentMethod { user_id } => {
                write!(f, "User '{}' has no default payment method", user_id)
            }
            Self::SubscriptionNotActive { user_id } => {
                write!(f, "Subscription for '{}' is not active", user_id)
            }
            Self::SubscriptionNotCancelled { user_id } => {
                write!(f, "Subscription for '{}' is not cancelled", user_id)
            }
            Self::SamePlan { plan_id } => {
                write!(f, "Subscription is already on plan '{}'", plan_id)
            }
            Self::LastPaymentMethod { user_id } => {
                write!(f, "Cannot delete the last payment method for '{}'", user_id)
            }
            Self::TransactionFailure { operation, message } => {
                write!(f, "Transaction failed during '{}': {}", operation, message)
            }
        }
    }
}

impl std::error::Error for BillingError {}
