//! Payment method management.
//!
//! Stores per-user card records and maintains the single-default invariant:
//! for a user with at least one method, exactly one is the default at all
//! times. Card numbers are reduced to a detected type plus the last four
//! digits before storage; the CVV is validated and discarded, never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{BillingAuditEvent, BillingAuditLogger, NoOpAuditLogger};
use crate::clock::Clock;
use crate::error::{BillingError, Result};
use crate::store::BillingStore;
use crate::tokens::TokenGenerator;
use crate::validation;

/// Detected card network.
///
/// Derived from the number's leading digits with a small BIN-prefix
/// classifier. This is a display hint, not payment-industry validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Unknown,
}

impl CardType {
    /// Classify a card number by its leading digits.
    #[must_use]
    pub fn detect(card_number: &str) -> Self {
        if card_number.starts_with('4') {
            return Self::Visa;
        }
        match card_number.get(..2) {
            Some("51" | "52" | "53" | "54" | "55") => Self::Mastercard,
            Some("34" | "37") => Self::Amex,
            Some("60" | "65") => Self::Discover,
            _ => Self::Unknown,
        }
    }

    /// Convert to string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::Discover => "discover",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for CardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Card details submitted by a caller.
///
/// The full number and CVV only live in this struct for the duration of
/// the add operation.
#[derive(Debug, Clone)]
pub struct NewCard {
    /// Name on the card.
    pub card_holder: String,
    /// Full 16-digit card number.
    pub card_number: String,
    /// Expiry month (1-12).
    pub expiry_month: u32,
    /// Expiry year (four digits).
    pub expiry_year: i32,
    /// 3-digit CVV. Checked and discarded.
    pub cvv: String,
}

/// A stored payment instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Synthetic ID (`PM-...`).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Name on the card.
    pub card_holder: String,
    /// Detected card network.
    pub card_type: CardType,
    /// Last four digits of the card number.
    pub last_four: String,
    /// Expiry month (1-12).
    pub expiry_month: u32,
    /// Expiry year.
    pub expiry_year: i32,
    /// Whether this is the user's default method.
    pub is_default: bool,
    /// When the method was stored.
    pub created_at: DateTime<Utc>,
}

/// Payment method management operations.
///
/// Every mutation is an atomic store operation, so there is never a window
/// where a user has zero or two defaults.
pub struct PaymentMethodManager<S, K, G, A = NoOpAuditLogger> {
    store: S,
    clock: K,
    tokens: G,
    audit: A,
}

impl<S, K, G> PaymentMethodManager<S, K, G>
where
    S: BillingStore,
    K: Clock,
    G: TokenGenerator,
{
    /// Create a new payment method manager.
    #[must_use]
    pub fn new(store: S, clock: K, tokens: G) -> Self {
        Self {
            store,
            clock,
            tokens,
            audit: NoOpAuditLogger,
        }
    }
}

impl<S, K, G, A> PaymentMethodManager<S, K, G, A>
where
    S: BillingStore,
    K: Clock,
    G: TokenGenerator,
    A: BillingAuditLogger,
{
    /// Replace the audit logger.
    #[must_use]
    pub fn with_audit<A2: BillingAuditLogger>(self, audit: A2) -> PaymentMethodManager<S, K, G, A2> {
        PaymentMethodManager {
            store: self.store,
            clock: self.clock,
            tokens: self.tokens,
            audit,
        }
    }

    /// Store a new payment method for a user.
    ///
    /// The user's first method always becomes the default; otherwise
    /// `make_default` controls whether the default flag moves. The swap is
    /// atomic with the insert.
    ///
    /// # Errors
    ///
    /// Returns a validation error for malformed card fields. No state is
    /// mutated on failure.
    pub async fn add(&self, user_id: &str, card: NewCard, make_default: bool) -> Result<PaymentMethod> {
        validation::validate_user_id(user_id)?;
        let now = self.clock.now();
        validation::validate_card(&card, now)?;

        let card_type = CardType::detect(&card.card_number);
        let last_four = card.card_number[card.card_number.len() - 4..].to_string();

        let method = PaymentMethod {
            id: self.tokens.payment_method_id(),
            user_id: user_id.to_string(),
            card_holder: card.card_holder.trim().to_string(),
            card_type,
            last_four,
            expiry_month: card.expiry_month,
            expiry_year: card.expiry_year,
            is_default: false, // store assigns the flag inside the swap
            created_at: now,
        };

        let stored = self
            .store
            .insert_payment_method(user_id, &method, make_default)
            .await?;

        self.audit
            .log(BillingAuditEvent::PaymentMethodAdded {
                user_id: user_id.to_string(),
                payment_method_id: stored.id.clone(),
                card_type: card_type.as_str().to_string(),
            })
            .await;

        Ok(stored)
    }

    /// Make an existing method the user's default.
    ///
    /// Atomic swap: the flag is cleared on every other method and set on
    /// the target in one operation.
    pub async fn set_default(&self, user_id: &str, payment_method_id: &str) -> Result<()> {
        validation::validate_user_id(user_id)?;

        // Ownership check before mutating.
        if self
            .store
            .get_payment_method(user_id, payment_method_id)
            .await?
            .is_none()
        {
            return Err(BillingError::PaymentMethodNotFound {
                payment_method_id: payment_method_id.to_string(),
            });
        }

        self.store
            .set_default_payment_method(user_id, payment_method_id)
            .await?;

        self.audit
            .log(BillingAuditEvent::DefaultPaymentMethodChanged {
                user_id: user_id.to_string(),
                payment_method_id: payment_method_id.to_string(),
            })
            .await;

        Ok(())
    }

    /// Delete a payment method.
    ///
    /// The last remaining method cannot be deleted. If the deleted method
    /// was the default, the first remaining method by stored order is
    /// promoted in the same operation.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::LastPaymentMethod`] when only one method
    /// remains.
    pub async fn delete(&self, user_id: &str, payment_method_id: &str) -> Result<()> {
        validation::validate_user_id(user_id)?;

        let methods = self.store.list_payment_methods(user_id).await?;
        if !methods.iter().any(|m| m.id == payment_method_id) {
            return Err(BillingError::PaymentMethodNotFound {
                payment_method_id: payment_method_id.to_string(),
            });
        }
        if methods.len() <= 1 {
            return Err(BillingError::LastPaymentMethod {
                user_id: user_id.to_string(),
            });
        }

        self.store
            .delete_payment_method(user_id, payment_method_id)
            .await?;

        self.audit
            .log(BillingAuditEvent::PaymentMethodRemoved {
                user_id: user_id.to_string(),
                payment_method_id: payment_method_id.to_string(),
            })
            .await;

        Ok(())
    }

    /// List a user's payment methods in stored order.
    pub async fn list(&self, user_id: &str) -> Result<Vec<PaymentMethod>> {
        validation::validate_user_id(user_id)?;
        self.store.list_payment_methods(user_id).await
    }

    /// Get the user's default payment method, if any.
    pub async fn get_default(&self, user_id: &str) -> Result<Option<PaymentMethod>> {
        let methods = self.store.list_payment_methods(user_id).await?;
        Ok(methods.into_iter().find(|m| m.is_default))
    }
}
