//! Synthetic ID and token generation.
//!
//! Invoice numbers and transaction IDs follow the `<PREFIX>-<TOKEN>`
//! convention (`INV-`, `TXN-`, `CREDIT-`), where the token is a random
//! uppercase alphanumeric string. Uniqueness is assumed, not enforced;
//! the UUID-derived generator makes collisions vanishingly unlikely.

/// Number of token characters taken from the underlying UUID.
const TOKEN_LENGTH: usize = 12;

/// Produces the random uppercase tokens behind every generated ID.
///
/// The prefixed constructors are default methods so a test generator only
/// has to override [`TokenGenerator::token`].
pub trait TokenGenerator: Send + Sync {
    /// Produce one uppercase alphanumeric token.
    fn token(&self) -> String;

    /// Generate a human-readable invoice number.
    fn invoice_number(&self) -> String {
        format!("INV-{}", self.token())
    }

    /// Generate a transaction ID for a charge payment.
    fn charge_transaction_id(&self) -> String {
        format!("TXN-{}", self.token())
    }

    /// Generate a transaction ID for a bookkeeping credit.
    fn credit_transaction_id(&self) -> String {
        format!("CREDIT-{}", self.token())
    }

    /// Generate a payment method ID.
    fn payment_method_id(&self) -> String {
        format!("PM-{}", self.token())
    }

    /// Generate a subscription ID.
    fn subscription_id(&self) -> String {
        format!("SUB-{}", self.token())
    }
}

impl<G: TokenGenerator + ?Sized> TokenGenerator for std::sync::Arc<G> {
    fn token(&self) -> String {
        (**self).token()
    }
}

/// UUID-backed token generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTokenGenerator;

impl TokenGenerator for UuidTokenGenerator {
    fn token(&self) -> String {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        simple[..TOKEN_LENGTH].to_ascii_uppercase()
    }
}

/// Deterministic token generator for testing.
#[cfg(any(test, feature = "test-billing"))]
pub mod test {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Generator that counts up from 1, padded to six digits.
    #[derive(Debug, Default)]
    pub struct SequentialTokenGenerator {
        next: AtomicU64,
    }

    impl SequentialTokenGenerator {
        /// Create a new generator starting at 1.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl TokenGenerator for SequentialTokenGenerator {
        fn token(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
            format!("{:06}", n)
        }
    }
}
