//! Audit logging for billing operations.
//!
//! Trait-based audit trail for subscription and payment-method events.
//! Useful for compliance and support tooling; the managers emit an event
//! after every successful mutation.

use std::fmt;

/// Audit event types for billing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingAuditEvent {
    /// A subscription was created.
    SubscriptionCreated {
        user_id: String,
        subscription_id: String,
        plan_id: String,
    },
    /// A subscription moved to a different plan.
    PlanChanged {
        user_id: String,
        subscription_id: String,
        old_plan_id: String,
        new_plan_id: String,
        prorated_amount_cents: i64,
    },
    /// A subscription was cancelled (access retained until the period end).
    SubscriptionCancelled {
        user_id: String,
        subscription_id: String,
    },
    /// A cancelled subscription was reactivated.
    SubscriptionReactivated {
        user_id: String,
        subscription_id: String,
        plan_id: String,
    },
    /// An invoice was written to the ledger.
    InvoiceIssued {
        user_id: String,
        invoice_number: String,
        amount_cents: i64,
    },
    /// A payment was recorded against an invoice.
    PaymentRecorded {
        user_id: String,
        transaction_id: String,
        amount_cents: i64,
    },
    /// A payment method was stored.
    PaymentMethodAdded {
        user_id: String,
        payment_method_id: String,
        card_type: String,
    },
    /// The default payment method changed.
    DefaultPaymentMethodChanged {
        user_id: String,
        payment_method_id: String,
    },
    /// A payment method was deleted.
    PaymentMethodRemoved {
        user_id: String,
        payment_method_id: String,
    },
}

impl fmt::Display for BillingAuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriptionCreated { user_id, subscription_id, plan_id } => {
                write!(f, "Subscription created: user={}, sub={}, plan={}", user_id, subscription_id, plan_id)
            }
            Self::PlanChanged { user_id, subscription_id, old_plan_id, new_plan_id, prorated_amount_cents } => {
                write!(
                    f,
                    "Plan changed: user={}, sub={}, {} -> {}, prorated_cents={}",
                    user_id, subscription_id, old_plan_id, new_plan_id, prorated_amount_cents
                )
            }
            Self::SubscriptionCancelled { user_id, subscription_id } => {
                write!(f, "Subscription cancelled: user={}, sub={}", user_id, subscription_id)
            }
            Self::SubscriptionReactivated { user_id, subscription_id, plan_id } => {
                write!(f, "Subscription reactivated: user={}, sub={}, plan={}", user_id, subscription_id, plan_id)
            }
            Self::InvoiceIssued { user_id, invoice_number, amount_cents } => {
                write!(f, "Invoice issued: user={}, invoice={}, cents={}", user_id, invoice_number, amount_cents)
            }
            Self::PaymentRecorded { user_id, transaction_id, amount_cents } => {
                write!(f, "Payment recorded: user={}, txn={}, cents={}", user_id, transaction_id, amount_cents)
            }
            Self::PaymentMethodAdded { user_id, payment_method_id, card_type } => {
                write!(f, "Payment method added: user={}, method={}, type={}", user_id, payment_method_id, card_type)
            }
            Self::DefaultPaymentMethodChanged { user_id, payment_method_id } => {
                write!(f, "Default payment method changed: user={}, method={}", user_id, payment_method_id)
            }
            Self::PaymentMethodRemoved { user_id, payment_method_id } => {
                write!(f, "Payment method removed: user={}, method={}", user_id, payment_method_id)
            }
        }
    }
}

/// Trait for audit logging backends.
///
/// Implementations should handle their own failures (e.g. log to stderr)
/// rather than disrupt the billing operation that emitted the event.
#[allow(async_fn_in_trait)]
pub trait BillingAuditLogger: Send + Sync {
    /// Log a billing audit event.
    async fn log(&self, event: BillingAuditEvent);
}

/// No-op audit logger that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAuditLogger;

impl BillingAuditLogger for NoOpAuditLogger {
    async fn log(&self, _event: BillingAuditEvent) {
        // No-op
    }
}

/// Tracing-based audit logger.
///
/// Logs audit events using the `tracing` crate at INFO level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLogger;

impl BillingAuditLogger for TracingAuditLogger {
    async fn log(&self, event: BillingAuditEvent) {
        tracing::info!(
            target: "classbill::audit",
            event_type = %event_kind(&event),
            "{}", event
        );
    }
}

/// Get the event kind as a string for structured logging.
fn event_kind(event: &BillingAuditEvent) -> &'static str {
    match event {
        BillingAuditEvent::SubscriptionCreated { .. } => "subscription_created",
        BillingAuditEvent::PlanChanged { .. } => "plan_changed",
        BillingAuditEvent::SubscriptionCancelled { .. } => "subscription_cancelled",
        BillingAuditEvent::SubscriptionReactivated { .. } => "subscription_reactivated",
        BillingAuditEvent::InvoiceIssued { .. } => "invoice_issued",
        BillingAuditEvent::PaymentRecorded { .. } => "payment_recorded",
        BillingAuditEvent::PaymentMethodAdded { .. } => "payment_method_added",
        BillingAuditEvent::DefaultPaymentMethodChanged { .. } => "default_payment_method_changed",
        BillingAuditEvent::PaymentMethodRemoved { .. } => "payment_method_removed",
    }
}

/// Capturing audit logger for tests.
#[cfg(any(test, feature = "test-billing"))]
pub mod test {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Audit logger that records every event it sees.
    #[derive(Debug, Clone, Default)]
    pub struct CapturingAuditLogger {
        events: Arc<Mutex<Vec<BillingAuditEvent>>>,
    }

    impl CapturingAuditLogger {
        /// Create a new capturing logger.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Get the events logged so far.
        pub fn events(&self) -> Vec<BillingAuditEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl BillingAuditLogger for CapturingAuditLogger {
        async fn log(&self, event: BillingAuditEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test::CapturingAuditLogger;

    #[tokio::test]
    async fn test_noop_logger() {
        let logger = NoOpAuditLogger;
        logger
            .log(BillingAuditEvent::SubscriptionCancelled {
                user_id: "user_1".to_string(),
                subscription_id: "SUB-000001".to_string(),
            })
            .await;
        // Just verifies it doesn't panic.
    }

    #[tokio::test]
    async fn test_capturing_logger() {
        let logger = CapturingAuditLogger::new();

        logger
            .log(BillingAuditEvent::SubscriptionCreated {
                user_id: "user_1".to_string(),
                subscription_id: "SUB-000001".to_string(),
                plan_id: "family".to_string(),
            })
            .await;
        logger
            .log(BillingAuditEvent::PlanChanged {
                user_id: "user_1".to_string(),
                subscription_id: "SUB-000001".to_string(),
                old_plan_id: "family".to_string(),
                new_plan_id: "pro".to_string(),
                prorated_amount_cents: 1000,
            })
            .await;

        let events = logger.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], BillingAuditEvent::SubscriptionCreated { .. }));
        assert!(matches!(events[1], BillingAuditEvent::PlanChanged { .. }));
    }

    #[test]
    fn test_event_display_and_kind() {
        let event = BillingAuditEvent::PaymentMethodAdded {
            user_id: "user_1".to_string(),
            payment_method_id: "PM-000001".to_string(),
            card_type: "visa".to_string(),
        };
        let display = format!("{}", event);
        assert!(display.contains("user_1"));
        assert!(display.contains("PM-000001"));
        assert!(display.contains("visa"));
        assert_eq!(event_kind(&event), "payment_method_added");
    }
}
