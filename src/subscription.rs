//! Subscription lifecycle management.
//!
//! One subscription per user, moving between active and cancelled.
//! Cancellation is soft: access runs until the already-scheduled end date,
//! and "expired" is derived from that date rather than stored. Every
//! mutating operation stages its subscription, invoice, and payment writes
//! into one [`ChangeSet`](crate::store::ChangeSet) and commits it atomically.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{BillingAuditEvent, BillingAuditLogger, NoOpAuditLogger};
use crate::clock::Clock;
use crate::config::BillingConfig;
use crate::error::{BillingError, Result};
use crate::ledger::{Invoice, InvoiceStatus, Payment, PaymentKind, PaymentStatus};
use crate::payment_method::PaymentMethod;
use crate::plans::{Plan, PlanCatalog};
use crate::proration;
use crate::store::{BillingStore, ChangeSet};
use crate::tokens::TokenGenerator;
use crate::validation;

/// Stored subscription status.
///
/// Expiry is never stored; see [`Subscription::effective_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active and renewing.
    Active,
    /// Subscription is cancelled; access continues until `end_date`.
    Cancelled,
}

/// Subscription status as observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectiveStatus {
    /// Active and renewing.
    Active,
    /// Cancelled but still within the paid period.
    Cancelled,
    /// Cancelled and past the paid period.
    Expired,
}

/// A user's subscription to a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Synthetic ID (`SUB-...`).
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// The plan currently subscribed to.
    pub plan_id: String,
    /// Stored status.
    pub status: SubscriptionStatus,
    /// When the subscription started.
    pub start_date: DateTime<Utc>,
    /// Next renewal, or access expiry once cancelled.
    pub end_date: DateTime<Utc>,
    /// When the subscription was cancelled, if it was.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Why the subscription was cancelled, if it was.
    pub cancellation_reason: Option<String>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Check if the subscription is in the active state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Check if the user still has access at `now`.
    ///
    /// True for active subscriptions and for cancelled ones whose end date
    /// has not yet passed.
    #[must_use]
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        now < self.end_date
    }

    /// Project the stored status into the observed status at `now`.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> EffectiveStatus {
        match self.status {
            SubscriptionStatus::Active => EffectiveStatus::Active,
            SubscriptionStatus::Cancelled if now < self.end_date => EffectiveStatus::Cancelled,
            SubscriptionStatus::Cancelled => EffectiveStatus::Expired,
        }
    }
}

/// Outcome of a plan change or reactivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanChangeResult {
    /// The subscription after the change.
    pub subscription: Subscription,
    /// Signed proration amount in cents (positive = charged, negative =
    /// credited, zero = no ledger entry).
    pub prorated_amount_cents: i64,
    /// The invoice written for this change, if any.
    pub invoice_number: Option<String>,
}

/// Subscription lifecycle operations.
///
/// Stateless: every call takes an explicit user ID and either completes its
/// writes atomically or leaves no trace.
pub struct SubscriptionManager<S, P, K, G, A = NoOpAuditLogger> {
    store: S,
    catalog: P,
    clock: K,
    tokens: G,
    audit: A,
    config: BillingConfig,
}

impl<S, P, K, G> SubscriptionManager<S, P, K, G>
where
    S: BillingStore,
    P: PlanCatalog,
    K: Clock,
    G: TokenGenerator,
{
    /// Create a new subscription manager with default configuration.
    #[must_use]
    pub fn new(store: S, catalog: P, clock: K, tokens: G) -> Self {
        Self {
            store,
            catalog,
            clock,
            tokens,
            audit: NoOpAuditLogger,
            config: BillingConfig::default(),
        }
    }
}

impl<S, P, K, G, A> SubscriptionManager<S, P, K, G, A>
where
    S: BillingStore,
    P: PlanCatalog,
    K: Clock,
    G: TokenGenerator,
    A: BillingAuditLogger,
{
    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: BillingConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the audit logger.
    #[must_use]
    pub fn with_audit<A2: BillingAuditLogger>(
        self,
        audit: A2,
    ) -> SubscriptionManager<S, P, K, G, A2> {
        SubscriptionManager {
            store: self.store,
            catalog: self.catalog,
            clock: self.clock,
            tokens: self.tokens,
            audit,
            config: self.config,
        }
    }

    /// Get the current subscription for a user.
    pub async fn get_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        validation::validate_user_id(user_id)?;
        self.store.get_subscription(user_id).await
    }

    /// Check whether a user currently has access.
    pub async fn has_access(&self, user_id: &str) -> Result<bool> {
        let now = self.clock.now();
        match self.store.get_subscription(user_id).await? {
            Some(sub) => Ok(sub.has_access(now)),
            None => Ok(false),
        }
    }

    /// Start a subscription for a user with no remaining access.
    ///
    /// Requires a resolvable payment method: either `payment_method_id` or
    /// the user's stored default. Writes the subscription, a paid invoice
    /// at full plan price, and the settling payment in one atomic commit.
    ///
    /// # Errors
    ///
    /// - [`BillingError::AlreadySubscribed`] if the user has an active
    ///   subscription or a cancelled one with access remaining
    /// - [`BillingError::NoDefaultPaymentMethod`] if no method resolves
    pub async fn subscribe(
        &self,
        user_id: &str,
        plan_id: &str,
        payment_method_id: Option<&str>,
    ) -> Result<Subscription> {
        validation::validate_user_id(user_id)?;
        let plan = self.require_active_plan(plan_id).await?;
        let now = self.clock.now();

        if let Some(existing) = self.store.get_subscription(user_id).await? {
            if existing.is_active() || existing.has_access(now) {
                return Err(BillingError::AlreadySubscribed {
                    user_id: user_id.to_string(),
                });
            }
        }

        let method = self.resolve_payment_method(user_id, payment_method_id).await?;

        let subscription = Subscription {
            id: self.tokens.subscription_id(),
            user_id: user_id.to_string(),
            plan_id: plan.id.clone(),
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: plan.interval.advance(now),
            cancelled_at: None,
            cancellation_reason: None,
            updated_at: now,
        };

        let invoice = Invoice {
            invoice_number: self.tokens.invoice_number(),
            user_id: user_id.to_string(),
            subscription_id: Some(subscription.id.clone()),
            amount_cents: plan.price_cents,
            status: InvoiceStatus::Paid,
            description: format!("Initial subscription: {}", plan.name),
            issued_at: now,
            due_date: now,
        };

        let payment = Payment {
            transaction_id: self.tokens.charge_transaction_id(),
            user_id: user_id.to_string(),
            invoice_number: invoice.invoice_number.clone(),
            payment_method_id: method.id.clone(),
            amount_cents: plan.price_cents,
            kind: PaymentKind::Charge,
            status: PaymentStatus::Completed,
            paid_at: now,
        };

        let mut changes = ChangeSet::new().with_subscription(subscription.clone());
        changes.push_invoice(invoice.clone());
        changes.push_payment(payment.clone());
        self.store.commit(user_id, changes).await?;

        self.audit
            .log(BillingAuditEvent::SubscriptionCreated {
                user_id: user_id.to_string(),
                subscription_id: subscription.id.clone(),
                plan_id: plan.id.clone(),
            })
            .await;
        self.audit
            .log(BillingAuditEvent::InvoiceIssued {
                user_id: user_id.to_string(),
                invoice_number: invoice.invoice_number.clone(),
                amount_cents: invoice.amount_cents,
            })
            .await;
        self.audit
            .log(BillingAuditEvent::PaymentRecorded {
                user_id: user_id.to_string(),
                transaction_id: payment.transaction_id.clone(),
                amount_cents: payment.amount_cents,
            })
            .await;

        Ok(subscription)
    }

    /// Move a subscription to a different plan.
    ///
    /// Proration is computed against the current plan's price and the days
    /// remaining before `end_date`, over the fixed cycle length in
    /// [`BillingConfig`]. An upgrade writes an unpaid invoice due in
    /// [`BillingConfig::charge_due_days`]; a downgrade writes a paid invoice
    /// with a linked bookkeeping credit. A cancelled subscription is
    /// reactivated: status returns to active, the cancellation fields clear,
    /// and `end_date` moves to one interval from now. Reactivating an
    /// already-expired subscription starts a fresh paid cycle at full price.
    ///
    /// All writes land in one atomic commit with the plan reassignment.
    pub async fn change_plan(&self, user_id: &str, new_plan_id: &str) -> Result<PlanChangeResult> {
        validation::validate_user_id(user_id)?;

        let subscription = self
            .store
            .get_subscription(user_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotFound {
                user_id: user_id.to_string(),
            })?;

        if subscription.is_active() && subscription.plan_id == new_plan_id {
            return Err(BillingError::SamePlan {
                plan_id: new_plan_id.to_string(),
            });
        }

        self.apply_plan_change(subscription, new_plan_id).await
    }

    /// Resume a cancelled subscription onto the given plan.
    ///
    /// Explicit companion to [`SubscriptionManager::change_plan`] for the
    /// resume-after-cancel flow; the billing semantics are identical.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::SubscriptionNotCancelled`] if the
    /// subscription is not in the cancelled state.
    pub async fn reactivate(&self, user_id: &str, plan_id: &str) -> Result<PlanChangeResult> {
        validation::validate_user_id(user_id)?;

        let subscription = self
            .store
            .get_subscription(user_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotFound {
                user_id: user_id.to_string(),
            })?;

        if subscription.status != SubscriptionStatus::Cancelled {
            return Err(BillingError::SubscriptionNotCancelled {
                user_id: user_id.to_string(),
            });
        }

        self.apply_plan_change(subscription, plan_id).await
    }

    /// Cancel an active subscription.
    ///
    /// Soft cancellation: the end date is never touched, so access runs
    /// until the already-scheduled boundary. The reason is required and
    /// must meet the configured minimum length.
    pub async fn cancel(&self, user_id: &str, reason: &str) -> Result<Subscription> {
        validation::validate_user_id(user_id)?;
        validation::validate_cancellation_reason(reason, self.config.min_cancellation_reason_len)?;

        let subscription = self
            .store
            .get_subscription(user_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotFound {
                user_id: user_id.to_string(),
            })?;

        if !subscription.is_active() {
            return Err(BillingError::SubscriptionNotActive {
                user_id: user_id.to_string(),
            });
        }

        let now = self.clock.now();
        let mut updated = subscription;
        updated.status = SubscriptionStatus::Cancelled;
        updated.cancelled_at = Some(now);
        updated.cancellation_reason = Some(reason.trim().to_string());
        updated.updated_at = now;

        self.store
            .commit(user_id, ChangeSet::new().with_subscription(updated.clone()))
            .await?;

        self.audit
            .log(BillingAuditEvent::SubscriptionCancelled {
                user_id: user_id.to_string(),
                subscription_id: updated.id.clone(),
            })
            .await;

        Ok(updated)
    }

    /// Shared plan-change path for `change_plan` and `reactivate`.
    async fn apply_plan_change(
        &self,
        subscription: Subscription,
        new_plan_id: &str,
    ) -> Result<PlanChangeResult> {
        let user_id = subscription.user_id.clone();
        let new_plan = self.require_active_plan(new_plan_id).await?;
        let old_plan = self
            .catalog
            .get_plan(&subscription.plan_id)
            .await?
            .ok_or_else(|| BillingError::PlanNotFound {
                plan_id: subscription.plan_id.clone(),
            })?;

        let now = self.clock.now();
        let was_cancelled = subscription.status == SubscriptionStatus::Cancelled;
        let was_expired = was_cancelled && !subscription.has_access(now);

        // Proration is always computed against the end date before any
        // reactivation pushes it out.
        let prorated_amount_cents = proration::prorate(
            old_plan.price_cents,
            new_plan.price_cents,
            now,
            subscription.end_date,
            self.config.cycle_length_days,
        );

        let mut updated = subscription;
        updated.plan_id = new_plan.id.clone();
        updated.updated_at = now;
        if was_cancelled {
            updated.status = SubscriptionStatus::Active;
            updated.cancelled_at = None;
            updated.cancellation_reason = None;
            updated.end_date = new_plan.interval.advance(now);
        }

        let mut changes = ChangeSet::new().with_subscription(updated.clone());
        let mut invoice_number = None;

        if was_expired {
            // A fresh paid cycle begins; bill like a new subscription.
            let method = self.resolve_payment_method(&user_id, None).await?;
            let invoice = Invoice {
                invoice_number: self.tokens.invoice_number(),
                user_id: user_id.clone(),
                subscription_id: Some(updated.id.clone()),
                amount_cents: new_plan.price_cents,
                status: InvoiceStatus::Paid,
                description: format!("Reactivation: {}", new_plan.name),
                issued_at: now,
                due_date: now,
            };
            let payment = Payment {
                transaction_id: self.tokens.charge_transaction_id(),
                user_id: user_id.clone(),
                invoice_number: invoice.invoice_number.clone(),
                payment_method_id: method.id,
                amount_cents: new_plan.price_cents,
                kind: PaymentKind::Charge,
                status: PaymentStatus::Completed,
                paid_at: now,
            };
            invoice_number = Some(invoice.invoice_number.clone());
            changes.push_invoice(invoice);
            changes.push_payment(payment);
        } else if prorated_amount_cents > 0 {
            let invoice = Invoice {
                invoice_number: self.tokens.invoice_number(),
                user_id: user_id.clone(),
                subscription_id: Some(updated.id.clone()),
                amount_cents: prorated_amount_cents,
                status: InvoiceStatus::Unpaid,
                description: format!("Plan change: {} -> {}", old_plan.name, new_plan.name),
                issued_at: now,
                due_date: now + Duration::days(self.config.charge_due_days),
            };
            invoice_number = Some(invoice.invoice_number.clone());
            changes.push_invoice(invoice);
        } else if prorated_amount_cents < 0 {
            // Bookkeeping credit: no funds move, but the ledger records
            // the paid invoice and the credit entry that settles it.
            let method = self.resolve_payment_method(&user_id, None).await?;
            let credit_cents = prorated_amount_cents.abs();
            let invoice = Invoice {
                invoice_number: self.tokens.invoice_number(),
                user_id: user_id.clone(),
                subscription_id: Some(updated.id.clone()),
                amount_cents: credit_cents,
                status: InvoiceStatus::Paid,
                description: format!("Plan change: {} -> {}", old_plan.name, new_plan.name),
                issued_at: now,
                due_date: now,
            };
            let payment = Payment {
                transaction_id: self.tokens.credit_transaction_id(),
                user_id: user_id.clone(),
                invoice_number: invoice.invoice_number.clone(),
                payment_method_id: method.id,
                amount_cents: credit_cents,
                kind: PaymentKind::Credit,
                status: PaymentStatus::Completed,
                paid_at: now,
            };
            invoice_number = Some(invoice.invoice_number.clone());
            changes.push_invoice(invoice);
            changes.push_payment(payment);
        }

        self.store.commit(&user_id, changes).await?;

        self.audit
            .log(BillingAuditEvent::PlanChanged {
                user_id: user_id.clone(),
                subscription_id: updated.id.clone(),
                old_plan_id: old_plan.id.clone(),
                new_plan_id: new_plan.id.clone(),
                prorated_amount_cents,
            })
            .await;
        if was_cancelled {
            self.audit
                .log(BillingAuditEvent::SubscriptionReactivated {
                    user_id: user_id.clone(),
                    subscription_id: updated.id.clone(),
                    plan_id: new_plan.id.clone(),
                })
                .await;
        }

        Ok(PlanChangeResult {
            subscription: updated,
            prorated_amount_cents,
            invoice_number,
        })
    }

    /// Fetch a plan and require it to be open for purchase.
    async fn require_active_plan(&self, plan_id: &str) -> Result<Plan> {
        let plan = self
            .catalog
            .get_plan(plan_id)
            .await?
            .ok_or_else(|| BillingError::PlanNotFound {
                plan_id: plan_id.to_string(),
            })?;
        if !plan.is_active {
            return Err(BillingError::PlanInactive {
                plan_id: plan_id.to_string(),
            });
        }
        Ok(plan)
    }

    /// Resolve the payment method to charge: an explicit ID, or the
    /// stored default.
    async fn resolve_payment_method(
        &self,
        user_id: &str,
        payment_method_id: Option<&str>,
    ) -> Result<PaymentMethod> {
        match payment_method_id {
            Some(id) => self
                .store
                .get_payment_method(user_id, id)
                .await?
                .ok_or_else(|| BillingError::PaymentMethodNotFound {
                    payment_method_id: id.to_string(),
                }),
            None => {
                let methods = self.store.list_payment_methods(user_id).await?;
                methods.into_iter().find(|m| m.is_default).ok_or_else(|| {
                    BillingError::NoDefaultPaymentMethod {
                        user_id: user_id.to_string(),
                    }
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::test::FixedClock;
    use crate::payment_method::{CardType, PaymentMethod};
    use crate::plans::{InMemoryPlanCatalog, Plan, PlanInterval};
    use crate::store::test::InMemoryBillingStore;
    use crate::tokens::test::SequentialTokenGenerator;
    use chrono::TimeZone;

    fn catalog() -> InMemoryPlanCatalog {
        let mut legacy = Plan::new("legacy", "Legacy", 999);
        legacy.is_active = false;
        InMemoryPlanCatalog::new()
            .with_plan(Plan::new("basic", "Basic", 1999))
            .with_plan(Plan::new("family", "Family", 2999))
            .with_plan(Plan::new("pro", "Pro", 4999))
            .with_plan(legacy)
    }

    fn start() -> DateTime<Utc> {
        // April 15: one calendar month later is exactly 30 days away.
        Utc.with_ymd_and_hms(2024, 4, 15, 0, 0, 0).unwrap()
    }

    fn method(user_id: &str, id: &str, is_default: bool) -> PaymentMethod {
        PaymentMethod {
            id: id.to_string(),
            user_id: user_id.to_string(),
            card_holder: "Jordan Li".to_string(),
            card_type: CardType::Visa,
            last_four: "4242".to_string(),
            expiry_month: 12,
            expiry_year: 2028,
            is_default,
            created_at: start(),
        }
    }

    async fn manager_with_default_method() -> (
        SubscriptionManager<
            InMemoryBillingStore,
            InMemoryPlanCatalog,
            std::sync::Arc<FixedClock>,
            SequentialTokenGenerator,
        >,
        InMemoryBillingStore,
        std::sync::Arc<FixedClock>,
    ) {
        let store = InMemoryBillingStore::new();
        store
            .insert_payment_method("user_1", &method("user_1", "PM-SEED01", true), true)
            .await
            .unwrap();
        let clock = std::sync::Arc::new(FixedClock::at(start()));
        let manager = SubscriptionManager::new(
            store.clone(),
            catalog(),
            clock.clone(),
            SequentialTokenGenerator::new(),
        );
        (manager, store, clock)
    }

    #[tokio::test]
    async fn test_subscribe_writes_all_three_rows() {
        let (manager, store, _) = manager_with_default_method().await;

        let sub = manager.subscribe("user_1", "family", None).await.unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.plan_id, "family");
        assert_eq!(sub.start_date, start());
        assert_eq!(sub.end_date, PlanInterval::Month.advance(start()));

        let invoices = store.list_invoices("user_1").await.unwrap();
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].amount_cents, 2999);
        assert_eq!(invoices[0].status, InvoiceStatus::Paid);
        assert_eq!(invoices[0].description, "Initial subscription: Family");
        assert!(invoices[0].invoice_number.starts_with("INV-"));

        let payments = store.list_payments("user_1").await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].amount_cents, 2999);
        assert!(payments[0].transaction_id.starts_with("TXN-"));
        assert_eq!(payments[0].payment_method_id, "PM-SEED01");
    }

    #[tokio::test]
    async fn test_subscribe_requires_payment_method() {
        let store = InMemoryBillingStore::new();
        let manager = SubscriptionManager::new(
            store.clone(),
            catalog(),
            FixedClock::at(start()),
            SequentialTokenGenerator::new(),
        );

        let err = manager.subscribe("user_1", "family", None).await.unwrap_err();
        assert!(matches!(err, BillingError::NoDefaultPaymentMethod { .. }));
        assert!(store.get_subscription("user_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_rejects_unknown_and_inactive_plans() {
        let (manager, _, _) = manager_with_default_method().await;

        assert!(matches!(
            manager.subscribe("user_1", "missing", None).await.unwrap_err(),
            BillingError::PlanNotFound { .. }
        ));
        assert!(matches!(
            manager.subscribe("user_1", "legacy", None).await.unwrap_err(),
            BillingError::PlanInactive { .. }
        ));
    }

    #[tokio::test]
    async fn test_subscribe_twice_rejected_while_access_remains() {
        let (manager, _, clock) = manager_with_default_method().await;

        manager.subscribe("user_1", "family", None).await.unwrap();
        assert!(matches!(
            manager.subscribe("user_1", "pro", None).await.unwrap_err(),
            BillingError::AlreadySubscribed { .. }
        ));

        // Still rejected while a cancelled subscription retains access.
        manager
            .cancel("user_1", "switching to a cheaper option")
            .await
            .unwrap();
        assert!(matches!(
            manager.subscribe("user_1", "pro", None).await.unwrap_err(),
            BillingError::AlreadySubscribed { .. }
        ));

        // Once expired, a fresh subscribe goes through.
        clock.advance(Duration::days(45));
        let sub = manager.subscribe("user_1", "pro", None).await.unwrap();
        assert_eq!(sub.plan_id, "pro");
    }

    #[tokio::test]
    async fn test_cancel_preserves_end_date() {
        let (manager, _, clock) = manager_with_default_method().await;

        let sub = manager.subscribe("user_1", "family", None).await.unwrap();
        let end_before = sub.end_date;

        clock.advance(Duration::days(5));
        let cancelled = manager
            .cancel("user_1", "schedule no longer works for us")
            .await
            .unwrap();

        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert_eq!(cancelled.end_date, end_before);
        assert_eq!(cancelled.cancelled_at, Some(clock.now()));
        assert!(cancelled.has_access(clock.now()));
        assert_eq!(
            cancelled.effective_status(clock.now()),
            EffectiveStatus::Cancelled
        );
        assert_eq!(
            cancelled.effective_status(end_before + Duration::seconds(1)),
            EffectiveStatus::Expired
        );
    }

    #[tokio::test]
    async fn test_cancel_requires_reason_and_active_status() {
        let (manager, _, _) = manager_with_default_method().await;
        manager.subscribe("user_1", "family", None).await.unwrap();

        assert!(matches!(
            manager.cancel("user_1", "too short").await.unwrap_err(),
            BillingError::CancellationReasonTooShort { .. }
        ));

        manager
            .cancel("user_1", "schedule no longer works for us")
            .await
            .unwrap();
        assert!(matches!(
            manager
                .cancel("user_1", "cancelling a second time here")
                .await
                .unwrap_err(),
            BillingError::SubscriptionNotActive { .. }
        ));
    }

    #[tokio::test]
    async fn test_upgrade_charges_prorated_unpaid_invoice() {
        let (manager, store, clock) = manager_with_default_method().await;
        manager.subscribe("user_1", "family", None).await.unwrap();

        // 15 of 30 days used.
        clock.advance(Duration::days(15));
        let result = manager.change_plan("user_1", "pro").await.unwrap();

        assert_eq!(result.prorated_amount_cents, 1000);
        assert_eq!(result.subscription.plan_id, "pro");
        assert_eq!(result.subscription.status, SubscriptionStatus::Active);

        let invoices = store.list_invoices("user_1").await.unwrap();
        let change_invoice = invoices
            .iter()
            .find(|i| i.invoice_number == result.invoice_number.clone().unwrap())
            .unwrap();
        assert_eq!(change_invoice.amount_cents, 1000);
        assert_eq!(change_invoice.status, InvoiceStatus::Unpaid);
        assert_eq!(change_invoice.due_date, clock.now() + Duration::days(7));
        assert_eq!(change_invoice.description, "Plan change: Family -> Pro");

        // No payment for an unpaid charge.
        assert_eq!(store.list_payments("user_1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_downgrade_credits_with_linked_credit_payment() {
        let (manager, store, clock) = manager_with_default_method().await;
        manager.subscribe("user_1", "family", None).await.unwrap();

        clock.advance(Duration::days(15));
        let result = manager.change_plan("user_1", "basic").await.unwrap();

        assert_eq!(result.prorated_amount_cents, -500);

        let invoices = store.list_invoices("user_1").await.unwrap();
        let credit_invoice = invoices
            .iter()
            .find(|i| i.invoice_number == result.invoice_number.clone().unwrap())
            .unwrap();
        assert_eq!(credit_invoice.amount_cents, 500);
        assert_eq!(credit_invoice.status, InvoiceStatus::Paid);

        let payments = store.list_payments("user_1").await.unwrap();
        let credit = payments
            .iter()
            .find(|p| p.invoice_number == credit_invoice.invoice_number)
            .unwrap();
        assert!(credit.transaction_id.starts_with("CREDIT-"));
        assert_eq!(credit.kind, PaymentKind::Credit);
        assert_eq!(credit.amount_cents, 500);
    }

    #[tokio::test]
    async fn test_change_to_same_plan_rejected_while_active() {
        let (manager, _, _) = manager_with_default_method().await;
        manager.subscribe("user_1", "family", None).await.unwrap();

        assert!(matches!(
            manager.change_plan("user_1", "family").await.unwrap_err(),
            BillingError::SamePlan { .. }
        ));
    }

    #[tokio::test]
    async fn test_reactivation_with_access_prorates_and_extends() {
        let (manager, _, clock) = manager_with_default_method().await;
        manager.subscribe("user_1", "family", None).await.unwrap();
        manager
            .cancel("user_1", "taking a break for the summer")
            .await
            .unwrap();

        clock.advance(Duration::days(15));
        let result = manager.change_plan("user_1", "pro").await.unwrap();

        // Prorated against the 15 days that remained before the push.
        assert_eq!(result.prorated_amount_cents, 1000);
        let sub = result.subscription;
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.cancelled_at.is_none());
        assert!(sub.cancellation_reason.is_none());
        assert_eq!(sub.end_date, PlanInterval::Month.advance(clock.now()));
    }

    #[tokio::test]
    async fn test_expired_reactivation_bills_full_price() {
        let (manager, store, clock) = manager_with_default_method().await;
        manager.subscribe("user_1", "family", None).await.unwrap();
        manager
            .cancel("user_1", "taking a break for the summer")
            .await
            .unwrap();

        // Past the end date: access has lapsed.
        clock.advance(Duration::days(45));
        assert!(!manager.has_access("user_1").await.unwrap());

        let result = manager.reactivate("user_1", "pro").await.unwrap();
        assert_eq!(result.prorated_amount_cents, 0);

        let sub = result.subscription;
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert!(sub.cancelled_at.is_none());
        assert!(sub.cancellation_reason.is_none());
        assert_eq!(sub.end_date, PlanInterval::Month.advance(clock.now()));

        let invoice = store
            .get_invoice("user_1", &result.invoice_number.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(invoice.amount_cents, 4999);
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.description, "Reactivation: Pro");

        let payments = store.list_payments("user_1").await.unwrap();
        assert!(payments
            .iter()
            .any(|p| p.invoice_number == invoice.invoice_number
                && p.transaction_id.starts_with("TXN-")));
    }

    #[tokio::test]
    async fn test_reactivate_requires_cancelled_status() {
        let (manager, _, _) = manager_with_default_method().await;
        manager.subscribe("user_1", "family", None).await.unwrap();

        assert!(matches!(
            manager.reactivate("user_1", "pro").await.unwrap_err(),
            BillingError::SubscriptionNotCancelled { .. }
        ));
    }
}
