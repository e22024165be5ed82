//! Billing storage trait and staged-write commits.
//!
//! The managers never write records one at a time. Each mutating operation
//! stages its subscription, invoice, and payment rows into a [`ChangeSet`]
//! and hands it to [`BillingStore::commit`], which applies everything or
//! nothing. Payment-method mutations are single atomic operations with the
//! default-flag mechanics built in, so the single-default invariant can
//! never be observed broken.

use async_trait::async_trait;

use crate::error::Result;
use crate::ledger::{Invoice, Payment};
use crate::payment_method::PaymentMethod;
use crate::subscription::Subscription;

/// Staged writes for one atomic commit.
///
/// At most one subscription upsert, plus any number of appended invoices
/// and payments.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Subscription to insert or replace, keyed by its user.
    pub subscription: Option<Subscription>,
    /// Invoices to append to the ledger.
    pub invoices: Vec<Invoice>,
    /// Payments to append to the ledger.
    pub payments: Vec<Payment>,
}

impl ChangeSet {
    /// Create an empty change set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a subscription upsert.
    #[must_use]
    pub fn with_subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Stage an invoice append.
    pub fn push_invoice(&mut self, invoice: Invoice) {
        self.invoices.push(invoice);
    }

    /// Stage a payment append.
    pub fn push_payment(&mut self, payment: Payment) {
        self.payments.push(payment);
    }

    /// Check whether anything is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscription.is_none() && self.invoices.is_empty() && self.payments.is_empty()
    }
}

/// Storage backend for billing state.
///
/// All reads and writes are scoped to a user ID; a record owned by another
/// user behaves as if it does not exist. Implementations must make
/// [`commit`](BillingStore::commit) all-or-nothing and must keep the
/// payment-method default flag consistent inside each mutating call.
#[async_trait]
pub trait BillingStore: Send + Sync {
    /// Get a user's subscription, if any.
    async fn get_subscription(&self, user_id: &str) -> Result<Option<Subscription>>;

    /// List a user's payment methods in insertion order.
    async fn list_payment_methods(&self, user_id: &str) -> Result<Vec<PaymentMethod>>;

    /// Get one of a user's payment methods by ID.
    async fn get_payment_method(
        &self,
        user_id: &str,
        payment_method_id: &str,
    ) -> Result<Option<PaymentMethod>>;

    /// List a user's invoices in insertion order.
    async fn list_invoices(&self, user_id: &str) -> Result<Vec<Invoice>>;

    /// Get one of a user's invoices by number.
    async fn get_invoice(&self, user_id: &str, invoice_number: &str) -> Result<Option<Invoice>>;

    /// List a user's payments in insertion order.
    async fn list_payments(&self, user_id: &str) -> Result<Vec<Payment>>;

    /// Insert a payment method, resolving the default flag atomically.
    ///
    /// The user's first method always becomes the default. When
    /// `make_default` is set, the flag is cleared from every other method
    /// in the same operation. Returns the method as stored.
    async fn insert_payment_method(
        &self,
        user_id: &str,
        method: &PaymentMethod,
        make_default: bool,
    ) -> Result<PaymentMethod>;

    /// Atomically move the default flag to the given method.
    async fn set_default_payment_method(
        &self,
        user_id: &str,
        payment_method_id: &str,
    ) -> Result<()>;

    /// Delete a payment method. If it was the default, the first remaining
    /// method (by insertion order) is promoted in the same operation.
    async fn delete_payment_method(&self, user_id: &str, payment_method_id: &str) -> Result<()>;

    /// Apply a staged change set atomically.
    ///
    /// Either every staged row is persisted or none is. A failure must
    /// leave the store exactly as it was before the call.
    async fn commit(&self, user_id: &str, changes: ChangeSet) -> Result<()>;
}

#[async_trait]
impl<S: BillingStore> BillingStore for std::sync::Arc<S> {
    async fn get_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        (**self).get_subscription(user_id).await
    }

    async fn list_payment_methods(&self, user_id: &str) -> Result<Vec<PaymentMethod>> {
        (**self).list_payment_methods(user_id).await
    }

    async fn get_payment_method(
        &self,
        user_id: &str,
        payment_method_id: &str,
    ) -> Result<Option<PaymentMethod>> {
        (**self).get_payment_method(user_id, payment_method_id).await
    }

    async fn list_invoices(&self, user_id: &str) -> Result<Vec<Invoice>> {
        (**self).list_invoices(user_id).await
    }

    async fn get_invoice(&self, user_id: &str, invoice_number: &str) -> Result<Option<Invoice>> {
        (**self).get_invoice(user_id, invoice_number).await
    }

    async fn list_payments(&self, user_id: &str) -> Result<Vec<Payment>> {
        (**self).list_payments(user_id).await
    }

    async fn insert_payment_method(
        &self,
        user_id: &str,
        method: &PaymentMethod,
        make_default: bool,
    ) -> Result<PaymentMethod> {
        (**self)
            .insert_payment_method(user_id, method, make_default)
            .await
    }

    async fn set_default_payment_method(
        &self,
        user_id: &str,
        payment_method_id: &str,
    ) -> Result<()> {
        (**self)
            .set_default_payment_method(user_id, payment_method_id)
            .await
    }

    async fn delete_payment_method(&self, user_id: &str, payment_method_id: &str) -> Result<()> {
        (**self)
            .delete_payment_method(user_id, payment_method_id)
            .await
    }

    async fn commit(&self, user_id: &str, changes: ChangeSet) -> Result<()> {
        (**self).commit(user_id, changes).await
    }
}

/// In-memory store for tests.
#[cfg(any(test, feature = "test-billing"))]
pub mod test {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, RwLock};

    use super::*;
    use crate::error::BillingError;

    /// Which kind of staged write the next commit should fail on.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailurePoint {
        /// Fail commits that stage a subscription write.
        Subscription,
        /// Fail commits that stage an invoice write.
        Invoice,
        /// Fail commits that stage a payment write.
        Payment,
    }

    impl FailurePoint {
        fn matches(self, changes: &ChangeSet) -> bool {
            match self {
                Self::Subscription => changes.subscription.is_some(),
                Self::Invoice => !changes.invoices.is_empty(),
                Self::Payment => !changes.payments.is_empty(),
            }
        }
    }

    /// Everything written through commit, behind one lock so a reader can
    /// never observe a half-applied change set.
    #[derive(Default)]
    struct State {
        subscriptions: HashMap<String, Subscription>,
        invoices: HashMap<String, Vec<Invoice>>,
        payments: HashMap<String, Vec<Payment>>,
    }

    #[derive(Default)]
    struct Inner {
        state: RwLock<State>,
        payment_methods: RwLock<HashMap<String, Vec<PaymentMethod>>>,
        fail_next: Mutex<Option<FailurePoint>>,
    }

    /// In-memory [`BillingStore`] with one-shot fault injection.
    ///
    /// Clones share state, so a test can hand the store to a manager and
    /// keep a handle for direct inspection.
    #[derive(Clone, Default)]
    pub struct InMemoryBillingStore {
        inner: Arc<Inner>,
    }

    impl InMemoryBillingStore {
        /// Create an empty store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Arm the store to reject the next commit that stages a write of
        /// the given kind. Consumed on the first match, whether or not
        /// the commit would otherwise have succeeded.
        pub fn fail_next_commit(&self, point: FailurePoint) {
            *self.inner.fail_next.lock().unwrap() = Some(point);
        }

        /// Seed a subscription directly, bypassing commit.
        pub fn seed_subscription(&self, subscription: Subscription) {
            self.inner
                .state
                .write()
                .unwrap()
                .subscriptions
                .insert(subscription.user_id.clone(), subscription);
        }
    }

    #[async_trait]
    impl BillingStore for InMemoryBillingStore {
        async fn get_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
            Ok(self
                .inner
                .state
                .read()
                .unwrap()
                .subscriptions
                .get(user_id)
                .cloned())
        }

        async fn list_payment_methods(&self, user_id: &str) -> Result<Vec<PaymentMethod>> {
            Ok(self
                .inner
                .payment_methods
                .read()
                .unwrap()
                .get(user_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_payment_method(
            &self,
            user_id: &str,
            payment_method_id: &str,
        ) -> Result<Option<PaymentMethod>> {
            Ok(self
                .inner
                .payment_methods
                .read()
                .unwrap()
                .get(user_id)
                .and_then(|methods| methods.iter().find(|m| m.id == payment_method_id).cloned()))
        }

        async fn list_invoices(&self, user_id: &str) -> Result<Vec<Invoice>> {
            Ok(self
                .inner
                .state
                .read()
                .unwrap()
                .invoices
                .get(user_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_invoice(
            &self,
            user_id: &str,
            invoice_number: &str,
        ) -> Result<Option<Invoice>> {
            Ok(self
                .inner
                .state
                .read()
                .unwrap()
                .invoices
                .get(user_id)
                .and_then(|invoices| {
                    invoices
                        .iter()
                        .find(|i| i.invoice_number == invoice_number)
                        .cloned()
                }))
        }

        async fn list_payments(&self, user_id: &str) -> Result<Vec<Payment>> {
            Ok(self
                .inner
                .state
                .read()
                .unwrap()
                .payments
                .get(user_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn insert_payment_method(
            &self,
            user_id: &str,
            method: &PaymentMethod,
            make_default: bool,
        ) -> Result<PaymentMethod> {
            let mut all = self.inner.payment_methods.write().unwrap();
            let methods = all.entry(user_id.to_string()).or_default();

            let mut stored = method.clone();
            stored.is_default = make_default || methods.is_empty();
            if stored.is_default {
                for existing in methods.iter_mut() {
                    existing.is_default = false;
                }
            }
            methods.push(stored.clone());
            Ok(stored)
        }

        async fn set_default_payment_method(
            &self,
            user_id: &str,
            payment_method_id: &str,
        ) -> Result<()> {
            let mut all = self.inner.payment_methods.write().unwrap();
            let methods = all.entry(user_id.to_string()).or_default();
            if !methods.iter().any(|m| m.id == payment_method_id) {
                return Err(BillingError::PaymentMethodNotFound {
                    payment_method_id: payment_method_id.to_string(),
                });
            }
            for method in methods.iter_mut() {
                method.is_default = method.id == payment_method_id;
            }
            Ok(())
        }

        async fn delete_payment_method(
            &self,
            user_id: &str,
            payment_method_id: &str,
        ) -> Result<()> {
            let mut all = self.inner.payment_methods.write().unwrap();
            let methods = all.entry(user_id.to_string()).or_default();
            let position = methods
                .iter()
                .position(|m| m.id == payment_method_id)
                .ok_or_else(|| BillingError::PaymentMethodNotFound {
                    payment_method_id: payment_method_id.to_string(),
                })?;

            let removed = methods.remove(position);
            if removed.is_default {
                if let Some(first) = methods.first_mut() {
                    first.is_default = true;
                }
            }
            Ok(())
        }

        async fn commit(&self, user_id: &str, changes: ChangeSet) -> Result<()> {
            // Fault injection is evaluated before any write, so a failed
            // commit leaves the store untouched.
            {
                let mut fail_next = self.inner.fail_next.lock().unwrap();
                if let Some(point) = *fail_next {
                    if point.matches(&changes) {
                        *fail_next = None;
                        return Err(BillingError::TransactionFailure {
                            operation: "commit".to_string(),
                            message: format!("injected failure at {point:?} write"),
                        });
                    }
                }
            }

            // All writes land under one lock, so concurrent readers see
            // either the whole change set or none of it.
            let mut state = self.inner.state.write().unwrap();
            if let Some(subscription) = changes.subscription {
                state
                    .subscriptions
                    .insert(user_id.to_string(), subscription);
            }
            if !changes.invoices.is_empty() {
                state
                    .invoices
                    .entry(user_id.to_string())
                    .or_default()
                    .extend(changes.invoices);
            }
            if !changes.payments.is_empty() {
                state
                    .payments
                    .entry(user_id.to_string())
                    .or_default()
                    .extend(changes.payments);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test::{FailurePoint, InMemoryBillingStore};
    use super::*;
    use crate::ledger::{InvoiceStatus, PaymentKind, PaymentStatus};
    use crate::subscription::{Subscription, SubscriptionStatus};
    use chrono::{Duration, TimeZone, Utc};

    fn subscription(user_id: &str) -> Subscription {
        let now = Utc.with_ymd_and_hms(2024, 4, 15, 0, 0, 0).unwrap();
        Subscription {
            id: "SUB-000001".to_string(),
            user_id: user_id.to_string(),
            plan_id: "family".to_string(),
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: now + Duration::days(30),
            cancelled_at: None,
            cancellation_reason: None,
            updated_at: now,
        }
    }

    fn invoice(user_id: &str, number: &str) -> Invoice {
        let now = Utc.with_ymd_and_hms(2024, 4, 15, 0, 0, 0).unwrap();
        Invoice {
            invoice_number: number.to_string(),
            user_id: user_id.to_string(),
            subscription_id: Some("SUB-000001".to_string()),
            amount_cents: 2999,
            status: InvoiceStatus::Paid,
            description: "Initial subscription: Family".to_string(),
            issued_at: now,
            due_date: now,
        }
    }

    fn payment(user_id: &str, invoice_number: &str) -> Payment {
        let now = Utc.with_ymd_and_hms(2024, 4, 15, 0, 0, 0).unwrap();
        Payment {
            transaction_id: "TXN-000001".to_string(),
            user_id: user_id.to_string(),
            invoice_number: invoice_number.to_string(),
            payment_method_id: "PM-000001".to_string(),
            amount_cents: 2999,
            kind: PaymentKind::Charge,
            status: PaymentStatus::Completed,
            paid_at: now,
        }
    }

    #[tokio::test]
    async fn test_commit_applies_every_staged_row() {
        let store = InMemoryBillingStore::new();

        let mut changes = ChangeSet::new().with_subscription(subscription("user_1"));
        changes.push_invoice(invoice("user_1", "INV-000001"));
        changes.push_payment(payment("user_1", "INV-000001"));
        store.commit("user_1", changes).await.unwrap();

        assert!(store.get_subscription("user_1").await.unwrap().is_some());
        assert_eq!(store.list_invoices("user_1").await.unwrap().len(), 1);
        assert_eq!(store.list_payments("user_1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_commit_persists_nothing() {
        let store = InMemoryBillingStore::new();
        store.fail_next_commit(FailurePoint::Payment);

        let mut changes = ChangeSet::new().with_subscription(subscription("user_1"));
        changes.push_invoice(invoice("user_1", "INV-000001"));
        changes.push_payment(payment("user_1", "INV-000001"));
        let err = store.commit("user_1", changes.clone()).await.unwrap_err();
        assert!(err.is_transaction_failure());

        assert!(store.get_subscription("user_1").await.unwrap().is_none());
        assert!(store.list_invoices("user_1").await.unwrap().is_empty());
        assert!(store.list_payments("user_1").await.unwrap().is_empty());

        // The failure point is one-shot: the retry goes through.
        store.commit("user_1", changes).await.unwrap();
        assert!(store.get_subscription("user_1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_armed_point_ignores_unmatched_commits() {
        let store = InMemoryBillingStore::new();
        store.fail_next_commit(FailurePoint::Payment);

        // No payment staged, so the armed point does not fire.
        store
            .commit(
                "user_1",
                ChangeSet::new().with_subscription(subscription("user_1")),
            )
            .await
            .unwrap();
        assert!(store.get_subscription("user_1").await.unwrap().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_commit_is_atomic_to_concurrent_readers() {
        let store = InMemoryBillingStore::new();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    let user = format!("user_{i}");
                    let mut changes =
                        ChangeSet::new().with_subscription(subscription(&user));
                    changes.push_invoice(invoice(&user, "INV-000001"));
                    changes.push_payment(payment(&user, "INV-000001"));
                    store.commit(&user, changes).await.unwrap();
                }
            })
        };

        let reader = {
            let store = store.clone();
            tokio::spawn(async move {
                // A visible subscription implies its invoice and payment
                // from the same commit are visible too.
                for _ in 0..50 {
                    for i in 0..200 {
                        let user = format!("user_{i}");
                        if store.get_subscription(&user).await.unwrap().is_some() {
                            assert!(
                                !store.list_invoices(&user).await.unwrap().is_empty(),
                                "subscription visible before its invoice"
                            );
                            assert!(
                                !store.list_payments(&user).await.unwrap().is_empty(),
                                "subscription visible before its payment"
                            );
                        }
                    }
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_records_are_user_scoped() {
        let store = InMemoryBillingStore::new();

        let mut changes = ChangeSet::new();
        changes.push_invoice(invoice("user_1", "INV-000001"));
        store.commit("user_1", changes).await.unwrap();

        assert!(store
            .get_invoice("user_2", "INV-000001")
            .await
            .unwrap()
            .is_none());
        assert!(store.list_invoices("user_2").await.unwrap().is_empty());
    }
}
