//! Invoice and payment ledger.
//!
//! Append-only records of amounts owed ([`Invoice`]) and amounts collected
//! ([`Payment`]). Invoices transition unpaid → paid exactly once; nothing in
//! the ledger is ever deleted. "Overdue" is a read-time projection, never a
//! stored status, so clock skew cannot leave a stale flag behind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{BillingError, Result};
use crate::store::BillingStore;

/// Stored invoice status.
///
/// Only these two states are persisted. Overdue is derived; see
/// [`Invoice::display_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Amount is owed.
    Unpaid,
    /// Amount has been collected (or credited).
    Paid,
}

/// Invoice status as presented to callers, including the derived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayedInvoiceStatus {
    /// Amount is owed and the due date has not passed.
    Unpaid,
    /// Amount has been collected.
    Paid,
    /// Amount is owed and the due date has passed.
    Overdue,
}

/// An amount owed, linked to a user and optionally a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Human-readable unique number (`INV-...`), assigned at creation.
    pub invoice_number: String,
    /// Owning user.
    pub user_id: String,
    /// The subscription this invoice settles, if any.
    pub subscription_id: Option<String>,
    /// Amount in cents, always >= 0. Credits are positive amounts on a
    /// paid invoice with a credit payment attached.
    pub amount_cents: i64,
    /// Stored status.
    pub status: InvoiceStatus,
    /// What this invoice is for.
    pub description: String,
    /// When the invoice was created.
    pub issued_at: DateTime<Utc>,
    /// When payment is due.
    pub due_date: DateTime<Utc>,
}

impl Invoice {
    /// Project the stored status into the displayed status at `now`.
    #[must_use]
    pub fn display_status(&self, now: DateTime<Utc>) -> DisplayedInvoiceStatus {
        match self.status {
            InvoiceStatus::Paid => DisplayedInvoiceStatus::Paid,
            InvoiceStatus::Unpaid if now > self.due_date => DisplayedInvoiceStatus::Overdue,
            InvoiceStatus::Unpaid => DisplayedInvoiceStatus::Unpaid,
        }
    }

    /// Check if this invoice is unpaid past its due date at `now`.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.display_status(now) == DisplayedInvoiceStatus::Overdue
    }
}

/// What a payment represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Funds collected from the customer (`TXN-` transaction).
    Charge,
    /// Bookkeeping credit entry; no funds move (`CREDIT-` transaction).
    Credit,
}

/// Payment status. Only settled payments are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The payment settled.
    Completed,
}

/// An amount collected (or credited) against exactly one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Synthetic transaction ID (`TXN-...` or `CREDIT-...`).
    pub transaction_id: String,
    /// Owning user.
    pub user_id: String,
    /// The invoice this payment settles.
    pub invoice_number: String,
    /// The payment method used (or referenced, for credits).
    pub payment_method_id: String,
    /// Amount in cents, always >= 0.
    pub amount_cents: i64,
    /// Charge or bookkeeping credit.
    pub kind: PaymentKind,
    /// Settlement status.
    pub status: PaymentStatus,
    /// When the payment settled.
    pub paid_at: DateTime<Utc>,
}

/// An invoice together with its status projected at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceProjection {
    /// The stored invoice.
    pub invoice: Invoice,
    /// Status including the derived overdue state.
    pub status: DisplayedInvoiceStatus,
}

/// Read-side queries over the ledger.
///
/// All queries are user-scoped; an invoice that belongs to another user is
/// reported as not found, never leaked.
pub struct LedgerManager<S: BillingStore, K: Clock> {
    store: S,
    clock: K,
}

impl<S: BillingStore, K: Clock> LedgerManager<S, K> {
    /// Create a new ledger manager.
    #[must_use]
    pub fn new(store: S, clock: K) -> Self {
        Self { store, clock }
    }

    /// List a user's invoices, newest first, with projected statuses.
    pub async fn list_invoices(&self, user_id: &str) -> Result<Vec<InvoiceProjection>> {
        let now = self.clock.now();
        let mut invoices = self.store.list_invoices(user_id).await?;
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(invoices
            .into_iter()
            .map(|invoice| {
                let status = invoice.display_status(now);
                InvoiceProjection { invoice, status }
            })
            .collect())
    }

    /// Get one invoice by number, with its projected status.
    pub async fn get_invoice(
        &self,
        user_id: &str,
        invoice_number: &str,
    ) -> Result<InvoiceProjection> {
        let invoice = self
            .store
            .get_invoice(user_id, invoice_number)
            .await?
            .ok_or_else(|| BillingError::InvoiceNotFound {
                invoice_number: invoice_number.to_string(),
            })?;
        let status = invoice.display_status(self.clock.now());
        Ok(InvoiceProjection { invoice, status })
    }

    /// List a user's payments, newest first.
    pub async fn list_payments(&self, user_id: &str) -> Result<Vec<Payment>> {
        let mut payments = self.store.list_payments(user_id).await?;
        payments.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));
        Ok(payments)
    }
}
