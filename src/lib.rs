//! Classbill - subscription billing for family learning accounts
//!
//! Classbill provides the billing core for a per-family subscription
//! service: a plan catalog, a subscription lifecycle with linear proration,
//! an append-only invoice and payment ledger, tokenized payment method
//! storage, and usage metering against plan limits.
//!
//! # Features
//!
//! - **Plans**: tiered plan catalog with per-metric resource limits
//! - **Subscriptions**: subscribe, change plan, cancel, reactivate, with
//!   soft cancellation and derived expiry
//! - **Proration**: fixed-cycle linear proration in integer cents
//! - **Ledger**: append-only invoices and payments with derived overdue
//! - **Payment Methods**: card records reduced to type + last four, with
//!   a single-default invariant
//! - **Usage**: per-metric consumption against the subscribed plan
//!
//! Storage is abstracted behind [`BillingStore`], clocks behind [`Clock`],
//! and ID generation behind [`TokenGenerator`], so every date- and
//! ID-sensitive behavior is testable. All money is integer cents.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use classbill::{
//!     InMemoryPlanCatalog, Plan, SubscriptionManager, SystemClock, UuidTokenGenerator,
//! };
//!
//! # async fn run(store: impl classbill::BillingStore) -> classbill::Result<()> {
//! classbill::init_tracing();
//!
//! let catalog = InMemoryPlanCatalog::new()
//!     .with_plan(Plan::new("family", "Family", 2999));
//!
//! let subscriptions =
//!     SubscriptionManager::new(store, catalog, SystemClock, UuidTokenGenerator);
//!
//! let sub = subscriptions.subscribe("user_1", "family", None).await?;
//! println!("subscribed until {}", sub.end_date);
//! # Ok(())
//! # }
//! ```

#![allow(async_fn_in_trait)] // audit logger trait stays a plain async trait

pub mod audit;
mod clock;
mod config;
mod error;
pub mod ledger;
pub mod payment_method;
pub mod plans;
pub mod proration;
pub mod store;
pub mod subscription;
mod tokens;
pub mod usage;
pub mod validation;

// Re-exports for public API
pub use audit::{BillingAuditEvent, BillingAuditLogger, NoOpAuditLogger, TracingAuditLogger};
pub use clock::{Clock, SystemClock};
pub use config::BillingConfig;
pub use error::{BillingError, ErrorKind, Result};
pub use ledger::{
    DisplayedInvoiceStatus, Invoice, InvoiceProjection, InvoiceStatus, LedgerManager, Payment,
    PaymentKind, PaymentStatus,
};
pub use payment_method::{CardType, NewCard, PaymentMethod, PaymentMethodManager};
pub use plans::{InMemoryPlanCatalog, Plan, PlanCatalog, PlanInterval, PlanLimits, ResourceLimit};
pub use store::{BillingStore, ChangeSet};
pub use subscription::{
    EffectiveStatus, PlanChangeResult, Subscription, SubscriptionManager, SubscriptionStatus,
};
pub use tokens::{TokenGenerator, UuidTokenGenerator};
pub use usage::{MetricUsage, UsageCounts, UsageMeter, UsageReport, UNLIMITED_PERCENTAGE};

#[cfg(any(test, feature = "test-billing"))]
pub use audit::test::CapturingAuditLogger;
#[cfg(any(test, feature = "test-billing"))]
pub use clock::test::FixedClock;
#[cfg(any(test, feature = "test-billing"))]
pub use store::test::{FailurePoint, InMemoryBillingStore};
#[cfg(any(test, feature = "test-billing"))]
pub use tokens::test::SequentialTokenGenerator;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging with sensible defaults
///
/// Call this early, typically in main(), before constructing managers.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "info", "debug", "classbill=debug")
/// - `CLASSBILL_LOG_JSON`: Set to "true" for JSON formatted logs
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json_logs = std::env::var("CLASSBILL_LOG_JSON")
        .map(|v| v.parse::<bool>().unwrap_or(false))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
