//! Usage metering against plan limits.
//!
//! Pure projection: callers supply the current resource counts and the
//! meter reports, per metric, how much of the subscribed plan's allowance
//! is consumed. Nothing here enforces limits; enforcement belongs to the
//! features that consume the resources.

use serde::{Deserialize, Serialize};

use crate::error::{BillingError, Result};
use crate::plans::{PlanCatalog, PlanLimits, ResourceLimit};
use crate::store::BillingStore;

/// Percentage reported for metrics without a finite positive limit.
///
/// Unlimited (and zero) limits report 100% rather than 0%. Surprising, but
/// long-standing: dashboards read it as "allowance fully available" and
/// clients key off [`ResourceLimit::is_unlimited`] for display. Kept as-is.
pub const UNLIMITED_PERCENTAGE: u8 = 100;

/// Current resource counts for one user, supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounts {
    /// Child profiles on the account.
    pub children: u64,
    /// Sessions started in the current calendar month.
    pub sessions_this_month: u64,
    /// Storage consumed, in megabytes.
    pub storage_mb: u64,
}

/// Consumption of a single metric against its plan limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricUsage {
    /// Current count.
    pub used: u64,
    /// The plan's limit for this metric.
    pub limit: ResourceLimit,
    /// Consumed share of the limit, rounded to the nearest percent and
    /// capped at 100.
    pub percentage: u8,
}

impl MetricUsage {
    /// Check whether the count has reached or passed the limit.
    #[must_use]
    pub fn at_limit(&self) -> bool {
        !self.limit.allows(self.used)
    }
}

/// Per-metric usage for a user's subscribed plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    pub children: MetricUsage,
    pub sessions: MetricUsage,
    pub storage: MetricUsage,
}

fn meter_metric(used: u64, limit: ResourceLimit) -> MetricUsage {
    let percentage = match limit {
        ResourceLimit::Limited(max) if max > 0 => {
            // Round half-up to the nearest percent.
            let pct = used.saturating_mul(100).saturating_add(max / 2) / max;
            pct.min(100) as u8
        }
        _ => UNLIMITED_PERCENTAGE,
    };
    MetricUsage {
        used,
        limit,
        percentage,
    }
}

/// Meter the given counts against a plan's limits.
#[must_use]
pub fn meter(limits: &PlanLimits, counts: &UsageCounts) -> UsageReport {
    UsageReport {
        children: meter_metric(counts.children, limits.children),
        sessions: meter_metric(counts.sessions_this_month, limits.sessions),
        storage: meter_metric(counts.storage_mb, limits.storage_mb),
    }
}

/// Usage queries resolved through a user's subscription.
pub struct UsageMeter<S, P> {
    store: S,
    catalog: P,
}

impl<S, P> UsageMeter<S, P>
where
    S: BillingStore,
    P: PlanCatalog,
{
    /// Create a new usage meter.
    #[must_use]
    pub fn new(store: S, catalog: P) -> Self {
        Self { store, catalog }
    }

    /// Meter the given counts against the user's subscribed plan.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError::SubscriptionNotFound`] if the user has no
    /// subscription, or [`BillingError::PlanNotFound`] if the subscribed
    /// plan is missing from the catalog.
    pub async fn compute_usage(&self, user_id: &str, counts: &UsageCounts) -> Result<UsageReport> {
        let subscription = self
            .store
            .get_subscription(user_id)
            .await?
            .ok_or_else(|| BillingError::SubscriptionNotFound {
                user_id: user_id.to_string(),
            })?;
        let plan = self
            .catalog
            .get_plan(&subscription.plan_id)
            .await?
            .ok_or_else(|| BillingError::PlanNotFound {
                plan_id: subscription.plan_id.clone(),
            })?;
        Ok(meter(&plan.limits, counts))
    }
}
