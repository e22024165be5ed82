//! Plan catalog: subscription tiers, pricing, and resource limits.
//!
//! Plans are a read-only dependency of every manager in this crate. A plan
//! referenced by a live subscription is treated as immutable; repricing a
//! tier means publishing a new plan, not editing one in place.

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A subscription tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan identifier (e.g. "family", "tutor-pro").
    pub id: String,
    /// Display name shown to users.
    pub name: String,
    /// Price in currency minor units (cents).
    pub price_cents: i64,
    /// Currency code (e.g. "usd").
    pub currency: String,
    /// Billing interval.
    pub interval: PlanInterval,
    /// Resource limits for this plan.
    pub limits: PlanLimits,
    /// Features available on this plan, in display order.
    pub features: Vec<String>,
    /// Whether the plan is open for purchase.
    pub is_active: bool,
    /// Sort order for display.
    pub sort_order: i32,
}

impl Plan {
    /// Create a plan with minimal required fields.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, price_cents: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price_cents,
            currency: "usd".to_string(),
            interval: PlanInterval::Month,
            limits: PlanLimits::default(),
            features: Vec::new(),
            is_active: true,
            sort_order: 0,
        }
    }

    /// Check if this plan lists a specific feature.
    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Get the price formatted for display (e.g. "$9.99").
    #[must_use]
    pub fn formatted_price(&self) -> String {
        let symbol = match self.currency.as_str() {
            "usd" => "$",
            "gbp" => "£",
            "eur" => "€",
            _ => self.currency.as_str(),
        };
        let units = self.price_cents as f64 / 100.0;
        format!("{}{:.2}", symbol, units)
    }
}

/// Billing interval for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanInterval {
    /// Billed monthly.
    Month,
    /// Billed yearly.
    Year,
}

impl PlanInterval {
    /// Convert from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "year" | "yearly" | "annual" => Self::Year,
            _ => Self::Month,
        }
    }

    /// Convert to string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// The renewal boundary one interval after `from`.
    ///
    /// Uses calendar months, clamping to the last day of shorter months
    /// (Jan 31 + 1 month = Feb 28/29).
    #[must_use]
    pub fn advance(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let months = match self {
            Self::Month => Months::new(1),
            Self::Year => Months::new(12),
        };
        from.checked_add_months(months).unwrap_or(from)
    }
}

impl std::fmt::Display for PlanInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A per-metric resource cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLimit {
    /// Capped at the given count.
    Limited(u64),
    /// No cap.
    Unlimited,
}

impl ResourceLimit {
    /// Check whether a usage count fits under this limit.
    #[must_use]
    pub fn allows(&self, count: u64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(max) => count < *max,
        }
    }

    /// Check if this limit is unlimited.
    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

impl std::fmt::Display for ResourceLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limited(max) => write!(f, "{}", max),
            Self::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Resource limits for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Maximum number of children on the account.
    pub children: ResourceLimit,
    /// Maximum sessions per calendar month.
    pub sessions: ResourceLimit,
    /// Maximum storage in megabytes.
    pub storage_mb: ResourceLimit,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            children: ResourceLimit::Unlimited,
            sessions: ResourceLimit::Unlimited,
            storage_mb: ResourceLimit::Unlimited,
        }
    }
}

/// Read API for the plan catalog.
///
/// Plan administration lives outside this crate; managers only ever read.
#[async_trait]
pub trait PlanCatalog: Send + Sync {
    /// Get all purchasable plans, ordered by sort_order.
    async fn list_active_plans(&self) -> Result<Vec<Plan>>;

    /// Get a plan by ID, active or not.
    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>>;
}

#[async_trait]
impl<P: PlanCatalog + ?Sized> PlanCatalog for std::sync::Arc<P> {
    async fn list_active_plans(&self) -> Result<Vec<Plan>> {
        (**self).list_active_plans().await
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        (**self).get_plan(plan_id).await
    }
}

/// Code-configured plan catalog.
///
/// Suitable for deployments where the tier list ships with the binary, and
/// for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanCatalog {
    plans: Vec<Plan>,
}

impl InMemoryPlanCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plan, returning the catalog for chaining.
    #[must_use]
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plans.push(plan);
        self
    }

    /// Add a plan in place.
    pub fn add(&mut self, plan: Plan) {
        self.plans.push(plan);
    }
}

#[async_trait]
impl PlanCatalog for InMemoryPlanCatalog {
    async fn list_active_plans(&self) -> Result<Vec<Plan>> {
        let mut active: Vec<Plan> = self.plans.iter().filter(|p| p.is_active).cloned().collect();
        active.sort_by_key(|p| p.sort_order);
        Ok(active)
    }

    async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>> {
        Ok(self.plans.iter().find(|p| p.id == plan_id).cloned())
    }
}
