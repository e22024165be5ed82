//! Billing configuration.
//!
//! Tunables for the proration cycle, invoice due dates, and cancellation
//! validation. Defaults match the behavior the rest of the crate documents.

/// Default billing cycle length used by the proration calculator.
///
/// The calculator deliberately divides by a constant 30 rather than the
/// actual days in the month. This is a known approximation carried over
/// from the original pricing model, not a bug.
pub const DEFAULT_CYCLE_LENGTH_DAYS: u32 = 30;

/// Default number of days until a proration charge invoice is due.
pub const DEFAULT_CHARGE_DUE_DAYS: i64 = 7;

/// Default minimum length for a cancellation reason.
///
/// Prevents drive-by or blank cancellations so support has something to
/// work with.
pub const DEFAULT_MIN_CANCELLATION_REASON_LEN: usize = 10;

/// Configuration for billing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Fixed billing cycle length in days for proration arithmetic.
    pub cycle_length_days: u32,
    /// Days until an upgrade charge invoice is due.
    pub charge_due_days: i64,
    /// Minimum character count for a cancellation reason.
    pub min_cancellation_reason_len: usize,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            cycle_length_days: DEFAULT_CYCLE_LENGTH_DAYS,
            charge_due_days: DEFAULT_CHARGE_DUE_DAYS,
            min_cancellation_reason_len: DEFAULT_MIN_CANCELLATION_REASON_LEN,
        }
    }
}

impl BillingConfig {
    /// Create a config with the documented defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the proration cycle length in days.
    #[must_use]
    pub fn cycle_length_days(mut self, days: u32) -> Self {
        self.cycle_length_days = days;
        self
    }

    /// Set the due window for proration charge invoices.
    #[must_use]
    pub fn charge_due_days(mut self, days: i64) -> Self {
        self.charge_due_days = days;
        self
    }

    /// Set the minimum cancellation reason length.
    #[must_use]
    pub fn min_cancellation_reason_len(mut self, len: usize) -> Self {
        self.min_cancellation_reason_len = len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BillingConfig::default();
        assert_eq!(config.cycle_length_days, 30);
        assert_eq!(config.charge_due_days, 7);
        assert_eq!(config.min_cancellation_reason_len, 10);
    }

    #[test]
    fn test_builder_setters() {
        let config = BillingConfig::new()
            .cycle_length_days(31)
            .charge_due_days(14)
            .min_cancellation_reason_len(5);
        assert_eq!(config.cycle_length_days, 31);
        assert_eq!(config.charge_due_days, 14);
        assert_eq!(config.min_cancellation_reason_len, 5);
    }
}
