//! Proration calculator.
//!
//! Pure arithmetic over integer cents: given the old and new plan prices and
//! the remaining time in the billing cycle, compute the signed amount the
//! customer owes (positive) or is credited (negative).
//!
//! The model is fixed-cycle linear proration: the daily rate always divides
//! by a constant cycle length (30 days by default) regardless of the actual
//! days in the month. This approximation is intentional and preserved.

use chrono::{DateTime, Utc};

/// Whole days remaining until `end_date`, floored, never negative.
///
/// Partial days are dropped (floor-to-day): a subscriber 15 days and 23
/// hours from renewal is prorated for 15 days.
#[must_use]
pub fn remaining_whole_days(now: DateTime<Utc>, end_date: DateTime<Utc>) -> i64 {
    (end_date - now).num_days().max(0)
}

/// Compute the signed proration amount in cents for a plan change.
///
/// `amount = (new_daily_rate - old_daily_rate) * remaining_days`, evaluated
/// in integer cents as `(new - old) * remaining_days / cycle_length_days`
/// with division truncating toward zero.
///
/// Returns 0 when no whole days remain in the cycle; the new plan then
/// takes effect at face value on the next cycle.
///
/// A result of 0 does not imply the prices are equal: a difference too
/// small to cover one cycle day at the remaining-day count truncates to 0
/// as well, so callers must not read 0 as "same plan".
#[must_use]
pub fn prorate(
    old_price_cents: i64,
    new_price_cents: i64,
    now: DateTime<Utc>,
    end_date: DateTime<Utc>,
    cycle_length_days: u32,
) -> i64 {
    if cycle_length_days == 0 {
        return 0;
    }
    let remaining_days = remaining_whole_days(now, end_date);
    if remaining_days == 0 {
        return 0;
    }
    (new_price_cents - old_price_cents) * remaining_days / i64::from(cycle_length_days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_upgrade_mid_cycle() {
        // $29.99 -> $49.99 with 15 of 30 days left: ((4999-2999)/30)*15 = $10.00
        let amount = prorate(2999, 4999, at(1), at(16), 30);
        assert_eq!(amount, 1000);
    }

    #[test]
    fn test_downgrade_mid_cycle() {
        // $29.99 -> $19.99 with 15 of 30 days left: -$5.00
        let amount = prorate(2999, 1999, at(1), at(16), 30);
        assert_eq!(amount, -500);
    }

    #[test]
    fn test_same_plan_is_zero() {
        assert_eq!(prorate(2999, 2999, at(1), at(16), 30), 0);
        assert_eq!(prorate(2999, 2999, at(16), at(1), 30), 0);
    }

    #[test]
    fn test_no_remaining_days_is_zero() {
        // End date in the past.
        assert_eq!(prorate(2999, 4999, at(16), at(1), 30), 0);
        // End date now.
        assert_eq!(prorate(2999, 4999, at(16), at(16), 30), 0);
    }

    #[test]
    fn test_partial_days_floor() {
        let now = at(1);
        let end = now + Duration::days(15) + Duration::hours(23);
        assert_eq!(remaining_whole_days(now, end), 15);
        assert_eq!(prorate(2999, 4999, now, end, 30), 1000);
    }

    #[test]
    fn test_sign_follows_price_difference() {
        for days in 1..=30i64 {
            let end = at(1) + Duration::days(days);
            assert!(prorate(1000, 2000, at(1), end, 30) >= 0);
            assert!(prorate(2000, 1000, at(1), end, 30) <= 0);
        }
        // Strictly positive/negative once the difference covers a full cycle day.
        assert!(prorate(1000, 2000, at(1), at(2), 30) > 0);
        assert!(prorate(2000, 1000, at(1), at(2), 30) < 0);
    }

    #[test]
    fn test_truncates_toward_zero() {
        // (100 cents / 30) * 1 day = 3.33 -> 3
        assert_eq!(prorate(0, 100, at(1), at(2), 30), 3);
        assert_eq!(prorate(100, 0, at(1), at(2), 30), -3);

        // A difference below one cycle-day's worth vanishes entirely, so
        // 0 can come back for plans with different prices.
        assert_eq!(prorate(1000, 1019, at(1), at(2), 30), 0);
        assert_eq!(prorate(1019, 1000, at(1), at(2), 30), 0);
    }
}
