//! Heuristic customer scoring.
//!
//! Every function here is pure: it only looks at the aggregate statistics and
//! the reference instant `now`. Revenue thresholds are expressed in cents.

use chrono::{DateTime, Utc};

use super::{Cents, CustomerIntelligence, CustomerSegment, CustomerStats, PaymentBehavior, RiskLevel};

const UNITS: Cents = 100;

/// Whole days elapsed since the last purchase, `None` if there never was one.
pub fn days_since_last_purchase(stats: &CustomerStats, now: DateTime<Utc>) -> Option<i64> {
    stats.last_purchase_at.map(|last| (now - last).num_days())
}

/// Global score in 0..=100, built from four additive point buckets.
pub fn score(stats: &CustomerStats, now: DateTime<Utc>) -> u8 {
    let revenue = stats.total_revenue_cents;
    let revenue_points = if revenue > 10_000 * UNITS {
        40
    } else if revenue > 5_000 * UNITS {
        30
    } else if revenue > 1_000 * UNITS {
        20
    } else if revenue > 0 {
        10
    } else {
        0
    };

    let frequency = stats.purchase_frequency;
    let frequency_points = if frequency > 12 {
        30
    } else if frequency > 6 {
        20
    } else if frequency > 3 {
        15
    } else if frequency > 0 {
        10
    } else {
        0
    };

    let recency_points = match days_since_last_purchase(stats, now) {
        Some(days) if days <= 30 => 20,
        Some(days) if days <= 90 => 15,
        Some(days) if days <= 180 => 10,
        Some(days) if days <= 365 => 5,
        _ => 0,
    };

    let delay = stats.avg_payment_delay_days;
    let payment_points = if delay <= 0 {
        10
    } else if delay <= 7 {
        8
    } else if delay <= 15 {
        5
    } else if delay <= 30 {
        2
    } else {
        0
    };

    let total: u32 = revenue_points + frequency_points + recency_points + payment_points;
    total.min(100) as u8
}

/// Segment assignment. Checks run from the most valuable segment down and
/// the first match wins.
pub fn segment(stats: &CustomerStats, now: DateTime<Utc>) -> CustomerSegment {
    let revenue = stats.total_revenue_cents;
    let frequency = stats.purchase_frequency;

    if revenue > 50_000 * UNITS && frequency > 10 {
        return CustomerSegment::VipHighValue;
    }
    if revenue > 20_000 * UNITS && frequency > 5 {
        return CustomerSegment::StrategicAccount;
    }
    if revenue > 5_000 * UNITS && frequency > 2 {
        return CustomerSegment::StableRegular;
    }
    if days_since_last_purchase(stats, now).is_some_and(|days| days > 180) {
        return CustomerSegment::AtRiskChurn;
    }
    if frequency <= 1 {
        return CustomerSegment::OccasionalBuyer;
    }
    CustomerSegment::StableRegular
}

/// Churn probability in [0, 1], rounded to four decimals.
///
/// Risk factors are summed in basis points and capped at 10 000.
pub fn churn_probability(stats: &CustomerStats, now: DateTime<Utc>) -> f64 {
    let mut basis_points: u32 = match days_since_last_purchase(stats, now) {
        None => 5_000,
        Some(days) if days > 365 => 4_000,
        Some(days) if days > 180 => 3_000,
        Some(days) if days > 90 => 2_000,
        Some(days) if days > 30 => 1_000,
        Some(_) => 0,
    };

    basis_points += match stats.purchase_frequency {
        0 => 3_000,
        1 | 2 => 2_000,
        _ => 0,
    };

    basis_points += match stats.avg_payment_delay_days {
        d if d > 30 => 2_000,
        d if d > 15 => 1_000,
        _ => 0,
    };

    if stats.total_revenue_cents < 1_000 * UNITS {
        basis_points += 1_000;
    }

    f64::from(basis_points.min(10_000)) / 10_000.0
}

/// Expected remaining life (years) and frequency multiplier (tenths) for a
/// segment.
fn lifespan_profile(segment: CustomerSegment) -> (i64, i64) {
    match segment {
        CustomerSegment::VipHighValue => (5, 12),
        CustomerSegment::StrategicAccount => (4, 11),
        CustomerSegment::AtRiskChurn => (1, 5),
        CustomerSegment::OccasionalBuyer => (2, 8),
        CustomerSegment::PriceSensitive => (2, 7),
        CustomerSegment::GrowingBusiness => (3, 10),
        CustomerSegment::StableRegular => (3, 10),
        CustomerSegment::PaymentDelayed => (1, 6),
    }
}

/// Integer division rounding half away from zero.
fn div_round_half_up(numerator: Cents, denominator: Cents) -> Cents {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        quotient + numerator.signum() * denominator.signum()
    } else {
        quotient
    }
}

/// Average order value in cents, `0` when there are no purchases.
pub fn average_order_value(stats: &CustomerStats) -> Cents {
    match stats.purchase_frequency {
        0 => 0,
        n => div_round_half_up(stats.total_revenue_cents, Cents::from(n)),
    }
}

/// Predicted lifetime value:
/// average order value x adjusted yearly frequency x lifespan in years.
pub fn predicted_ltv(stats: &CustomerStats, segment: CustomerSegment) -> Cents {
    if stats.purchase_frequency == 0 {
        return 0;
    }

    let (lifespan_years, multiplier_tenths) = lifespan_profile(segment);
    let base_frequency = Cents::from(stats.purchase_frequency.max(1));
    let adjusted_frequency = base_frequency * multiplier_tenths / 10;

    average_order_value(stats)
        .saturating_mul(adjusted_frequency)
        .saturating_mul(lifespan_years)
}

pub fn payment_behavior(stats: &CustomerStats) -> PaymentBehavior {
    match stats.avg_payment_delay_days {
        d if d <= 0 => PaymentBehavior::EarlyPayer,
        d if d <= 7 => PaymentBehavior::PromptPayer,
        d if d <= 15 => PaymentBehavior::RegularDelay,
        d if d <= 30 => PaymentBehavior::Negotiator,
        _ => PaymentBehavior::ProblematicPayer,
    }
}

/// Satisfaction estimate in 0..=100, starting from a neutral 50.
pub fn satisfaction_score(stats: &CustomerStats, now: DateTime<Utc>) -> u8 {
    let mut score: i32 = 50;

    let revenue = stats.total_revenue_cents;
    score += if revenue > 10_000 * UNITS {
        20
    } else if revenue > 5_000 * UNITS {
        15
    } else if revenue > 1_000 * UNITS {
        10
    } else {
        0
    };

    score += match stats.purchase_frequency {
        f if f > 10 => 15,
        f if f > 5 => 10,
        f if f > 2 => 5,
        _ => 0,
    };

    score += match days_since_last_purchase(stats, now) {
        None => 0,
        Some(days) if days <= 30 => 15,
        Some(days) if days <= 90 => 10,
        Some(days) if days <= 180 => 5,
        Some(_) => -10,
    };

    score += match stats.avg_payment_delay_days {
        d if d <= 0 => 10,
        d if d <= 7 => 5,
        d if d > 30 => -15,
        _ => 0,
    };

    score.clamp(0, 100) as u8
}

pub fn risk_level(churn_probability: f64) -> RiskLevel {
    if churn_probability >= 0.7 {
        RiskLevel::High
    } else if churn_probability >= 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Run every rule and bundle the results.
///
/// The lifetime value uses the segment computed in the same pass, never a
/// previously cached one.
pub fn evaluate(stats: &CustomerStats, now: DateTime<Utc>) -> CustomerIntelligence {
    let segment = segment(stats, now);
    let churn = churn_probability(stats, now);

    CustomerIntelligence {
        score: score(stats, now),
        segment,
        churn_probability: churn,
        predicted_ltv_cents: predicted_ltv(stats, segment),
        payment_behavior: payment_behavior(stats),
        satisfaction_score: satisfaction_score(stats, now),
        risk_level: risk_level(churn),
        days_since_last_purchase: days_since_last_purchase(stats, now),
        avg_order_value_cents: average_order_value(stats),
        computed_at: now,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-30T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn stats(revenue_units: i64, frequency: u32, days_ago: Option<i64>, delay: i32) -> CustomerStats {
        CustomerStats {
            total_revenue_cents: revenue_units * 100,
            purchase_frequency: frequency,
            last_purchase_at: days_ago.map(|d| now() - Duration::days(d)),
            avg_payment_delay_days: delay,
        }
    }

    #[test]
    fn test_score_buckets() {
        // 40 + 30 + 20 + 10
        assert_eq!(score(&stats(10_001, 13, Some(5), 0), now()), 100);
        // 30 + 20 + 15 + 8
        assert_eq!(score(&stats(6_000, 7, Some(60), 3), now()), 73);
        // 20 + 15 + 10 + 5
        assert_eq!(score(&stats(1_500, 4, Some(120), 10), now()), 50);
        // 10 + 10 + 5 + 2
        assert_eq!(score(&stats(1, 1, Some(300), 20), now()), 27);
        // nothing at all
        assert_eq!(score(&stats(0, 0, None, 45), now()), 0);
    }

    #[test]
    fn test_score_thresholds_are_strict() {
        // exactly 10 000 is not "> 10 000"
        assert_eq!(score(&stats(10_000, 0, None, 45), now()), 30);
        assert_eq!(score(&stats(0, 12, None, 45), now()), 20);
        // exactly 30 days is still the best recency bucket
        assert_eq!(score(&stats(0, 0, Some(30), 45), now()), 20);
        assert_eq!(score(&stats(0, 0, Some(366), 45), now()), 0);
    }

    #[test]
    fn test_score_is_monotonic_in_revenue_and_frequency() {
        let mut previous = 0;
        for revenue in (0..60_000).step_by(250) {
            let current = score(&stats(revenue, 3, Some(45), 10), now());
            assert!(current >= previous, "revenue {revenue}");
            previous = current;
        }

        let mut previous = 0;
        for frequency in 0..40 {
            let current = score(&stats(2_000, frequency, Some(45), 10), now());
            assert!(current >= previous, "frequency {frequency}");
            previous = current;
        }
    }

    #[test]
    fn test_segment_priority() {
        assert_eq!(segment(&stats(60_000, 11, Some(400), 0), now()), CustomerSegment::VipHighValue);
        assert_eq!(segment(&stats(60_000, 8, Some(10), 0), now()), CustomerSegment::StrategicAccount);
        assert_eq!(segment(&stats(6_000, 3, Some(10), 0), now()), CustomerSegment::StableRegular);
        assert_eq!(segment(&stats(4_000, 5, Some(200), 0), now()), CustomerSegment::AtRiskChurn);
        assert_eq!(segment(&stats(4_000, 1, Some(20), 0), now()), CustomerSegment::OccasionalBuyer);
        assert_eq!(segment(&stats(4_000, 0, None, 0), now()), CustomerSegment::OccasionalBuyer);
        assert_eq!(segment(&stats(4_000, 4, Some(20), 0), now()), CustomerSegment::StableRegular);
    }

    #[test]
    fn test_churn_probability_factors() {
        // never purchased, no frequency, late payer, tiny revenue: capped
        assert_eq!(churn_probability(&stats(0, 0, None, 45), now()), 1.0);
        // loyal customer
        assert_eq!(churn_probability(&stats(20_000, 15, Some(10), 0), now()), 0.0);
        // 0.2 (recency) + 0.2 (frequency) + 0.1 (delay)
        assert_eq!(churn_probability(&stats(2_000, 2, Some(100), 20), now()), 0.5);
        // 0.4 + 0.1
        assert_eq!(churn_probability(&stats(500, 5, Some(400), 0), now()), 0.5);
    }

    #[test]
    fn test_churn_probability_stays_in_unit_interval() {
        for revenue in [0, 999, 1_000, 50_000] {
            for frequency in [0, 1, 2, 3, 20] {
                for days in [None, Some(0), Some(31), Some(91), Some(181), Some(500)] {
                    for delay in [-5, 0, 16, 31, 90] {
                        let p = churn_probability(&stats(revenue, frequency, days, delay), now());
                        assert!((0.0..=1.0).contains(&p));
                    }
                }
            }
        }
    }

    #[test]
    fn test_predicted_ltv() {
        // avg 1 000.00, frequency 10 -> 10 (stable), 3 years
        let regular = stats(10_000, 10, Some(10), 0);
        assert_eq!(predicted_ltv(&regular, CustomerSegment::StableRegular), 3_000_000);

        // vip: frequency 12 * 1.2 = 14, 5 years, avg 5 000.00
        let vip = stats(60_000, 12, Some(10), 0);
        assert_eq!(predicted_ltv(&vip, CustomerSegment::VipHighValue), 500_000 * 14 * 5);

        // at risk: max(1, 1) * 0.5 truncates to 0
        let lapsed = stats(800, 1, Some(400), 0);
        assert_eq!(predicted_ltv(&lapsed, CustomerSegment::AtRiskChurn), 0);

        assert_eq!(predicted_ltv(&stats(5_000, 0, None, 0), CustomerSegment::StableRegular), 0);

        let huge = CustomerStats {
            total_revenue_cents: i64::MAX,
            purchase_frequency: 1,
            ..Default::default()
        };
        assert_eq!(predicted_ltv(&huge, CustomerSegment::VipHighValue), i64::MAX);
    }

    #[test]
    fn test_average_order_value_rounds_half_up() {
        let s = CustomerStats {
            total_revenue_cents: 1_000,
            purchase_frequency: 3,
            ..Default::default()
        };
        assert_eq!(average_order_value(&s), 333);

        let s = CustomerStats {
            total_revenue_cents: 5,
            purchase_frequency: 2,
            ..Default::default()
        };
        assert_eq!(average_order_value(&s), 3);
    }

    #[test]
    fn test_payment_behavior_thresholds() {
        let with_delay = |d| CustomerStats {
            avg_payment_delay_days: d,
            ..Default::default()
        };
        assert_eq!(payment_behavior(&with_delay(-2)), PaymentBehavior::EarlyPayer);
        assert_eq!(payment_behavior(&with_delay(7)), PaymentBehavior::PromptPayer);
        assert_eq!(payment_behavior(&with_delay(15)), PaymentBehavior::RegularDelay);
        assert_eq!(payment_behavior(&with_delay(30)), PaymentBehavior::Negotiator);
        assert_eq!(payment_behavior(&with_delay(31)), PaymentBehavior::ProblematicPayer);
    }

    #[test]
    fn test_satisfaction_score_is_clamped() {
        assert_eq!(satisfaction_score(&stats(20_000, 20, Some(1), 0), now()), 100);
        // 50 - 10 (stale) - 15 (late)
        assert_eq!(satisfaction_score(&stats(0, 0, Some(400), 60), now()), 25);
        // no purchase date: recency bucket skipped
        assert_eq!(satisfaction_score(&stats(0, 0, None, 10), now()), 50);
    }

    #[test]
    fn test_evaluate_uses_fresh_segment_for_ltv() {
        let s = stats(60_000, 12, Some(10), 0);
        let intelligence = evaluate(&s, now());

        assert_eq!(intelligence.segment, CustomerSegment::VipHighValue);
        assert_eq!(intelligence.predicted_ltv_cents, predicted_ltv(&s, CustomerSegment::VipHighValue));
        assert_eq!(intelligence.risk_level, RiskLevel::Low);
        assert_eq!(intelligence.days_since_last_purchase, Some(10));
        assert_eq!(intelligence.computed_at, now());
    }

    #[test]
    fn test_risk_level() {
        assert_eq!(risk_level(0.7), RiskLevel::High);
        assert_eq!(risk_level(0.4), RiskLevel::Medium);
        assert_eq!(risk_level(0.39), RiskLevel::Low);
    }
}
