mod common;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use common::test_services;
use ecompta::application::{AppError, CrmService, CustomerUpdate};
use ecompta::domain::{
    Customer, CustomerSegment, CustomerStats, MAX_AMOUNT_CENTS, PaymentBehavior, RiskLevel,
};

fn stats(revenue_cents: i64, frequency: u32, days_ago: Option<i64>, delay: i32) -> CustomerStats {
    CustomerStats {
        total_revenue_cents: revenue_cents,
        purchase_frequency: frequency,
        last_purchase_at: days_ago.map(|d| Utc::now() - Duration::days(d)),
        avg_payment_delay_days: delay,
    }
}

/// Three customers: a VIP, a prospect that never bought and a lapsed one
async fn seed(crm: &CrmService) -> Result<(Customer, Customer, Customer)> {
    let vip = crm
        .create_customer(
            "Sahel Distribution".to_string(),
            Some("achats@sahel.bf".to_string()),
            stats(6_000_000, 12, Some(10), 0),
        )
        .await?;
    let prospect = crm
        .create_customer("Boutique Kadi".to_string(), None, CustomerStats::default())
        .await?;
    let lapsed = crm
        .create_customer(
            "Garage Ouedraogo".to_string(),
            None,
            stats(300_000, 4, Some(200), 20),
        )
        .await?;
    Ok((vip, prospect, lapsed))
}

fn names(customers: &[Customer]) -> Vec<&str> {
    customers.iter().map(|c| c.name.as_str()).collect()
}

#[tokio::test]
async fn test_customer_names_are_unique() -> Result<()> {
    let (_service, crm, _temp) = test_services().await?;
    crm.create_customer("Faso Textile".to_string(), None, CustomerStats::default())
        .await?;

    assert!(matches!(
        crm.create_customer("Faso Textile".to_string(), None, CustomerStats::default())
            .await,
        Err(AppError::CustomerAlreadyExists(_))
    ));
    assert!(matches!(
        crm.create_customer("Negatif".to_string(), None, stats(-1, 0, None, 0))
            .await,
        Err(AppError::InvalidAmount(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_purchases_update_statistics() -> Result<()> {
    let (_service, crm, _temp) = test_services().await?;
    let customer = crm
        .create_customer("Faso Textile".to_string(), None, CustomerStats::default())
        .await?;

    let first: DateTime<Utc> = Utc::now() - Duration::days(3);
    crm.record_purchase(customer.id, 125_000, first).await?;
    // An older purchase does not move the last purchase date back
    let updated = crm
        .record_purchase(customer.id, 75_000, first - Duration::days(30))
        .await?;

    assert_eq!(updated.stats.total_revenue_cents, 200_000);
    assert_eq!(updated.stats.purchase_frequency, 2);
    assert_eq!(updated.stats.last_purchase_at, Some(first));

    let stored = crm.resolve_customer("Faso Textile").await?;
    assert_eq!(stored.stats.total_revenue_cents, 200_000);

    assert!(matches!(
        crm.record_purchase(customer.id, 0, Utc::now()).await,
        Err(AppError::InvalidAmount(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_revenue_stays_in_range() -> Result<()> {
    let (_service, crm, _temp) = test_services().await?;
    let customer = crm
        .create_customer("Sahel Distribution".to_string(), None, CustomerStats::default())
        .await?;

    assert!(matches!(
        crm.record_purchase(customer.id, MAX_AMOUNT_CENTS + 1, Utc::now()).await,
        Err(AppError::InvalidAmount(_))
    ));
    assert!(matches!(
        crm.create_customer(
            "Trop".to_string(),
            None,
            CustomerStats {
                total_revenue_cents: MAX_AMOUNT_CENTS + 1,
                ..Default::default()
            }
        )
        .await,
        Err(AppError::InvalidAmount(_))
    ));

    // A tenth maximal purchase would pass i64::MAX
    for _ in 0..9 {
        crm.record_purchase(customer.id, MAX_AMOUNT_CENTS, Utc::now()).await?;
    }
    assert!(matches!(
        crm.record_purchase(customer.id, MAX_AMOUNT_CENTS, Utc::now()).await,
        Err(AppError::InvalidAmount(_))
    ));

    let stored = crm.get_customer(customer.id).await?;
    assert_eq!(stored.stats.total_revenue_cents, 9 * MAX_AMOUNT_CENTS);
    assert_eq!(stored.stats.purchase_frequency, 9);

    Ok(())
}

#[tokio::test]
async fn test_scoring_caches_intelligence() -> Result<()> {
    let (_service, crm, _temp) = test_services().await?;
    let (vip, _, _) = seed(&crm).await?;

    assert!(crm.get_customer(vip.id).await?.intelligence.is_none());

    let scored = crm.score_customer(vip.id, Utc::now()).await?;
    let intel = scored.intelligence.expect("scored customer has intelligence");
    // 40 revenue + 20 frequency + 20 recency + 10 payment
    assert_eq!(intel.score, 90);
    assert_eq!(intel.segment, CustomerSegment::VipHighValue);
    assert_eq!(intel.churn_probability, 0.0);
    assert_eq!(intel.risk_level, RiskLevel::Low);
    assert_eq!(intel.payment_behavior, PaymentBehavior::EarlyPayer);
    assert_eq!(intel.avg_order_value_cents, 500_000);
    // 500 000 x (12 x 1.2 truncated to 14) x 5 years
    assert_eq!(intel.predicted_ltv_cents, 35_000_000);
    assert_eq!(intel.days_since_last_purchase, Some(10));

    let stored = crm.get_customer(vip.id).await?;
    assert_eq!(stored.intelligence, Some(intel));

    Ok(())
}

#[tokio::test]
async fn test_risk_and_value_lists() -> Result<()> {
    let (_service, crm, _temp) = test_services().await?;
    let (vip, prospect, lapsed) = seed(&crm).await?;

    // Nothing is listed before scoring
    assert!(crm.high_churn_risk().await?.is_empty());

    assert_eq!(crm.score_all(Utc::now()).await?, 3);

    let at_risk = crm.high_churn_risk().await?;
    assert_eq!(names(&at_risk), vec![prospect.name.as_str()]);
    let churn = at_risk[0].intelligence.as_ref().map(|i| i.churn_probability);
    assert_eq!(churn, Some(0.9));

    let high_value = crm.high_value().await?;
    assert_eq!(names(&high_value), vec![vip.name.as_str()]);

    let lapsed = crm.get_customer(lapsed.id).await?;
    let intel = lapsed.intelligence.expect("scored");
    assert_eq!(intel.segment, CustomerSegment::AtRiskChurn);
    assert_eq!(intel.risk_level, RiskLevel::Medium);
    assert_eq!(intel.payment_behavior, PaymentBehavior::Negotiator);

    Ok(())
}

#[tokio::test]
async fn test_inactive_customers() -> Result<()> {
    let (_service, crm, _temp) = test_services().await?;
    let (_, _, lapsed) = seed(&crm).await?;

    // The prospect was created just now, so only the lapsed customer counts
    let inactive = crm.inactive(Utc::now()).await?;
    assert_eq!(names(&inactive), vec![lapsed.name.as_str()]);

    // A year from now everybody is inactive
    let inactive = crm.inactive(Utc::now() + Duration::days(365)).await?;
    assert_eq!(inactive.len(), 3);

    Ok(())
}

#[tokio::test]
async fn test_deactivated_customers_are_hidden() -> Result<()> {
    let (_service, crm, _temp) = test_services().await?;
    let (vip, _, _) = seed(&crm).await?;
    crm.score_all(Utc::now()).await?;

    let deactivated = crm.deactivate_customer(vip.id).await?;
    assert!(!deactivated.active);

    assert_eq!(crm.list_customers(false).await?.len(), 2);
    assert_eq!(crm.list_customers(true).await?.len(), 3);
    assert!(crm.high_value().await?.is_empty());
    assert_eq!(crm.score_all(Utc::now()).await?, 2);

    // Still reachable directly
    assert!(!crm.get_customer(vip.id).await?.active);

    Ok(())
}

#[tokio::test]
async fn test_update_customer() -> Result<()> {
    let (_service, crm, _temp) = test_services().await?;
    let (vip, prospect, _) = seed(&crm).await?;

    let updated = crm
        .update_customer(
            prospect.id,
            CustomerUpdate {
                email: Some("contact@kadi.bf".to_string()),
                total_revenue_cents: Some(450_000),
                purchase_frequency: Some(3),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(updated.email.as_deref(), Some("contact@kadi.bf"));
    assert_eq!(updated.stats.total_revenue_cents, 450_000);
    assert_eq!(updated.stats.purchase_frequency, 3);

    let rename = CustomerUpdate {
        name: Some(vip.name.clone()),
        ..Default::default()
    };
    assert!(matches!(
        crm.update_customer(prospect.id, rename).await,
        Err(AppError::CustomerAlreadyExists(_))
    ));

    assert!(matches!(
        crm.update_customer(uuid::Uuid::new_v4(), CustomerUpdate::default())
            .await,
        Err(AppError::CustomerNotFound(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_distributions_list_every_category() -> Result<()> {
    let (_service, crm, _temp) = test_services().await?;
    seed(&crm).await?;
    crm.score_all(Utc::now()).await?;

    let segments = crm.segment_distribution().await?;
    assert_eq!(segments.len(), CustomerSegment::ALL.len());
    let count_of = |segment: CustomerSegment| {
        segments
            .iter()
            .find(|s| s.segment == segment)
            .map(|s| (s.count, s.percentage))
    };
    assert_eq!(count_of(CustomerSegment::VipHighValue), Some((1, 33.33)));
    assert_eq!(count_of(CustomerSegment::OccasionalBuyer), Some((1, 33.33)));
    assert_eq!(count_of(CustomerSegment::AtRiskChurn), Some((1, 33.33)));
    assert_eq!(count_of(CustomerSegment::GrowingBusiness), Some((0, 0.0)));

    let behaviors = crm.payment_behavior_distribution().await?;
    assert_eq!(behaviors.len(), PaymentBehavior::ALL.len());
    let early = behaviors
        .iter()
        .find(|b| b.behavior == PaymentBehavior::EarlyPayer)
        .unwrap();
    assert_eq!((early.count, early.percentage), (2, 66.67));

    Ok(())
}
