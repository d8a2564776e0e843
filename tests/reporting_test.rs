mod common;

use anyhow::Result;
use common::{day, open_account, record, test_service};
use ecompta::application::{AppError, MovementDetails};
use ecompta::domain::{AccountKind, BankAccount, Direction};

#[tokio::test]
async fn test_position_totals_per_currency() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let ecobank = open_account(&service, "Ecobank", 150_000, 50_000).await?;
    open_account(&service, "Caisse", 20_000, 0).await?;
    let euro = BankAccount::new("Compte EUR".into(), AccountKind::Bank, "EUR".into())
        .with_opening_balance(3_000);
    service.create_account(euro).await?;
    let closed = open_account(&service, "Ancien compte", 0, 0).await?;
    service.close_account(closed.id).await?;

    record(&service, &ecobank, Direction::Outflow, 30_000, "2024-05-02", "Loyer").await?;

    let position = service.treasury_position().await?;
    assert_eq!(position.accounts.len(), 3);
    assert!(position.accounts.iter().all(|a| a.name != "Ancien compte"));

    let ecobank_line = position
        .accounts
        .iter()
        .find(|a| a.account_id == ecobank.id)
        .unwrap();
    assert_eq!(ecobank_line.balance, 120_000);
    assert_eq!(ecobank_line.available, 170_000);

    assert_eq!(position.totals.len(), 2);
    let eur = position.totals.iter().find(|t| t.currency == "EUR").unwrap();
    assert_eq!((eur.account_count, eur.balance), (1, 3_000));
    let xof = position.totals.iter().find(|t| t.currency == "XOF").unwrap();
    assert_eq!(xof.account_count, 2);
    assert_eq!(xof.balance, 140_000);
    assert_eq!(xof.available, 190_000);

    Ok(())
}

#[tokio::test]
async fn test_cash_flow_over_a_period() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 100_000, 0).await?;

    let categorized = |category: &str| MovementDetails {
        category: Some(category.to_string()),
        ..Default::default()
    };
    for (direction, amount, date, label, category) in [
        (Direction::Inflow, 50_000, "2024-01-10", "Facture 1", "ventes"),
        (Direction::Outflow, 20_000, "2024-02-05", "Loyer fevrier", "loyer"),
        (Direction::Inflow, 10_000, "2024-02-20", "Facture 2", "ventes"),
        (Direction::Inflow, 4_000, "2024-02-29", "Facture 3", "ventes"),
        (Direction::Outflow, 5_000, "2024-03-01", "Loyer mars", "loyer"),
    ] {
        service
            .record_movement(
                account.id,
                direction,
                amount,
                day(date),
                label.to_string(),
                categorized(category),
                false,
            )
            .await?;
    }

    let summary = service
        .cash_flow(account.id, day("2024-02-01"), day("2024-02-29"))
        .await?;

    assert_eq!(summary.opening_balance, 150_000);
    assert_eq!(summary.inflow, 14_000);
    assert_eq!(summary.outflow, 20_000);
    assert_eq!(summary.net, -6_000);
    assert_eq!(summary.closing_balance, 144_000);
    assert_eq!(summary.movement_count, 3);

    assert_eq!(summary.categories.len(), 2);
    // Largest outflow first
    assert_eq!(summary.categories[0].category.as_deref(), Some("loyer"));
    assert_eq!(summary.categories[0].outflow, 20_000);
    assert_eq!(summary.categories[1].inflow, 14_000);

    Ok(())
}

#[tokio::test]
async fn test_cash_flow_rejects_inverted_range() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 0, 0).await?;

    assert!(matches!(
        service
            .cash_flow(account.id, day("2024-03-01"), day("2024-02-01"))
            .await,
        Err(AppError::InvalidInput(_))
    ));

    Ok(())
}
