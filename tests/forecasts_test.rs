mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::{day, open_account, test_service};
use ecompta::application::{AppError, NewForecast};
use ecompta::domain::{AccountId, Cents, Direction, ForecastStatus, MAX_AMOUNT_CENTS, Periodicity};
use ecompta::storage::ForecastFilter;

fn forecast(
    account_id: AccountId,
    label: &str,
    direction: Direction,
    amount: Cents,
    date: &str,
) -> NewForecast {
    NewForecast {
        account_id,
        label: label.to_string(),
        direction,
        amount_cents: amount,
        expected_date: day(date),
        periodicity: Periodicity::None,
        end_date: None,
        category: None,
    }
}

#[tokio::test]
async fn test_monthly_expansion_clamps_to_month_end() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 0, 0).await?;

    let template = service
        .create_forecast(NewForecast {
            periodicity: Periodicity::Monthly,
            end_date: Some(day("2025-06-30")),
            category: Some("loyer".to_string()),
            ..forecast(account.id, "Loyer", Direction::Outflow, 250_000, "2025-01-31")
        })
        .await?;

    let occurrences = service.expand_forecast(template.id).await?;
    let dates: Vec<_> = occurrences.iter().map(|o| o.expected_date).collect();
    assert_eq!(
        dates,
        vec![
            day("2025-02-28"),
            day("2025-03-31"),
            day("2025-04-30"),
            day("2025-05-31"),
            day("2025-06-30"),
        ]
    );
    assert!(occurrences.iter().all(|o| o.parent_id == Some(template.id)));
    assert!(occurrences.iter().all(|o| o.category.as_deref() == Some("loyer")));
    assert!(occurrences.iter().all(|o| !o.is_recurring()));

    Ok(())
}

#[tokio::test]
async fn test_expansion_is_idempotent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 0, 0).await?;

    let template = service
        .create_forecast(NewForecast {
            periodicity: Periodicity::Quarterly,
            end_date: Some(day("2025-12-31")),
            ..forecast(account.id, "TVA", Direction::Outflow, 80_000, "2025-01-15")
        })
        .await?;

    assert_eq!(service.expand_forecast(template.id).await?.len(), 3);
    assert!(service.expand_forecast(template.id).await?.is_empty());

    let all = service
        .list_forecasts(&ForecastFilter {
            account_id: Some(account.id),
            ..Default::default()
        })
        .await?;
    // Template plus April, July and October
    assert_eq!(all.len(), 4);

    Ok(())
}

#[tokio::test]
async fn test_open_ended_series_stops_at_horizon() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = service.with_horizon_months(1);
    let account = open_account(&service, "Caisse", 0, 0).await?;

    let template = service
        .create_forecast(NewForecast {
            periodicity: Periodicity::Weekly,
            ..forecast(account.id, "Marche", Direction::Inflow, 5_000, "2025-01-01")
        })
        .await?;

    let occurrences = service.expand_forecast(template.id).await?;
    let dates: Vec<_> = occurrences.iter().map(|o| o.expected_date).collect();
    assert_eq!(
        dates,
        vec![
            day("2025-01-08"),
            day("2025-01-15"),
            day("2025-01-22"),
            day("2025-01-29"),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_one_off_forecast_cannot_be_expanded() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 0, 0).await?;
    let one_off = service
        .create_forecast(forecast(account.id, "Facture 17", Direction::Inflow, 90_000, "2025-02-01"))
        .await?;

    assert!(matches!(
        service.expand_forecast(one_off.id).await,
        Err(AppError::ForecastNotRecurring(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_invalid_forecasts_are_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 0, 0).await?;

    let zero = forecast(account.id, "Zero", Direction::Inflow, 0, "2025-02-01");
    assert!(matches!(
        service.create_forecast(zero).await,
        Err(AppError::InvalidAmount(_))
    ));

    let oversized = forecast(account.id, "Trop", Direction::Inflow, MAX_AMOUNT_CENTS + 1, "2025-02-01");
    assert!(matches!(
        service.create_forecast(oversized).await,
        Err(AppError::InvalidAmount(_))
    ));

    let inverted = NewForecast {
        periodicity: Periodicity::Monthly,
        end_date: Some(day("2025-01-01")),
        ..forecast(account.id, "Abonnement", Direction::Outflow, 1_000, "2025-02-01")
    };
    assert!(matches!(
        service.create_forecast(inverted).await,
        Err(AppError::InvalidInput(_))
    ));

    service.close_account(account.id).await?;
    let closed = forecast(account.id, "Apres fermeture", Direction::Inflow, 1_000, "2025-02-01");
    assert!(matches!(
        service.create_forecast(closed).await,
        Err(AppError::AccountClosed(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_realizations_move_status_forward() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 0, 0).await?;
    let expected = service
        .create_forecast(forecast(account.id, "Client B", Direction::Inflow, 100_000, "2025-03-01"))
        .await?;

    let partial = service.record_realization(expected.id, 40_000).await?;
    assert_eq!(partial.status, ForecastStatus::PartiallyRealized);
    assert_eq!(partial.outstanding(), 60_000);

    let done = service.record_realization(expected.id, 60_000).await?;
    assert_eq!(done.status, ForecastStatus::Realized);

    let stored = service.get_forecast(expected.id).await?;
    assert_eq!(stored.realized_cents, 100_000);
    assert_eq!(stored.status, ForecastStatus::Realized);

    let outstanding = service
        .list_forecasts(&ForecastFilter {
            outstanding_only: true,
            ..Default::default()
        })
        .await?;
    assert!(outstanding.is_empty());

    assert!(matches!(
        service.record_realization(expected.id, -5).await,
        Err(AppError::InvalidAmount(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_projection_finds_first_overdraft() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 50_000, 10_000).await?;
    let today = Utc::now().date_naive();
    let in_days = |n: i64| (today + Duration::days(n)).format("%Y-%m-%d").to_string();

    service
        .create_forecast(forecast(account.id, "Salaires", Direction::Outflow, 80_000, &in_days(10)))
        .await?;
    service
        .create_forecast(forecast(account.id, "Client C", Direction::Inflow, 100_000, &in_days(20)))
        .await?;
    service
        .create_forecast(forecast(account.id, "Lointain", Direction::Inflow, 999_000, &in_days(90)))
        .await?;

    let projection = service.project_balance(account.id, Some(1)).await?;

    assert_eq!(projection.as_of, today);
    assert_eq!(projection.starting_balance, 50_000);
    assert_eq!(projection.points.len(), 2);
    assert_eq!(projection.points[0].balance, -30_000);
    assert_eq!(projection.lowest_balance, -30_000);
    assert_eq!(projection.first_overdraft_date, Some(day(&in_days(10))));
    assert_eq!(projection.ending_balance, 70_000);

    // The default horizon reaches the far inflow
    let projection = service.project_balance(account.id, None).await?;
    assert_eq!(projection.points.len(), 3);
    assert_eq!(projection.ending_balance, 1_069_000);

    Ok(())
}

#[tokio::test]
async fn test_projection_counts_template_date_and_occurrences() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 1_000_000, 0).await?;
    let today = Utc::now().date_naive();
    let in_days = |n: i64| (today + Duration::days(n)).format("%Y-%m-%d").to_string();

    let template = service
        .create_forecast(NewForecast {
            periodicity: Periodicity::Monthly,
            end_date: Some(day(&in_days(70))),
            ..forecast(account.id, "Loyer", Direction::Outflow, 100_000, &in_days(5))
        })
        .await?;
    let occurrences = service.expand_forecast(template.id).await?;
    assert_eq!(occurrences.len(), 2);

    let projection = service.project_balance(account.id, Some(3)).await?;

    assert_eq!(projection.points.len(), 3);
    assert_eq!(projection.points[0].forecast_id, template.id);
    assert_eq!(projection.points[0].date, day(&in_days(5)));
    assert_eq!(projection.points[1].balance, 800_000);
    assert_eq!(projection.ending_balance, 700_000);
    assert_eq!(projection.lowest_balance, 700_000);

    Ok(())
}

#[tokio::test]
async fn test_realization_beyond_range_saturates() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let account = open_account(&service, "Ecobank", 0, 0).await?;
    let expected = service
        .create_forecast(forecast(account.id, "Client D", Direction::Inflow, MAX_AMOUNT_CENTS, "2025-03-01"))
        .await?;

    assert!(matches!(
        service.record_realization(expected.id, MAX_AMOUNT_CENTS + 1).await,
        Err(AppError::InvalidAmount(_))
    ));
    for _ in 0..10 {
        service.record_realization(expected.id, MAX_AMOUNT_CENTS).await?;
    }

    let stored = service.get_forecast(expected.id).await?;
    assert_eq!(stored.status, ForecastStatus::Realized);
    assert!(stored.realized_cents >= MAX_AMOUNT_CENTS);

    Ok(())
}
