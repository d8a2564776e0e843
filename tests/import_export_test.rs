mod common;

use anyhow::Result;
use common::{open_account, record, test_services};
use ecompta::domain::{CustomerStats, Direction};
use ecompta::io::{DatabaseSnapshot, Exporter, ImportOptions, Importer};
use ecompta::storage::MovementFilter;

const STATEMENT: &str = "\
date,label,direction,amount,counterparty,reference
2024-04-02,Virement client,,1500.00,Sahel Distribution,VIR-001
03/04/2024,Frais bancaires,debit,12.50,,FRAIS-04
2024-04-05,Montant illisible,,12;5,,VIR-002
2024-04-06,Cheque fournisseur,,-300,Quincaillerie,CHQ-118
";

#[tokio::test]
async fn test_import_statement_collects_line_errors() -> Result<()> {
    let (service, _crm, _temp) = test_services().await?;
    let account = open_account(&service, "Ecobank", 100_000, 0).await?;

    let result = Importer::new(&service)
        .import_statement_csv(STATEMENT.as_bytes(), account.id, ImportOptions::default())
        .await?;

    assert_eq!(result.imported, 3);
    assert_eq!(result.skipped, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].line, 4);
    assert_eq!(result.errors[0].field.as_deref(), Some("amount"));

    // 1 000.00 + 1 500.00 - 12.50 - 300.00
    let account = service.get_account(account.id).await?;
    assert_eq!(account.balance, 218_750);

    let movements = service
        .list_movements(&MovementFilter {
            account_id: Some(account.id),
            ..Default::default()
        })
        .await?;
    assert_eq!(movements.len(), 3);
    assert_eq!(movements[1].direction, Direction::Outflow);
    assert_eq!(movements[1].date.to_string(), "2024-04-03");
    assert_eq!(movements[2].counterparty.as_deref(), Some("Quincaillerie"));

    Ok(())
}

#[tokio::test]
async fn test_import_skips_known_references() -> Result<()> {
    let (service, _crm, _temp) = test_services().await?;
    let account = open_account(&service, "Ecobank", 100_000, 0).await?;
    let importer = Importer::new(&service);
    let options = ImportOptions {
        skip_duplicates: true,
        ..Default::default()
    };

    let first = importer
        .import_statement_csv(STATEMENT.as_bytes(), account.id, options.clone())
        .await?;
    assert_eq!(first.imported, 3);

    let second = importer
        .import_statement_csv(STATEMENT.as_bytes(), account.id, options)
        .await?;
    assert_eq!(second.imported, 0);
    assert_eq!(second.skipped, 3);
    // The unreadable amount is still reported
    assert_eq!(second.errors.len(), 1);

    assert_eq!(service.get_account(account.id).await?.balance, 218_750);

    Ok(())
}

#[tokio::test]
async fn test_import_dry_run_records_nothing() -> Result<()> {
    let (service, _crm, _temp) = test_services().await?;
    let account = open_account(&service, "Ecobank", 0, 0).await?;

    let options = ImportOptions {
        dry_run: true,
        ..Default::default()
    };
    let result = Importer::new(&service)
        .import_statement_csv(STATEMENT.as_bytes(), account.id, options)
        .await?;

    assert_eq!(result.imported, 3);
    assert_eq!(service.get_account(account.id).await?.balance, 0);
    assert!(service
        .list_movements(&MovementFilter::default())
        .await?
        .is_empty());

    Ok(())
}

#[tokio::test]
async fn test_import_respects_overdraft_unless_forced() -> Result<()> {
    let (service, _crm, _temp) = test_services().await?;
    let account = open_account(&service, "Caisse", 0, 0).await?;
    let csv = "date,label,direction,amount,counterparty,reference\n2024-04-01,Sortie,,-50,,\n";

    let result = Importer::new(&service)
        .import_statement_csv(csv.as_bytes(), account.id, ImportOptions::default())
        .await?;
    assert_eq!(result.imported, 0);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].error.contains("Insufficient funds"));

    let forced = ImportOptions {
        force: true,
        ..Default::default()
    };
    let result = Importer::new(&service)
        .import_statement_csv(csv.as_bytes(), account.id, forced)
        .await?;
    assert_eq!(result.imported, 1);
    assert_eq!(service.get_account(account.id).await?.balance, -5_000);

    Ok(())
}

#[tokio::test]
async fn test_export_movements_csv() -> Result<()> {
    let (service, crm, _temp) = test_services().await?;
    let account = open_account(&service, "Ecobank", 10_000, 0).await?;
    record(&service, &account, Direction::Inflow, 2_550, "2024-04-02", "Vente comptoir").await?;
    record(&service, &account, Direction::Outflow, 1_000, "2024-04-03", "Taxi").await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service, &crm)
        .export_movements_csv(&mut buffer, &MovementFilter::default())
        .await?;
    assert_eq!(count, 2);

    let output = String::from_utf8(buffer)?;
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("sequence,id,date,account,label,direction,amount"));
    assert!(lines[1].contains("Vente comptoir,inflow,25.50"));
    assert!(lines[2].contains(",Ecobank,Taxi,outflow,10.00,"));
    assert!(lines[2].contains(",115.50,entered"));

    Ok(())
}

#[tokio::test]
async fn test_export_full_json_snapshot() -> Result<()> {
    let (service, crm, _temp) = test_services().await?;
    let account = open_account(&service, "Ecobank", 10_000, 0).await?;
    record(&service, &account, Direction::Inflow, 5_000, "2024-04-02", "Vente").await?;
    crm.create_customer("Faso Textile".to_string(), None, CustomerStats::default())
        .await?;

    let mut buffer = Vec::new();
    let snapshot = Exporter::new(&service, &crm)
        .export_full_json(&mut buffer)
        .await?;
    assert_eq!(snapshot.accounts.len(), 1);
    assert_eq!(snapshot.movements.len(), 1);
    assert_eq!(snapshot.customers.len(), 1);

    let parsed: DatabaseSnapshot = serde_json::from_slice(&buffer)?;
    assert_eq!(parsed.accounts[0].balance, 15_000);
    assert_eq!(parsed.movements[0].label, "Vente");
    assert_eq!(parsed.customers[0].name, "Faso Textile");
    assert!(parsed.forecasts.is_empty());

    Ok(())
}
