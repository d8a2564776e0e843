use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;

use crate::application::{MovementDetails, TreasuryService};
use crate::domain::{AccountId, Cents, Direction, parse_cents};

/// Result of an import operation
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    /// Lines recorded, or that would be recorded in a dry run
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Error on one line of the input
#[derive(Debug, Clone, Serialize)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Validate every line without recording anything
    pub dry_run: bool,
    /// Skip lines whose reference already exists on the account
    pub skip_duplicates: bool,
    /// Record outflows even past the overdraft limit
    pub force: bool,
}

/// One line of a bank statement.
///
/// `direction` may be left empty, the sign of `amount` then decides.
#[derive(Debug, Deserialize)]
struct StatementLine {
    date: String,
    label: String,
    #[serde(default)]
    direction: Option<String>,
    amount: String,
    #[serde(default)]
    counterparty: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

/// Importer for loading bank statements into an account
pub struct Importer<'a> {
    service: &'a TreasuryService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a TreasuryService) -> Self {
        Self { service }
    }

    /// Import a statement CSV with the header
    /// `date,label,direction,amount,counterparty,reference`.
    pub async fn import_statement_csv<R: Read>(
        &self,
        reader: R,
        account_id: AccountId,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let account = self.service.get_account(account_id).await?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut result = ImportResult::default();
        let mut seen_references = HashSet::new();

        for (index, record) in csv_reader.deserialize::<StatementLine>().enumerate() {
            let line = index + 2; // header is line 1

            let entry = match record {
                Ok(entry) => entry,
                Err(e) => {
                    result.errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            let (direction, amount_cents) = match parse_amount(&entry) {
                Ok(parsed) => parsed,
                Err(error) => {
                    result.errors.push(error.at(line));
                    continue;
                }
            };

            let date = match parse_date(&entry.date) {
                Some(date) => date,
                None => {
                    result.errors.push(ImportError {
                        line,
                        field: Some("date".to_string()),
                        error: format!("Invalid date: {}", entry.date),
                    });
                    continue;
                }
            };

            let reference = entry.reference.filter(|r| !r.is_empty());
            if options.skip_duplicates {
                if let Some(reference) = &reference {
                    let already_recorded = !seen_references.insert(reference.clone())
                        || self
                            .service
                            .repository()
                            .find_movement_by_reference(account.id, reference)
                            .await?
                            .is_some();
                    if already_recorded {
                        result.skipped += 1;
                        continue;
                    }
                }
            }

            if options.dry_run {
                result.imported += 1;
                continue;
            }

            let details = MovementDetails {
                counterparty: entry.counterparty.filter(|c| !c.is_empty()),
                reference,
                ..Default::default()
            };

            match self
                .service
                .record_movement(
                    account.id,
                    direction,
                    amount_cents,
                    date,
                    entry.label,
                    details,
                    options.force,
                )
                .await
            {
                Ok(_) => result.imported += 1,
                Err(e) => result.errors.push(ImportError {
                    line,
                    field: None,
                    error: format!("Movement rejected: {}", e),
                }),
            }
        }

        Ok(result)
    }
}

struct FieldError {
    field: &'static str,
    error: String,
}

impl FieldError {
    fn at(self, line: usize) -> ImportError {
        ImportError {
            line,
            field: Some(self.field.to_string()),
            error: self.error,
        }
    }
}

/// Resolve the direction and the positive amount of a statement line.
fn parse_amount(entry: &StatementLine) -> std::result::Result<(Direction, Cents), FieldError> {
    let amount = parse_cents(&entry.amount).map_err(|e| FieldError {
        field: "amount",
        error: format!("Invalid amount '{}': {}", entry.amount, e),
    })?;
    if amount == 0 {
        return Err(FieldError {
            field: "amount",
            error: "Amount must not be zero".to_string(),
        });
    }

    match entry.direction.as_deref().filter(|d| !d.is_empty()) {
        Some(raw) => {
            let direction = Direction::from_str(raw).ok_or_else(|| FieldError {
                field: "direction",
                error: format!("Unknown direction: {}", raw),
            })?;
            Ok((direction, amount.abs()))
        }
        None if amount > 0 => Ok((Direction::Inflow, amount)),
        None => Ok((Direction::Outflow, -amount)),
    }
}

/// Statements use ISO dates or the French day-first format.
fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}
