//! CSV import service
//!
//! Two-phase bank statement import: `preview` parses and classifies every
//! row without touching the store, `commit` inserts only the rows the
//! caller confirmed. Duplicate detection rides on a SHA-256 fingerprint of
//! the transaction-equivalent fields, so committing the same file twice
//! inserts nothing the second time.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::str::FromStr;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::{AccountId, Currency, DateRange, Money, Transaction};
use crate::services::transaction::{NewInflow, NewOutflow, TransactionService};
use crate::store::{year_month, UnitOfWork};

/// Classification of one parsed CSV row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportRowStatus {
    /// Will be inserted on commit
    New,
    /// Matches an existing transaction or an earlier row in the same file
    Duplicate,
    /// Unparseable date, blank payee, or unusable amount
    Invalid,
}

/// One row of the import preview
#[derive(Debug, Clone)]
pub struct ImportRowPreview {
    /// Physical row number in the file, 1-based, counting the header
    pub row_number: usize,
    pub date: Option<NaiveDate>,
    /// Signed amount: negative withdrawal, positive deposit
    pub amount: Option<Money>,
    pub payee: String,
    pub memo: Option<String>,
    pub status: ImportRowStatus,
    pub fingerprint: Option<String>,
    pub error: Option<String>,
}

/// Result of the preview phase
#[derive(Debug, Clone)]
pub struct ImportPreview {
    pub rows: Vec<ImportRowPreview>,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub invalid_count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// A confirmed row handed back to `commit`
#[derive(Debug, Clone)]
pub struct ImportCommitRow {
    pub date: NaiveDate,
    /// Signed amount as previewed
    pub amount: Money,
    pub payee: String,
    pub memo: Option<String>,
    pub fingerprint: String,
}

/// Result of the commit phase
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub inserted_count: usize,
    pub skipped_duplicate_count: usize,
    /// Distinct months touched, ascending; the caller recalculates each
    pub impacted_months: Vec<(i32, u32)>,
}

/// Resolved column positions for one file
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    date: Option<usize>,
    payee: Option<usize>,
    memo: Option<usize>,
    amount: Option<usize>,
    deposit: Option<usize>,
    withdrawal: Option<usize>,
}

const DATE_FORMATS: [&str; 8] = [
    "%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d/%m/%Y", "%d/%m/%y", "%Y/%m/%d", "%m-%d-%Y",
    "%d-%m-%Y",
];

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Uppercased, trimmed, internal whitespace collapsed
fn canonical(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Deterministic SHA-256 identity of a transaction-equivalent record
pub fn fingerprint(
    account_id: AccountId,
    date: NaiveDate,
    amount: Money,
    payee: &str,
    memo: Option<&str>,
) -> String {
    let canon = format!(
        "{}|{}|{}|{}|{}|{}",
        account_id.simple_hex(),
        date.format("%Y-%m-%d"),
        amount.amount(),
        amount.currency(),
        canonical(payee),
        canonical(memo.unwrap_or(""))
    );
    let digest = Sha256::digest(canon.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut acc, b| {
        let _ = write!(acc, "{:02x}", b);
        acc
    })
}

/// Service for the CSV import pipeline
pub struct ImportService<'a> {
    uow: &'a dyn UnitOfWork,
    currency: Currency,
}

impl<'a> ImportService<'a> {
    /// Create a new import service
    pub fn new(uow: &'a dyn UnitOfWork, currency: Currency) -> Self {
        Self { uow, currency }
    }

    fn resolve_columns(headers: &StringRecord) -> ColumnMap {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            let h = header.trim().to_lowercase();
            if h.is_empty() {
                continue;
            }
            if h.contains("date") {
                map.date.get_or_insert(idx);
            } else if matches!(h.as_str(), "amount" | "amt" | "value") {
                map.amount.get_or_insert(idx);
            } else if h.contains("deposit") || h.contains("credit") || h.contains("inflow") {
                map.deposit.get_or_insert(idx);
            } else if h.contains("withdrawal") || h.contains("debit") || h.contains("outflow") {
                map.withdrawal.get_or_insert(idx);
            } else if h.contains("payee")
                || h.contains("description")
                || h.contains("merchant")
                || h.contains("name")
                || h.contains("transaction")
            {
                map.payee.get_or_insert(idx);
            } else if h.contains("memo") || h.contains("note") || h.contains("details") {
                map.memo.get_or_insert(idx);
            }
        }
        map
    }

    /// Positional fallback for files with no header row
    fn positional_columns(width: usize) -> ColumnMap {
        ColumnMap {
            date: Some(0),
            payee: (width > 1).then_some(1),
            amount: (width > 2).then_some(2),
            memo: (width > 3).then_some(3),
            deposit: None,
            withdrawal: None,
        }
    }

    fn looks_like_data_row(record: &StringRecord) -> bool {
        record
            .get(0)
            .map(|cell| parse_date(cell).is_some())
            .unwrap_or(false)
    }

    /// Parse one amount cell: currency symbols, thousands separators, and
    /// `(…)` accounting negatives are accepted
    fn parse_amount_cell(&self, raw: &str) -> Result<Money, String> {
        let s = raw.trim();
        if s.is_empty() {
            return Err("blank amount".to_string());
        }
        let (paren_negative, inner) = if s.starts_with('(') && s.ends_with(')') && s.len() > 2 {
            (true, &s[1..s.len() - 1])
        } else {
            (false, s)
        };
        let cleaned: String = inner
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
            .collect();
        let value = Decimal::from_str(&cleaned)
            .map_err(|_| format!("could not parse amount '{}'", raw))?;
        let value = if paren_negative { -value.abs() } else { value };
        Ok(Money::new(value, self.currency))
    }

    fn parse_row_amount(&self, record: &StringRecord, map: &ColumnMap) -> Result<Money, String> {
        if let Some(idx) = map.amount {
            let cell = record.get(idx).unwrap_or("").trim();
            if !cell.is_empty() {
                return self.parse_amount_cell(cell);
            }
        }
        match (map.deposit, map.withdrawal) {
            (None, None) => Err("no amount column".to_string()),
            (deposit, withdrawal) => {
                let deposit_cell = deposit.and_then(|i| record.get(i)).unwrap_or("").trim();
                let withdrawal_cell =
                    withdrawal.and_then(|i| record.get(i)).unwrap_or("").trim();
                if deposit_cell.is_empty() && withdrawal_cell.is_empty() {
                    return Err("blank amount".to_string());
                }
                let mut value = Decimal::ZERO;
                if !deposit_cell.is_empty() {
                    value += self.parse_amount_cell(deposit_cell)?.amount().abs();
                }
                if !withdrawal_cell.is_empty() {
                    value -= self.parse_amount_cell(withdrawal_cell)?.amount().abs();
                }
                Ok(Money::new(value, self.currency))
            }
        }
    }

    fn parse_row(
        &self,
        account_id: AccountId,
        record: &StringRecord,
        map: &ColumnMap,
        row_number: usize,
    ) -> ImportRowPreview {
        let invalid = |payee: String, date, amount, error: String| ImportRowPreview {
            row_number,
            date,
            amount,
            payee,
            memo: None,
            status: ImportRowStatus::Invalid,
            fingerprint: None,
            error: Some(error),
        };

        let date_cell = map.date.and_then(|i| record.get(i)).unwrap_or("");
        let payee = map
            .payee
            .and_then(|i| record.get(i))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let memo = map
            .memo
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let date = match parse_date(date_cell) {
            Some(date) => date,
            None => {
                return invalid(
                    payee,
                    None,
                    None,
                    format!("could not parse date '{}'", date_cell.trim()),
                )
            }
        };
        if payee.is_empty() {
            return invalid(payee, Some(date), None, "blank payee".to_string());
        }
        let amount = match self.parse_row_amount(record, map) {
            Ok(amount) => amount,
            Err(error) => return invalid(payee, Some(date), None, error),
        };
        if amount.is_zero() {
            return invalid(payee, Some(date), Some(amount), "zero amount".to_string());
        }

        let fingerprint = fingerprint(account_id, date, amount, &payee, memo.as_deref());
        ImportRowPreview {
            row_number,
            date: Some(date),
            amount: Some(amount),
            payee,
            memo,
            status: ImportRowStatus::New,
            fingerprint: Some(fingerprint),
            error: None,
        }
    }

    /// Fingerprints of the account's existing rows covering `range`
    fn existing_fingerprints(
        &self,
        account_id: AccountId,
        range: DateRange,
    ) -> EngineResult<HashSet<String>> {
        let existing: Vec<Transaction> = self
            .uow
            .transactions()
            .get_by_account_in_range(account_id, range)?;
        Ok(existing
            .iter()
            .map(|t| fingerprint(account_id, t.date, t.amount, &t.payee, t.memo.as_deref()))
            .collect())
    }

    /// Parse and classify a CSV file without writing anything
    pub fn preview(&self, account_id: AccountId, csv_text: &str) -> EngineResult<ImportPreview> {
        let account = self
            .uow
            .accounts()
            .get_by_id(account_id)?
            .ok_or_else(|| EngineError::account_not_found(account_id))?;
        if !account.is_active {
            return Err(EngineError::InvalidOperation(format!(
                "account '{}' is closed",
                account.name
            )));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(csv_text.as_bytes());

        let mut records: Vec<(usize, StringRecord)> = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record =
                result.map_err(|e| EngineError::validation_for("csv", e.to_string()))?;
            // Skip rows that are entirely blank
            if record.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }
            // Physical line number so skipped blanks still count
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(idx + 1);
            records.push((line, record));
        }

        if records.is_empty() {
            return Ok(ImportPreview {
                rows: Vec::new(),
                new_count: 0,
                duplicate_count: 0,
                invalid_count: 0,
                first_date: None,
                last_date: None,
            });
        }

        let (map, data_start) = if Self::looks_like_data_row(&records[0].1) {
            (Self::positional_columns(records[0].1.len()), 0)
        } else {
            (Self::resolve_columns(&records[0].1), 1)
        };
        if map.date.is_none() {
            return Err(EngineError::validation_for(
                "csv",
                "no date column could be identified",
            ));
        }

        let mut rows: Vec<ImportRowPreview> = records[data_start..]
            .iter()
            .map(|(row_number, record)| self.parse_row(account_id, record, &map, *row_number))
            .collect();

        let parsed_dates: Vec<NaiveDate> = rows.iter().filter_map(|r| r.date).collect();
        let first_date = parsed_dates.iter().min().copied();
        let last_date = parsed_dates.iter().max().copied();

        // Duplicate classification against the store and within the file
        let existing = match (first_date, last_date) {
            (Some(start), Some(end)) => {
                let range = DateRange::new(start, end)
                    .map_err(|e| EngineError::validation_for("csv", e.to_string()))?;
                self.existing_fingerprints(account_id, range)?
            }
            _ => HashSet::new(),
        };
        let mut seen: HashSet<String> = HashSet::new();
        for row in &mut rows {
            if row.status != ImportRowStatus::New {
                continue;
            }
            if let Some(fp) = &row.fingerprint {
                if existing.contains(fp) || !seen.insert(fp.clone()) {
                    row.status = ImportRowStatus::Duplicate;
                }
            }
        }

        let new_count = rows.iter().filter(|r| r.status == ImportRowStatus::New).count();
        let duplicate_count = rows
            .iter()
            .filter(|r| r.status == ImportRowStatus::Duplicate)
            .count();
        let invalid_count = rows
            .iter()
            .filter(|r| r.status == ImportRowStatus::Invalid)
            .count();

        Ok(ImportPreview {
            rows,
            new_count,
            duplicate_count,
            invalid_count,
            first_date,
            last_date,
        })
    }

    /// Insert confirmed rows, skipping anything already present
    ///
    /// Existing fingerprints are re-queried at commit time and an in-batch
    /// seen set guards against repeats inside the batch, so replaying the
    /// same rows is a no-op.
    pub fn commit(
        &self,
        account_id: AccountId,
        rows: &[ImportCommitRow],
    ) -> EngineResult<ImportOutcome> {
        if rows.is_empty() {
            return Ok(ImportOutcome {
                inserted_count: 0,
                skipped_duplicate_count: 0,
                impacted_months: Vec::new(),
            });
        }

        let start = rows.iter().map(|r| r.date).min().unwrap_or_default();
        let end = rows.iter().map(|r| r.date).max().unwrap_or_default();
        let range = DateRange::new(start, end)
            .map_err(|e| EngineError::validation_for("rows", e.to_string()))?;
        let existing = self.existing_fingerprints(account_id, range)?;

        let transactions = TransactionService::new(self.uow);
        let mut seen: HashSet<String> = HashSet::new();
        let mut inserted = 0usize;
        let mut skipped = 0usize;
        let mut months: Vec<(i32, u32)> = Vec::new();

        for row in rows {
            if existing.contains(&row.fingerprint) || !seen.insert(row.fingerprint.clone()) {
                skipped += 1;
                continue;
            }
            if row.amount.is_zero() {
                return Err(EngineError::validation_for(
                    "rows",
                    "zero amounts cannot be imported",
                ));
            }
            if row.amount.is_positive() {
                transactions.create_inflow(NewInflow {
                    account_id,
                    date: row.date,
                    amount: row.amount,
                    payee: row.payee.clone(),
                    memo: row.memo.clone(),
                })?;
            } else {
                transactions.create_outflow(NewOutflow {
                    account_id,
                    date: row.date,
                    amount: row.amount.abs(),
                    payee: row.payee.clone(),
                    envelope_id: None,
                    splits: Vec::new(),
                    memo: row.memo.clone(),
                })?;
            }
            inserted += 1;
            let month = year_month(row.date);
            if !months.contains(&month) {
                months.push(month);
            }
        }

        months.sort_unstable();
        info!(inserted, skipped, "committed CSV import");
        Ok(ImportOutcome {
            inserted_count: inserted,
            skipped_duplicate_count: skipped,
            impacted_months: months,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountKind;
    use crate::services::account::AccountService;
    use crate::store::MemoryUnitOfWork;
    use rust_decimal_macros::dec;

    fn usd(d: Decimal) -> Money {
        Money::new(d, Currency::USD)
    }

    fn setup(uow: &MemoryUnitOfWork) -> AccountId {
        AccountService::new(uow)
            .create("Checking", AccountKind::Checking, Currency::USD)
            .unwrap()
            .id
    }

    fn commit_rows(preview: &ImportPreview) -> Vec<ImportCommitRow> {
        preview
            .rows
            .iter()
            .filter(|r| r.status == ImportRowStatus::New)
            .map(|r| ImportCommitRow {
                date: r.date.unwrap(),
                amount: r.amount.unwrap(),
                payee: r.payee.clone(),
                memo: r.memo.clone(),
                fingerprint: r.fingerprint.clone().unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_fingerprint_normalizes_payee_and_memo() {
        let account = AccountId::new();
        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let a = fingerprint(account, date, usd(dec!(-5)), " corner  cafe ", Some("latte"));
        let b = fingerprint(account, date, usd(dec!(-5)), "CORNER CAFE", Some(" LATTE "));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let c = fingerprint(account, date, usd(dec!(-5.01)), "CORNER CAFE", Some("LATTE"));
        assert_ne!(a, c);
    }

    #[test]
    fn test_preview_with_headers() {
        let uow = MemoryUnitOfWork::new();
        let account_id = setup(&uow);
        let service = ImportService::new(&uow, Currency::USD);

        let csv = "Date,Description,Amount,Notes\n\
                   2026-02-02,Groceries,-40.00,weekly\n\
                   2026-02-03,Paycheck,$100.00,\n";
        let preview = service.preview(account_id, csv).unwrap();
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.new_count, 2);
        assert_eq!(preview.rows[0].amount, Some(usd(dec!(-40))));
        assert_eq!(preview.rows[0].memo.as_deref(), Some("weekly"));
        assert_eq!(preview.rows[1].amount, Some(usd(dec!(100))));
        assert_eq!(preview.rows[0].row_number, 2);
        assert_eq!(
            preview.first_date,
            NaiveDate::from_ymd_opt(2026, 2, 2)
        );
    }

    #[test]
    fn test_preview_deposit_withdrawal_pair() {
        let uow = MemoryUnitOfWork::new();
        let account_id = setup(&uow);
        let service = ImportService::new(&uow, Currency::USD);

        let csv = "Posted Date,Merchant,Withdrawal,Deposit\n\
                   02/02/2026,Groceries,40.00,\n\
                   02/03/2026,Paycheck,,100.00\n";
        let preview = service.preview(account_id, csv).unwrap();
        assert_eq!(preview.rows[0].amount, Some(usd(dec!(-40))));
        assert_eq!(preview.rows[1].amount, Some(usd(dec!(100))));
    }

    #[test]
    fn test_preview_headerless_and_accounting_negative() {
        let uow = MemoryUnitOfWork::new();
        let account_id = setup(&uow);
        let service = ImportService::new(&uow, Currency::USD);

        let csv = "2026-02-02,Groceries,(40.00)\n2026-02-03,Paycheck,100.00\n";
        let preview = service.preview(account_id, csv).unwrap();
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.rows[0].amount, Some(usd(dec!(-40))));
        assert_eq!(preview.rows[0].row_number, 1);
    }

    #[test]
    fn test_preview_invalid_rows() {
        let uow = MemoryUnitOfWork::new();
        let account_id = setup(&uow);
        let service = ImportService::new(&uow, Currency::USD);

        let csv = "Date,Description,Amount\n\
                   not-a-date,Shop,-5.00\n\
                   2026-02-02,,-5.00\n\
                   2026-02-03,Shop,zero\n\
                   2026-02-04,Shop,0.00\n\
                   \n\
                   2026-02-05,Shop,-5.00\n";
        let preview = service.preview(account_id, csv).unwrap();
        assert_eq!(preview.rows.len(), 5);
        assert_eq!(preview.invalid_count, 4);
        assert_eq!(preview.new_count, 1);
        assert!(preview.rows[0].error.is_some());
        // The blank line is skipped, not reported
        assert_eq!(preview.rows[4].row_number, 7);
    }

    #[test]
    fn test_duplicate_detection_and_idempotent_commit() {
        let uow = MemoryUnitOfWork::new();
        let account_id = setup(&uow);
        let service = ImportService::new(&uow, Currency::USD);

        // Seed an existing transaction matching the first CSV row
        let transactions = TransactionService::new(&uow);
        transactions
            .create_outflow(NewOutflow {
                account_id,
                date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                amount: usd(dec!(5)),
                payee: "Coffee".into(),
                envelope_id: None,
                splits: Vec::new(),
                memo: None,
            })
            .unwrap();

        let csv = "Date,Description,Amount\n\
                   2026-02-01,Coffee,-5.00\n\
                   2026-02-02,Groceries,-40.00\n\
                   2026-02-03,Paycheck,100.00\n\
                   2026-02-03,Paycheck,100.00\n";
        let preview = service.preview(account_id, csv).unwrap();
        assert_eq!(preview.new_count, 2);
        assert_eq!(preview.duplicate_count, 2);

        let rows = commit_rows(&preview);
        let outcome = service.commit(account_id, &rows).unwrap();
        assert_eq!(outcome.inserted_count, 2);
        assert_eq!(outcome.skipped_duplicate_count, 0);
        assert_eq!(outcome.impacted_months, vec![(2026, 2)]);

        // Replaying the same rows inserts nothing
        let replay = service.commit(account_id, &rows).unwrap();
        assert_eq!(replay.inserted_count, 0);
        assert_eq!(replay.skipped_duplicate_count, 2);
    }

    #[test]
    fn test_commit_empty() {
        let uow = MemoryUnitOfWork::new();
        let account_id = setup(&uow);
        let service = ImportService::new(&uow, Currency::USD);
        let outcome = service.commit(account_id, &[]).unwrap();
        assert_eq!(outcome.inserted_count, 0);
        assert!(outcome.impacted_months.is_empty());
    }
}
