//! Budget engine orchestrator
//!
//! The public facade. Every mutating operation runs inside one unit of
//! work: begin, execute the business action, recalculate each affected
//! month, read back a snapshot of the primary period, commit. Any failure
//! rolls the whole unit back and is mapped onto the stable wire codes, so
//! on-disk state either reflects the full operation or none of it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::models::{
    Account, AccountId, AccountKind, BudgetPeriod, Currency, DateRange, Envelope,
    EnvelopeAllocation, EnvelopeId, Money, Payee, Transaction, TransactionId,
};
use crate::services::{
    AccountPatch, AccountService, AllocationChange, AutoAssignMode, BudgetService, EnvelopePatch,
    EnvelopeService, ImportCommitRow, ImportOutcome, ImportPreview, ImportService, PayeeService,
    RecalculationService, ReconciliationInput, ReconciliationOutcome, ReconciliationService,
    RolloverOutcome, TransactionPatch, TransactionService,
};
use crate::services::{NewInflow, NewOutflow, NewTransfer, TransferPair};
use crate::store::{year_month, UnitOfWork};

/// Cooperative cancellation flag checked at store boundaries
///
/// Cancelling before an operation commits is equivalent to failure: the
/// unit of work rolls back. Cancelling after commit has no effect.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm the token for further operations
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One error on the wire
#[derive(Debug, Clone)]
pub struct EngineFault {
    pub code: ErrorCode,
    pub message: String,
    /// Parameter name, when the error refers to one
    pub target: Option<String>,
}

impl From<&EngineError> for EngineFault {
    fn from(err: &EngineError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            target: err.target().map(String::from),
        }
    }
}

/// Derived view of one budget period
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetSnapshot {
    pub year: i32,
    pub month: u32,
    pub is_closed: bool,
    pub carried_over: Money,
    pub total_income: Money,
    pub total_allocated: Money,
    pub total_spent: Money,
    pub ready_to_assign: Money,
}

impl BudgetSnapshot {
    fn from_period(period: &BudgetPeriod) -> Self {
        Self {
            year: period.year,
            month: period.month,
            is_closed: period.is_closed,
            carried_over: period.carried_over,
            total_income: period.total_income,
            total_allocated: period.total_allocated,
            total_spent: period.total_spent,
            ready_to_assign: period.ready_to_assign(),
        }
    }

    fn empty(year: i32, month: u32, currency: Currency) -> Self {
        Self {
            year,
            month,
            is_closed: false,
            carried_over: Money::zero(currency),
            total_income: Money::zero(currency),
            total_allocated: Money::zero(currency),
            total_spent: Money::zero(currency),
            ready_to_assign: Money::zero(currency),
        }
    }
}

/// Uniform result envelope for every engine operation
#[derive(Debug)]
pub struct OperationResult<T> {
    pub success: bool,
    pub errors: Vec<EngineFault>,
    pub snapshot: Option<BudgetSnapshot>,
    pub allocation_changes: Vec<AllocationChange>,
    pub value: Option<T>,
}

impl<T> OperationResult<T> {
    fn succeeded(
        value: T,
        snapshot: Option<BudgetSnapshot>,
        allocation_changes: Vec<AllocationChange>,
    ) -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            snapshot,
            allocation_changes,
            value: Some(value),
        }
    }

    fn failed(err: EngineError) -> Self {
        Self {
            success: false,
            errors: vec![EngineFault::from(&err)],
            snapshot: None,
            allocation_changes: Vec::new(),
            value: None,
        }
    }

    /// The value of a successful operation; panics message carries the
    /// first error otherwise. Test/consumer convenience.
    pub fn into_value(self) -> T {
        match self.value {
            Some(value) => value,
            None => panic!(
                "operation failed: {}",
                self.errors
                    .first()
                    .map(|f| f.message.clone())
                    .unwrap_or_default()
            ),
        }
    }
}

/// What a business action reports back to the engine envelope
struct Mutation<T> {
    value: T,
    changes: Vec<AllocationChange>,
    /// Months to recalculate, in the order given (deduplicated)
    recalc_months: Vec<(i32, u32)>,
    /// Period whose snapshot the caller gets back
    snapshot_month: Option<(i32, u32)>,
}

impl<T> Mutation<T> {
    fn bare(value: T) -> Self {
        Self {
            value,
            changes: Vec::new(),
            recalc_months: Vec::new(),
            snapshot_month: None,
        }
    }

    fn for_month(value: T, month: (i32, u32)) -> Self {
        Self {
            value,
            changes: Vec::new(),
            recalc_months: vec![month],
            snapshot_month: Some(month),
        }
    }

    fn with_changes(mut self, changes: Vec<AllocationChange>) -> Self {
        self.changes = changes;
        self
    }
}

/// The budget engine facade
pub struct BudgetEngine<U: UnitOfWork> {
    uow: U,
    currency: Currency,
    cancel: CancelToken,
}

impl BudgetEngine<crate::store::MemoryUnitOfWork> {
    /// Engine over a fresh in-memory store
    pub fn in_memory(currency: Currency) -> Self {
        Self::new(crate::store::MemoryUnitOfWork::new(), currency)
    }
}

impl<U: UnitOfWork> BudgetEngine<U> {
    /// Create an engine over a store adapter
    pub fn new(uow: U, currency: Currency) -> Self {
        Self {
            uow,
            currency,
            cancel: CancelToken::new(),
        }
    }

    /// The budget's base currency
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Handle callers can use to cancel in-flight operations
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn guard_cancel(&self) -> EngineResult<()> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    fn snapshot_for(&self, year: i32, month: u32) -> EngineResult<BudgetSnapshot> {
        Ok(match self.uow.periods().get_by_year_month(year, month)? {
            Some(period) => BudgetSnapshot::from_period(&period),
            None => BudgetSnapshot::empty(year, month, self.currency),
        })
    }

    /// The uniform envelope around a mutating business action
    fn mutate<T>(
        &self,
        op: impl FnOnce(&dyn UnitOfWork) -> EngineResult<Mutation<T>>,
    ) -> OperationResult<T> {
        if let Err(err) = self.guard_cancel() {
            return OperationResult::failed(err);
        }
        if let Err(err) = self.uow.begin() {
            return OperationResult::failed(err);
        }
        match self.run_to_commit(op) {
            Ok(result) => result,
            Err(err) => {
                if let Err(rollback_err) = self.uow.rollback() {
                    warn!(error = %rollback_err, "rollback failed");
                }
                OperationResult::failed(err)
            }
        }
    }

    fn run_to_commit<T>(
        &self,
        op: impl FnOnce(&dyn UnitOfWork) -> EngineResult<Mutation<T>>,
    ) -> EngineResult<OperationResult<T>> {
        let mutation = op(&self.uow)?;

        let recalc = RecalculationService::new(&self.uow, self.currency);
        let mut seen = Vec::new();
        for month in &mutation.recalc_months {
            if !seen.contains(month) {
                recalc.recalculate(month.0, month.1)?;
                seen.push(*month);
            }
        }

        let snapshot = match mutation.snapshot_month {
            Some((year, month)) => Some(self.snapshot_for(year, month)?),
            None => None,
        };

        // Cancellation before commit is a failure; after commit it is moot
        self.guard_cancel()?;
        self.uow.commit()?;
        Ok(OperationResult::succeeded(
            mutation.value,
            snapshot,
            mutation.changes,
        ))
    }

    /// Read-only envelope; no unit of work is begun
    fn read<T>(
        &self,
        op: impl FnOnce(&dyn UnitOfWork) -> EngineResult<T>,
    ) -> OperationResult<T> {
        match self.guard_cancel().and_then(|_| op(&self.uow)) {
            Ok(value) => OperationResult::succeeded(value, None, Vec::new()),
            Err(err) => OperationResult::failed(err),
        }
    }

    // ----- accounts -----

    /// Create an account in the budget's currency
    pub fn create_account(&self, name: &str, kind: AccountKind) -> OperationResult<Account> {
        self.mutate(|uow| {
            let account = AccountService::new(uow).create(name, kind, self.currency)?;
            Ok(Mutation::bare(account))
        })
    }

    /// Update account metadata
    pub fn update_account(&self, id: AccountId, patch: AccountPatch) -> OperationResult<Account> {
        self.mutate(|uow| Ok(Mutation::bare(AccountService::new(uow).update(id, patch)?)))
    }

    /// Close an account; requires a zero balance
    pub fn close_account(&self, id: AccountId) -> OperationResult<Account> {
        self.mutate(|uow| Ok(Mutation::bare(AccountService::new(uow).close(id)?)))
    }

    /// Reopen a closed account
    pub fn reopen_account(&self, id: AccountId) -> OperationResult<Account> {
        self.mutate(|uow| Ok(Mutation::bare(AccountService::new(uow).reopen(id)?)))
    }

    // ----- envelopes -----

    /// Create an envelope
    pub fn create_envelope(&self, name: &str, group: Option<&str>) -> OperationResult<Envelope> {
        self.mutate(|uow| Ok(Mutation::bare(EnvelopeService::new(uow).create(name, group)?)))
    }

    /// Update envelope metadata
    pub fn update_envelope(
        &self,
        id: EnvelopeId,
        patch: EnvelopePatch,
    ) -> OperationResult<Envelope> {
        self.mutate(|uow| Ok(Mutation::bare(EnvelopeService::new(uow).update(id, patch)?)))
    }

    /// Hide an envelope from pickers
    pub fn hide_envelope(&self, id: EnvelopeId) -> OperationResult<Envelope> {
        self.mutate(|uow| Ok(Mutation::bare(EnvelopeService::new(uow).hide(id)?)))
    }

    /// Unhide an envelope
    pub fn unhide_envelope(&self, id: EnvelopeId) -> OperationResult<Envelope> {
        self.mutate(|uow| Ok(Mutation::bare(EnvelopeService::new(uow).unhide(id)?)))
    }

    /// Archive an envelope, keeping its history
    pub fn archive_envelope(&self, id: EnvelopeId) -> OperationResult<Envelope> {
        self.mutate(|uow| Ok(Mutation::bare(EnvelopeService::new(uow).archive(id)?)))
    }

    // ----- transactions -----

    /// Record an outflow
    pub fn create_outflow(&self, input: NewOutflow) -> OperationResult<Transaction> {
        self.mutate(|uow| {
            let month = year_month(input.date);
            let txn = TransactionService::new(uow).create_outflow(input)?;
            Ok(Mutation::for_month(txn, month))
        })
    }

    /// Record an inflow
    pub fn create_inflow(&self, input: NewInflow) -> OperationResult<Transaction> {
        self.mutate(|uow| {
            let month = year_month(input.date);
            let txn = TransactionService::new(uow).create_inflow(input)?;
            Ok(Mutation::for_month(txn, month))
        })
    }

    /// Record a linked transfer pair
    pub fn create_transfer(&self, input: NewTransfer) -> OperationResult<TransferPair> {
        self.mutate(|uow| {
            let month = year_month(input.date);
            let pair = TransactionService::new(uow).create_transfer(input)?;
            Ok(Mutation::for_month(pair, month))
        })
    }

    /// Patch a transaction
    pub fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> OperationResult<Transaction> {
        self.mutate(|uow| {
            let service = TransactionService::new(uow);
            let before_month = year_month(service.get(id)?.date);
            let txn = service.update(id, patch)?;
            let after_month = year_month(txn.date);
            Ok(Mutation {
                value: txn,
                changes: Vec::new(),
                recalc_months: vec![before_month, after_month],
                snapshot_month: Some(after_month),
            })
        })
    }

    /// Soft-delete a transaction (and its linked transfer leg)
    pub fn delete_transaction(&self, id: TransactionId) -> OperationResult<Transaction> {
        self.mutate(|uow| {
            let txn = TransactionService::new(uow).soft_delete(id)?;
            let month = year_month(txn.date);
            Ok(Mutation::for_month(txn, month))
        })
    }

    /// Mark a transaction cleared
    pub fn mark_cleared(&self, id: TransactionId) -> OperationResult<Transaction> {
        self.mutate(|uow| {
            let txn = TransactionService::new(uow).mark_cleared(id)?;
            let month = year_month(txn.date);
            Ok(Mutation::for_month(txn, month))
        })
    }

    /// Return a transaction to uncleared
    pub fn mark_uncleared(&self, id: TransactionId) -> OperationResult<Transaction> {
        self.mutate(|uow| {
            let txn = TransactionService::new(uow).mark_uncleared(id)?;
            let month = year_month(txn.date);
            Ok(Mutation::for_month(txn, month))
        })
    }

    /// Assign a transaction to an envelope
    pub fn assign_to_envelope(
        &self,
        id: TransactionId,
        envelope_id: EnvelopeId,
    ) -> OperationResult<Transaction> {
        self.mutate(|uow| {
            let txn = TransactionService::new(uow).assign_to_envelope(id, envelope_id)?;
            let month = year_month(txn.date);
            Ok(Mutation::for_month(txn, month))
        })
    }

    // ----- budget -----

    /// Set an envelope's allocation for a month
    pub fn set_allocation(
        &self,
        envelope_id: EnvelopeId,
        amount: Money,
        year: i32,
        month: u32,
    ) -> OperationResult<AllocationChange> {
        self.mutate(|uow| {
            let change = BudgetService::new(uow, self.currency)
                .set_allocation(envelope_id, amount, year, month)?;
            Ok(Mutation::for_month(change.clone(), (year, month)).with_changes(vec![change]))
        })
    }

    /// Adjust an envelope's allocation by a signed delta
    pub fn adjust_allocation(
        &self,
        envelope_id: EnvelopeId,
        delta: Money,
        year: i32,
        month: u32,
    ) -> OperationResult<AllocationChange> {
        self.mutate(|uow| {
            let change = BudgetService::new(uow, self.currency)
                .adjust_allocation(envelope_id, delta, year, month)?;
            Ok(Mutation::for_month(change.clone(), (year, month)).with_changes(vec![change]))
        })
    }

    /// Move allocation between two envelopes
    pub fn move_allocation(
        &self,
        from: EnvelopeId,
        to: EnvelopeId,
        amount: Money,
        year: i32,
        month: u32,
    ) -> OperationResult<Vec<AllocationChange>> {
        self.mutate(|uow| {
            let changes = BudgetService::new(uow, self.currency)
                .move_allocation(from, to, amount, year, month)?;
            Ok(Mutation::for_month(changes.clone(), (year, month)).with_changes(changes))
        })
    }

    /// Set a funding goal on an envelope
    pub fn set_goal(
        &self,
        envelope_id: EnvelopeId,
        amount: Money,
        target_date: Option<NaiveDate>,
    ) -> OperationResult<Envelope> {
        self.mutate(|uow| {
            let envelope =
                BudgetService::new(uow, self.currency).set_goal(envelope_id, amount, target_date)?;
            Ok(Mutation::bare(envelope))
        })
    }

    /// Fund goal envelopes from ready-to-assign
    pub fn auto_assign_to_goals(
        &self,
        mode: AutoAssignMode,
        year: i32,
        month: u32,
    ) -> OperationResult<Vec<AllocationChange>> {
        self.mutate(|uow| {
            let changes = BudgetService::new(uow, self.currency)
                .auto_assign_to_goals(mode, year, month)?;
            Ok(Mutation::for_month(changes.clone(), (year, month)).with_changes(changes))
        })
    }

    /// Close a month and seed the next
    pub fn rollover(&self, year: i32, month: u32) -> OperationResult<RolloverOutcome> {
        self.mutate(|uow| {
            let outcome = BudgetService::new(uow, self.currency).rollover(year, month)?;
            let next = (outcome.next_period.year, outcome.next_period.month);
            // The closing month was recalculated before it was frozen;
            // only the seeded month needs a pass here.
            Ok(Mutation::for_month(outcome, next))
        })
    }

    // ----- import -----

    /// Parse and classify a CSV file (read-only)
    pub fn preview_import(
        &self,
        account_id: AccountId,
        csv_text: &str,
    ) -> OperationResult<ImportPreview> {
        self.read(|uow| ImportService::new(uow, self.currency).preview(account_id, csv_text))
    }

    /// Insert confirmed import rows and recalculate every touched month
    pub fn commit_import(
        &self,
        account_id: AccountId,
        rows: Vec<ImportCommitRow>,
    ) -> OperationResult<ImportOutcome> {
        self.mutate(|uow| {
            let outcome = ImportService::new(uow, self.currency).commit(account_id, &rows)?;
            let months = outcome.impacted_months.clone();
            let snapshot_month = months.last().copied();
            Ok(Mutation {
                value: outcome,
                changes: Vec::new(),
                recalc_months: months,
                snapshot_month,
            })
        })
    }

    // ----- reconciliation -----

    /// Reconcile an account against a statement
    pub fn reconcile(&self, input: ReconciliationInput) -> OperationResult<ReconciliationOutcome> {
        self.mutate(|uow| {
            let month = year_month(input.statement_date);
            let outcome = ReconciliationService::new(uow).reconcile(input)?;
            Ok(Mutation::for_month(outcome, month))
        })
    }

    // ----- reads -----

    /// Snapshot of one month's derived state
    pub fn snapshot(&self, year: i32, month: u32) -> OperationResult<BudgetSnapshot> {
        self.read(|_| self.snapshot_for(year, month))
    }

    /// All accounts in display order
    pub fn accounts(&self) -> OperationResult<Vec<Account>> {
        self.read(|uow| AccountService::new(uow).list())
    }

    /// All envelopes in display order
    pub fn envelopes(&self) -> OperationResult<Vec<Envelope>> {
        self.read(|uow| EnvelopeService::new(uow).list())
    }

    /// An account's transactions over the trailing `days` window
    pub fn recent_transactions(
        &self,
        account_id: AccountId,
        end: NaiveDate,
        days: u32,
    ) -> OperationResult<Vec<Transaction>> {
        self.read(|uow| {
            let range = DateRange::last_n_days(end, days);
            uow.transactions().get_by_account_in_range(account_id, range)
        })
    }

    /// A month's transactions across all accounts
    pub fn transactions_in_month(&self, year: i32, month: u32) -> OperationResult<Vec<Transaction>> {
        self.read(|uow| {
            let range = DateRange::for_month(year, month)
                .map_err(|e| EngineError::validation_for("month", e.to_string()))?;
            uow.transactions().get_by_date_range(range)
        })
    }

    /// Transactions directly assigned to an envelope
    pub fn envelope_transactions(
        &self,
        envelope_id: EnvelopeId,
    ) -> OperationResult<Vec<Transaction>> {
        self.read(|uow| uow.transactions().get_by_envelope(envelope_id))
    }

    /// All payees, alphabetical
    pub fn payees(&self) -> OperationResult<Vec<Payee>> {
        self.read(|uow| uow.payees().get_all())
    }

    /// Ranked payee search
    pub fn search_payees(&self, query: &str) -> OperationResult<Vec<Payee>> {
        self.read(|uow| PayeeService::new(uow).search(query))
    }

    /// Outflows with no envelope and no splits, oldest debts first
    pub fn unassigned_outflows(&self) -> OperationResult<Vec<Transaction>> {
        self.read(|uow| uow.transactions().get_unassigned())
    }

    /// An account's not-yet-cleared transactions
    pub fn uncleared_transactions(
        &self,
        account_id: AccountId,
    ) -> OperationResult<Vec<Transaction>> {
        self.read(|uow| uow.transactions().get_uncleared_by_account(account_id))
    }

    /// Every budget period on record, oldest first
    pub fn periods(&self) -> OperationResult<Vec<BudgetPeriod>> {
        self.read(|uow| uow.periods().get_all())
    }

    /// One envelope's allocation row for a month, if any
    pub fn allocation(
        &self,
        envelope_id: EnvelopeId,
        year: i32,
        month: u32,
    ) -> OperationResult<Option<EnvelopeAllocation>> {
        self.read(|uow| match uow.periods().get_by_year_month(year, month)? {
            Some(period) => uow
                .allocations()
                .get_by_envelope_and_period(envelope_id, period.id),
            None => Ok(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn usd(d: Decimal) -> Money {
        Money::new(d, Currency::USD)
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn engine() -> BudgetEngine<crate::store::MemoryUnitOfWork> {
        BudgetEngine::in_memory(Currency::USD)
    }

    #[test]
    fn test_success_envelope_carries_snapshot() {
        let engine = engine();
        let account = engine
            .create_account("Checking", AccountKind::Checking)
            .into_value();

        let result = engine.create_inflow(NewInflow {
            account_id: account.id,
            date: date(1),
            amount: usd(dec!(100)),
            payee: "Payroll".into(),
            memo: None,
        });
        assert!(result.success);
        let snapshot = result.snapshot.unwrap();
        assert_eq!((snapshot.year, snapshot.month), (2026, 2));
        assert_eq!(snapshot.total_income, usd(dec!(100)));
        assert_eq!(snapshot.ready_to_assign, usd(dec!(100)));
    }

    #[test]
    fn test_failure_rolls_back_and_maps_code() {
        let engine = engine();
        let account = engine
            .create_account("Checking", AccountKind::Checking)
            .into_value();

        // Unknown envelope fails the outflow after the account was loaded
        let result = engine.create_outflow(NewOutflow {
            account_id: account.id,
            date: date(10),
            amount: usd(dec!(25)),
            payee: "Cafe".into(),
            envelope_id: Some(EnvelopeId::new()),
            splits: Vec::new(),
            memo: None,
        });
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::Validation);

        // Nothing was persisted: no transactions, balances untouched
        let recent = engine
            .recent_transactions(account.id, date(28), 60)
            .into_value();
        assert!(recent.is_empty());
        let accounts = engine.accounts().into_value();
        assert!(accounts[0].balance.is_zero());
    }

    #[test]
    fn test_error_code_strings() {
        let engine = engine();
        let result = engine.set_allocation(EnvelopeId::new(), usd(dec!(-5)), 2026, 2);
        assert!(!result.success);
        assert_eq!(result.errors[0].code.as_str(), "VALIDATION");
        assert_eq!(result.errors[0].target.as_deref(), Some("amount"));

        let envelope = engine.create_envelope("Food", None).into_value();
        engine
            .set_allocation(envelope.id, usd(dec!(10)), 2026, 2)
            .into_value();
        engine.rollover(2026, 2).into_value();
        let result = engine.set_allocation(envelope.id, usd(dec!(20)), 2026, 2);
        assert_eq!(result.errors[0].code.as_str(), "INVALID_OPERATION");
    }

    #[test]
    fn test_cancellation_prevents_commit() {
        let engine = engine();
        let token = engine.cancel_token();
        token.cancel();

        let result = engine.create_envelope("Food", None);
        assert!(!result.success);
        assert_eq!(result.errors[0].code, ErrorCode::Unexpected);

        token.reset();
        assert!(engine.create_envelope("Food", None).success);
    }

    #[test]
    fn test_allocation_changes_reported() {
        let engine = engine();
        let food = engine.create_envelope("Food", None).into_value();
        let gas = engine.create_envelope("Gas", None).into_value();
        engine
            .set_allocation(food.id, usd(dec!(40)), 2026, 2)
            .into_value();
        engine
            .set_allocation(gas.id, usd(dec!(20)), 2026, 2)
            .into_value();

        let result = engine.move_allocation(food.id, gas.id, usd(dec!(15)), 2026, 2);
        assert!(result.success);
        assert_eq!(result.allocation_changes.len(), 2);
        assert_eq!(result.allocation_changes[0].delta(), usd(dec!(-15)));
        assert_eq!(result.allocation_changes[1].delta(), usd(dec!(15)));
        let snapshot = result.snapshot.unwrap();
        assert_eq!(snapshot.total_allocated, usd(dec!(60)));
    }

    #[test]
    fn test_snapshot_read_of_missing_period_is_zeroed() {
        let engine = engine();
        let snapshot = engine.snapshot(2031, 7).into_value();
        assert_eq!((snapshot.year, snapshot.month), (2031, 7));
        assert!(snapshot.total_income.is_zero());
        assert!(!snapshot.is_closed);
    }
}
