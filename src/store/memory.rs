//! In-memory store adapter
//!
//! Backs the full repository contract with shared hash-map tables behind an
//! `RwLock`. `begin` snapshots the tables and `rollback` restores the
//! snapshot, giving the unit of work real transaction semantics under the
//! single-writer assumption.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Account, AccountId, AllocationId, BudgetPeriod, BudgetPeriodId, Currency, DateRange, Envelope,
    EnvelopeAllocation, EnvelopeId, Money, Payee, PayeeId, SplitLine, SplitLineId, Transaction,
    TransactionId, TransactionKind,
};

use super::{
    AccountRepository, BudgetPeriodRepository, EnvelopeAllocationRepository, EnvelopeRepository,
    PayeeRepository, SplitLineRepository, TransactionRepository, UnitOfWork,
};

/// The raw tables of the store
#[derive(Debug, Clone, Default)]
struct Tables {
    accounts: HashMap<AccountId, Account>,
    envelopes: HashMap<EnvelopeId, Envelope>,
    transactions: HashMap<TransactionId, Transaction>,
    splits: HashMap<SplitLineId, SplitLine>,
    periods: HashMap<BudgetPeriodId, BudgetPeriod>,
    allocations: HashMap<AllocationId, EnvelopeAllocation>,
    payees: HashMap<PayeeId, Payee>,
}

type Shared = Arc<RwLock<Tables>>;

fn read(tables: &Shared) -> EngineResult<RwLockReadGuard<'_, Tables>> {
    tables
        .read()
        .map_err(|e| EngineError::Storage(format!("failed to acquire read lock: {}", e)))
}

fn write(tables: &Shared) -> EngineResult<RwLockWriteGuard<'_, Tables>> {
    tables
        .write()
        .map_err(|e| EngineError::Storage(format!("failed to acquire write lock: {}", e)))
}

/// In-memory unit of work over the shared tables
pub struct MemoryUnitOfWork {
    tables: Shared,
    snapshot: RwLock<Option<Tables>>,
    accounts: MemoryAccounts,
    envelopes: MemoryEnvelopes,
    transactions: MemoryTransactions,
    splits: MemorySplits,
    periods: MemoryPeriods,
    allocations: MemoryAllocations,
    payees: MemoryPayees,
}

impl MemoryUnitOfWork {
    /// Create an empty store
    pub fn new() -> Self {
        let tables: Shared = Arc::new(RwLock::new(Tables::default()));
        Self {
            accounts: MemoryAccounts {
                tables: tables.clone(),
            },
            envelopes: MemoryEnvelopes {
                tables: tables.clone(),
            },
            transactions: MemoryTransactions {
                tables: tables.clone(),
            },
            splits: MemorySplits {
                tables: tables.clone(),
            },
            periods: MemoryPeriods {
                tables: tables.clone(),
            },
            allocations: MemoryAllocations {
                tables: tables.clone(),
            },
            payees: MemoryPayees {
                tables: tables.clone(),
            },
            snapshot: RwLock::new(None),
            tables,
        }
    }

    fn snapshot_guard(&self) -> EngineResult<RwLockWriteGuard<'_, Option<Tables>>> {
        self.snapshot
            .write()
            .map_err(|e| EngineError::Storage(format!("failed to acquire snapshot lock: {}", e)))
    }
}

impl Default for MemoryUnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitOfWork for MemoryUnitOfWork {
    fn begin(&self) -> EngineResult<()> {
        let mut snapshot = self.snapshot_guard()?;
        if snapshot.is_some() {
            return Err(EngineError::Storage(
                "a unit of work is already in flight".into(),
            ));
        }
        *snapshot = Some((*read(&self.tables)?).clone());
        Ok(())
    }

    fn commit(&self) -> EngineResult<()> {
        let mut snapshot = self.snapshot_guard()?;
        if snapshot.take().is_none() {
            return Err(EngineError::Storage("no unit of work to commit".into()));
        }
        Ok(())
    }

    fn rollback(&self) -> EngineResult<()> {
        let mut snapshot = self.snapshot_guard()?;
        match snapshot.take() {
            Some(saved) => {
                *write(&self.tables)? = saved;
                Ok(())
            }
            None => Err(EngineError::Storage("no unit of work to roll back".into())),
        }
    }

    fn accounts(&self) -> &dyn AccountRepository {
        &self.accounts
    }

    fn envelopes(&self) -> &dyn EnvelopeRepository {
        &self.envelopes
    }

    fn transactions(&self) -> &dyn TransactionRepository {
        &self.transactions
    }

    fn splits(&self) -> &dyn SplitLineRepository {
        &self.splits
    }

    fn periods(&self) -> &dyn BudgetPeriodRepository {
        &self.periods
    }

    fn allocations(&self) -> &dyn EnvelopeAllocationRepository {
        &self.allocations
    }

    fn payees(&self) -> &dyn PayeeRepository {
        &self.payees
    }
}

struct MemoryAccounts {
    tables: Shared,
}

impl AccountRepository for MemoryAccounts {
    fn get_by_id(&self, id: AccountId) -> EngineResult<Option<Account>> {
        Ok(read(&self.tables)?.accounts.get(&id).cloned())
    }

    fn get_all(&self) -> EngineResult<Vec<Account>> {
        let tables = read(&self.tables)?;
        let mut accounts: Vec<_> = tables.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(accounts)
    }

    fn add(&self, account: Account) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if tables.accounts.contains_key(&account.id) {
            return Err(EngineError::Storage(format!(
                "duplicate account id {}",
                account.id
            )));
        }
        tables.accounts.insert(account.id, account);
        Ok(())
    }

    fn update(&self, account: Account) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if !tables.accounts.contains_key(&account.id) {
            return Err(EngineError::account_not_found(account.id));
        }
        tables.accounts.insert(account.id, account);
        Ok(())
    }

    fn delete(&self, id: AccountId) -> EngineResult<bool> {
        Ok(write(&self.tables)?.accounts.remove(&id).is_some())
    }

    fn exists(&self, id: AccountId) -> EngineResult<bool> {
        Ok(read(&self.tables)?.accounts.contains_key(&id))
    }
}

struct MemoryEnvelopes {
    tables: Shared,
}

impl EnvelopeRepository for MemoryEnvelopes {
    fn get_by_id(&self, id: EnvelopeId) -> EngineResult<Option<Envelope>> {
        Ok(read(&self.tables)?.envelopes.get(&id).cloned())
    }

    fn get_all(&self) -> EngineResult<Vec<Envelope>> {
        let tables = read(&self.tables)?;
        let mut envelopes: Vec<_> = tables.envelopes.values().cloned().collect();
        envelopes.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then(a.name.cmp(&b.name)));
        Ok(envelopes)
    }

    fn get_active(&self) -> EngineResult<Vec<Envelope>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|e| e.is_active)
            .collect())
    }

    fn add(&self, envelope: Envelope) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if tables.envelopes.contains_key(&envelope.id) {
            return Err(EngineError::Storage(format!(
                "duplicate envelope id {}",
                envelope.id
            )));
        }
        tables.envelopes.insert(envelope.id, envelope);
        Ok(())
    }

    fn update(&self, envelope: Envelope) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if !tables.envelopes.contains_key(&envelope.id) {
            return Err(EngineError::envelope_not_found(envelope.id));
        }
        tables.envelopes.insert(envelope.id, envelope);
        Ok(())
    }

    fn delete(&self, id: EnvelopeId) -> EngineResult<bool> {
        Ok(write(&self.tables)?.envelopes.remove(&id).is_some())
    }

    fn exists(&self, id: EnvelopeId) -> EngineResult<bool> {
        Ok(read(&self.tables)?.envelopes.contains_key(&id))
    }
}

struct MemoryTransactions {
    tables: Shared,
}

impl MemoryTransactions {
    /// Non-deleted rows, newest first
    fn active_sorted(tables: &Tables) -> Vec<Transaction> {
        let mut txns: Vec<_> = tables
            .transactions
            .values()
            .filter(|t| !t.is_deleted)
            .cloned()
            .collect();
        txns.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        txns
    }
}

impl TransactionRepository for MemoryTransactions {
    fn get_by_id(&self, id: TransactionId) -> EngineResult<Option<Transaction>> {
        Ok(read(&self.tables)?.transactions.get(&id).cloned())
    }

    fn get_all(&self) -> EngineResult<Vec<Transaction>> {
        Ok(Self::active_sorted(&*read(&self.tables)?))
    }

    fn add(&self, txn: Transaction) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if tables.transactions.contains_key(&txn.id) {
            return Err(EngineError::Storage(format!(
                "duplicate transaction id {}",
                txn.id
            )));
        }
        tables.transactions.insert(txn.id, txn);
        Ok(())
    }

    fn update(&self, txn: Transaction) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if !tables.transactions.contains_key(&txn.id) {
            return Err(EngineError::transaction_not_found(txn.id));
        }
        tables.transactions.insert(txn.id, txn);
        Ok(())
    }

    fn delete(&self, id: TransactionId) -> EngineResult<bool> {
        Ok(write(&self.tables)?.transactions.remove(&id).is_some())
    }

    fn exists(&self, id: TransactionId) -> EngineResult<bool> {
        Ok(read(&self.tables)?.transactions.contains_key(&id))
    }

    fn get_by_account(&self, account_id: AccountId) -> EngineResult<Vec<Transaction>> {
        Ok(Self::active_sorted(&*read(&self.tables)?)
            .into_iter()
            .filter(|t| t.account_id == account_id)
            .collect())
    }

    fn get_by_envelope(&self, envelope_id: EnvelopeId) -> EngineResult<Vec<Transaction>> {
        Ok(Self::active_sorted(&*read(&self.tables)?)
            .into_iter()
            .filter(|t| t.envelope_id == Some(envelope_id))
            .collect())
    }

    fn get_by_date_range(&self, range: DateRange) -> EngineResult<Vec<Transaction>> {
        Ok(Self::active_sorted(&*read(&self.tables)?)
            .into_iter()
            .filter(|t| range.contains(t.date))
            .collect())
    }

    fn get_by_account_in_range(
        &self,
        account_id: AccountId,
        range: DateRange,
    ) -> EngineResult<Vec<Transaction>> {
        Ok(Self::active_sorted(&*read(&self.tables)?)
            .into_iter()
            .filter(|t| t.account_id == account_id && range.contains(t.date))
            .collect())
    }

    fn get_uncleared_by_account(&self, account_id: AccountId) -> EngineResult<Vec<Transaction>> {
        Ok(Self::active_sorted(&*read(&self.tables)?)
            .into_iter()
            .filter(|t| t.account_id == account_id && !t.is_cleared)
            .collect())
    }

    fn get_unassigned(&self) -> EngineResult<Vec<Transaction>> {
        let tables = read(&self.tables)?;
        let split_parents: HashSet<TransactionId> =
            tables.splits.values().map(|s| s.transaction_id).collect();
        Ok(Self::active_sorted(&tables)
            .into_iter()
            .filter(|t| {
                t.kind == TransactionKind::Outflow
                    && t.envelope_id.is_none()
                    && !split_parents.contains(&t.id)
            })
            .collect())
    }

    fn account_balance(&self, account_id: AccountId, currency: Currency) -> EngineResult<Money> {
        let tables = read(&self.tables)?;
        let sum: Decimal = tables
            .transactions
            .values()
            .filter(|t| t.account_id == account_id && !t.is_deleted)
            .map(|t| t.amount.amount())
            .sum();
        Ok(Money::new(sum, currency))
    }

    fn account_cleared_balance(
        &self,
        account_id: AccountId,
        currency: Currency,
    ) -> EngineResult<Money> {
        let tables = read(&self.tables)?;
        let sum: Decimal = tables
            .transactions
            .values()
            .filter(|t| t.account_id == account_id && !t.is_deleted && t.is_cleared)
            .map(|t| t.amount.amount())
            .sum();
        Ok(Money::new(sum, currency))
    }

    fn envelope_spent_in_range(
        &self,
        envelope_id: EnvelopeId,
        range: DateRange,
        currency: Currency,
    ) -> EngineResult<Money> {
        let tables = read(&self.tables)?;
        let direct: Decimal = tables
            .transactions
            .values()
            .filter(|t| {
                !t.is_deleted
                    && t.kind == TransactionKind::Outflow
                    && t.envelope_id == Some(envelope_id)
                    && range.contains(t.date)
            })
            .map(|t| t.amount.amount().abs())
            .sum();
        let from_splits: Decimal = tables
            .splits
            .values()
            .filter(|s| s.envelope_id == envelope_id)
            .filter_map(|s| {
                tables.transactions.get(&s.transaction_id).and_then(|t| {
                    let counted = !t.is_deleted
                        && t.kind == TransactionKind::Outflow
                        && range.contains(t.date);
                    counted.then(|| s.amount.amount())
                })
            })
            .sum();
        Ok(Money::new(direct + from_splits, currency))
    }

    fn totals_for_range(
        &self,
        range: DateRange,
        currency: Currency,
    ) -> EngineResult<(Money, Money)> {
        let tables = read(&self.tables)?;
        let mut income = Decimal::ZERO;
        let mut spent = Decimal::ZERO;
        for txn in tables.transactions.values() {
            if txn.is_deleted
                || txn.kind == TransactionKind::Transfer
                || !range.contains(txn.date)
            {
                continue;
            }
            if txn.amount.is_positive() {
                income += txn.amount.amount();
            } else {
                spent += txn.amount.amount().abs();
            }
        }
        Ok((Money::new(income, currency), Money::new(spent, currency)))
    }
}

struct MemorySplits {
    tables: Shared,
}

impl SplitLineRepository for MemorySplits {
    fn get_by_id(&self, id: SplitLineId) -> EngineResult<Option<SplitLine>> {
        Ok(read(&self.tables)?.splits.get(&id).cloned())
    }

    fn get_by_transaction(&self, transaction_id: TransactionId) -> EngineResult<Vec<SplitLine>> {
        let tables = read(&self.tables)?;
        let mut splits: Vec<_> = tables
            .splits
            .values()
            .filter(|s| s.transaction_id == transaction_id)
            .cloned()
            .collect();
        splits.sort_by_key(|s| s.sort_order);
        Ok(splits)
    }

    fn add(&self, split: SplitLine) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if tables.splits.contains_key(&split.id) {
            return Err(EngineError::Storage(format!(
                "duplicate split id {}",
                split.id
            )));
        }
        tables.splits.insert(split.id, split);
        Ok(())
    }

    fn delete_by_transaction(&self, transaction_id: TransactionId) -> EngineResult<usize> {
        let mut tables = write(&self.tables)?;
        let before = tables.splits.len();
        tables.splits.retain(|_, s| s.transaction_id != transaction_id);
        Ok(before - tables.splits.len())
    }
}

struct MemoryPeriods {
    tables: Shared,
}

impl BudgetPeriodRepository for MemoryPeriods {
    fn get_by_id(&self, id: BudgetPeriodId) -> EngineResult<Option<BudgetPeriod>> {
        Ok(read(&self.tables)?.periods.get(&id).cloned())
    }

    fn get_by_year_month(&self, year: i32, month: u32) -> EngineResult<Option<BudgetPeriod>> {
        Ok(read(&self.tables)?
            .periods
            .values()
            .find(|p| p.year == year && p.month == month)
            .cloned())
    }

    fn get_all(&self) -> EngineResult<Vec<BudgetPeriod>> {
        let tables = read(&self.tables)?;
        let mut periods: Vec<_> = tables.periods.values().cloned().collect();
        periods.sort_by_key(|p| (p.year, p.month));
        Ok(periods)
    }

    fn add(&self, period: BudgetPeriod) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if tables
            .periods
            .values()
            .any(|p| p.year == period.year && p.month == period.month)
        {
            return Err(EngineError::Storage(format!(
                "duplicate budget period {:04}-{:02}",
                period.year, period.month
            )));
        }
        tables.periods.insert(period.id, period);
        Ok(())
    }

    fn update(&self, period: BudgetPeriod) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if !tables.periods.contains_key(&period.id) {
            return Err(EngineError::NotFound {
                entity: "BudgetPeriod",
                id: period.id.to_string(),
            });
        }
        tables.periods.insert(period.id, period);
        Ok(())
    }
}

struct MemoryAllocations {
    tables: Shared,
}

impl EnvelopeAllocationRepository for MemoryAllocations {
    fn get_by_id(&self, id: AllocationId) -> EngineResult<Option<EnvelopeAllocation>> {
        Ok(read(&self.tables)?.allocations.get(&id).cloned())
    }

    fn get_for_period(&self, period_id: BudgetPeriodId) -> EngineResult<Vec<EnvelopeAllocation>> {
        let tables = read(&self.tables)?;
        let mut allocations: Vec<_> = tables
            .allocations
            .values()
            .filter(|a| a.budget_period_id == period_id)
            .cloned()
            .collect();
        allocations.sort_by_key(|a| a.created_at);
        Ok(allocations)
    }

    fn get_by_envelope_and_period(
        &self,
        envelope_id: EnvelopeId,
        period_id: BudgetPeriodId,
    ) -> EngineResult<Option<EnvelopeAllocation>> {
        Ok(read(&self.tables)?
            .allocations
            .values()
            .find(|a| a.envelope_id == envelope_id && a.budget_period_id == period_id)
            .cloned())
    }

    fn add(&self, allocation: EnvelopeAllocation) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if tables.allocations.values().any(|a| {
            a.envelope_id == allocation.envelope_id
                && a.budget_period_id == allocation.budget_period_id
        }) {
            return Err(EngineError::Storage(
                "duplicate allocation for envelope and period".into(),
            ));
        }
        tables.allocations.insert(allocation.id, allocation);
        Ok(())
    }

    fn update(&self, allocation: EnvelopeAllocation) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if !tables.allocations.contains_key(&allocation.id) {
            return Err(EngineError::NotFound {
                entity: "EnvelopeAllocation",
                id: allocation.id.to_string(),
            });
        }
        tables.allocations.insert(allocation.id, allocation);
        Ok(())
    }

    fn total_allocated(
        &self,
        period_id: BudgetPeriodId,
        currency: Currency,
    ) -> EngineResult<Money> {
        let tables = read(&self.tables)?;
        let sum: Decimal = tables
            .allocations
            .values()
            .filter(|a| a.budget_period_id == period_id)
            .map(|a| a.allocated.amount())
            .sum();
        Ok(Money::new(sum, currency))
    }
}

struct MemoryPayees {
    tables: Shared,
}

impl PayeeRepository for MemoryPayees {
    fn get_by_id(&self, id: PayeeId) -> EngineResult<Option<Payee>> {
        Ok(read(&self.tables)?.payees.get(&id).cloned())
    }

    fn get_all(&self) -> EngineResult<Vec<Payee>> {
        let tables = read(&self.tables)?;
        let mut payees: Vec<_> = tables.payees.values().cloned().collect();
        payees.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(payees)
    }

    fn get_by_name(&self, name: &str) -> EngineResult<Option<Payee>> {
        Ok(read(&self.tables)?
            .payees
            .values()
            .find(|p| p.matches_name(name))
            .cloned())
    }

    fn search(&self, query: &str) -> EngineResult<Vec<Payee>> {
        let needle = Payee::normalize(query).to_lowercase();
        let tables = read(&self.tables)?;
        let mut hits: Vec<_> = tables
            .payees
            .values()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.transaction_count
                .cmp(&a.transaction_count)
                .then(a.name.cmp(&b.name))
        });
        Ok(hits)
    }

    fn add(&self, payee: Payee) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if tables.payees.values().any(|p| p.matches_name(&payee.name)) {
            return Err(EngineError::Storage(format!(
                "duplicate payee name '{}'",
                payee.name
            )));
        }
        tables.payees.insert(payee.id, payee);
        Ok(())
    }

    fn update(&self, payee: Payee) -> EngineResult<()> {
        let mut tables = write(&self.tables)?;
        if !tables.payees.contains_key(&payee.id) {
            return Err(EngineError::payee_not_found(payee.id));
        }
        tables.payees.insert(payee.id, payee);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AccountKind;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn usd(d: Decimal) -> Money {
        Money::new(d, Currency::USD)
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    #[test]
    fn test_begin_commit_rollback() {
        let uow = MemoryUnitOfWork::new();
        let account = Account::new("Checking", AccountKind::Checking, Currency::USD);
        let id = account.id;

        uow.begin().unwrap();
        uow.accounts().add(account).unwrap();
        // Read-your-writes inside the unit
        assert!(uow.accounts().exists(id).unwrap());
        uow.rollback().unwrap();
        assert!(!uow.accounts().exists(id).unwrap());

        uow.begin().unwrap();
        let account = Account::new("Checking", AccountKind::Checking, Currency::USD);
        let id = account.id;
        uow.accounts().add(account).unwrap();
        uow.commit().unwrap();
        assert!(uow.accounts().exists(id).unwrap());
    }

    #[test]
    fn test_nested_begin_rejected() {
        let uow = MemoryUnitOfWork::new();
        uow.begin().unwrap();
        assert!(uow.begin().is_err());
        uow.rollback().unwrap();
        assert!(uow.commit().is_err());
    }

    #[test]
    fn test_deleted_rows_excluded_from_queries() {
        let uow = MemoryUnitOfWork::new();
        let account = AccountId::new();
        let mut txn = Transaction::outflow(account, date(1), usd(dec!(10)), "Shop");
        txn.soft_delete().unwrap();
        uow.transactions().add(txn.clone()).unwrap();

        assert!(uow.transactions().get_by_account(account).unwrap().is_empty());
        assert!(uow
            .transactions()
            .account_balance(account, Currency::USD)
            .unwrap()
            .is_zero());
        // Raw fetch still sees the row
        assert!(uow.transactions().get_by_id(txn.id).unwrap().is_some());
    }

    #[test]
    fn test_balance_sums() {
        let uow = MemoryUnitOfWork::new();
        let account = AccountId::new();
        let mut cleared = Transaction::inflow(account, date(1), usd(dec!(100)), "Payroll");
        cleared.mark_cleared();
        uow.transactions().add(cleared).unwrap();
        uow.transactions()
            .add(Transaction::outflow(account, date(2), usd(dec!(30)), "Shop"))
            .unwrap();

        let balance = uow
            .transactions()
            .account_balance(account, Currency::USD)
            .unwrap();
        let cleared = uow
            .transactions()
            .account_cleared_balance(account, Currency::USD)
            .unwrap();
        assert_eq!(balance, usd(dec!(70)));
        assert_eq!(cleared, usd(dec!(100)));
    }

    #[test]
    fn test_envelope_spent_includes_splits() {
        let uow = MemoryUnitOfWork::new();
        let account = AccountId::new();
        let food = EnvelopeId::new();

        let mut direct = Transaction::outflow(account, date(5), usd(dec!(25)), "Cafe");
        direct.set_envelope(Some(food)).unwrap();
        uow.transactions().add(direct).unwrap();

        let split_parent = Transaction::outflow(account, date(6), usd(dec!(40)), "Market");
        uow.splits()
            .add(SplitLine::new(split_parent.id, food, usd(dec!(15)), 0))
            .unwrap();
        uow.splits()
            .add(SplitLine::new(
                split_parent.id,
                EnvelopeId::new(),
                usd(dec!(25)),
                1,
            ))
            .unwrap();
        uow.transactions().add(split_parent).unwrap();

        let range = DateRange::for_month(2026, 2).unwrap();
        let spent = uow
            .transactions()
            .envelope_spent_in_range(food, range, Currency::USD)
            .unwrap();
        assert_eq!(spent, usd(dec!(40)));
    }

    #[test]
    fn test_totals_exclude_transfers() {
        let uow = MemoryUnitOfWork::new();
        let a = AccountId::new();
        let b = AccountId::new();
        uow.transactions()
            .add(Transaction::inflow(a, date(1), usd(dec!(100)), "Payroll"))
            .unwrap();
        uow.transactions()
            .add(Transaction::outflow(a, date(2), usd(dec!(30)), "Shop"))
            .unwrap();
        uow.transactions()
            .add(Transaction::transfer_out(a, b, date(3), usd(dec!(50)), "t"))
            .unwrap();
        uow.transactions()
            .add(Transaction::transfer_in(b, a, date(3), usd(dec!(50)), "t"))
            .unwrap();

        let range = DateRange::for_month(2026, 2).unwrap();
        let (income, spent) = uow
            .transactions()
            .totals_for_range(range, Currency::USD)
            .unwrap();
        assert_eq!(income, usd(dec!(100)));
        assert_eq!(spent, usd(dec!(30)));
    }

    #[test]
    fn test_unassigned_query() {
        let uow = MemoryUnitOfWork::new();
        let account = AccountId::new();
        let plain = Transaction::outflow(account, date(1), usd(dec!(10)), "Shop");
        let plain_id = plain.id;
        uow.transactions().add(plain).unwrap();

        let mut assigned = Transaction::outflow(account, date(2), usd(dec!(10)), "Cafe");
        assigned.set_envelope(Some(EnvelopeId::new())).unwrap();
        uow.transactions().add(assigned).unwrap();

        let split_parent = Transaction::outflow(account, date(3), usd(dec!(10)), "Market");
        let split = SplitLine::new(split_parent.id, EnvelopeId::new(), usd(dec!(10)), 0);
        let split_id = split.id;
        uow.splits().add(split).unwrap();
        uow.transactions().add(split_parent).unwrap();

        let unassigned = uow.transactions().get_unassigned().unwrap();
        assert_eq!(unassigned.len(), 1);
        assert_eq!(unassigned[0].id, plain_id);
        assert!(uow.splits().get_by_id(split_id).unwrap().is_some());
    }

    #[test]
    fn test_period_unique_year_month() {
        let uow = MemoryUnitOfWork::new();
        uow.periods()
            .add(BudgetPeriod::new(2026, 2, Currency::USD).unwrap())
            .unwrap();
        assert!(uow
            .periods()
            .add(BudgetPeriod::new(2026, 2, Currency::USD).unwrap())
            .is_err());
        assert!(uow
            .periods()
            .get_by_year_month(2026, 2)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_payee_name_lookup_and_search() {
        let uow = MemoryUnitOfWork::new();
        let mut busy = Payee::new("Corner Cafe");
        busy.record_usage();
        busy.record_usage();
        let quiet = Payee::new("Corner Market");
        uow.payees().add(busy.clone()).unwrap();
        uow.payees().add(quiet).unwrap();

        assert!(uow.payees().get_by_name("  corner   cafe ").unwrap().is_some());
        assert!(uow.payees().add(Payee::new("CORNER CAFE")).is_err());

        let hits = uow.payees().search("corner").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, busy.id);
    }
}
