//! Persistence contract consumed by the engine
//!
//! One repository trait per root entity plus a unit-of-work that scopes a
//! store transaction. The engine only ever talks to these traits; the
//! bundled adapter is the in-memory store in [`memory`], and a relational
//! adapter implements the same contract over its own schema.
//!
//! Soft-deleted transactions are excluded from every query here except
//! `get_by_id`, which loads the raw row so services can inspect state.

pub mod memory;

pub use memory::MemoryUnitOfWork;

use chrono::NaiveDate;

use crate::error::EngineResult;
use crate::models::{
    Account, AccountId, AllocationId, BudgetPeriod, BudgetPeriodId, Currency, DateRange, Envelope,
    EnvelopeAllocation, EnvelopeId, Money, Payee, PayeeId, SplitLine, SplitLineId, Transaction,
    TransactionId,
};

/// Accounts table
pub trait AccountRepository {
    fn get_by_id(&self, id: AccountId) -> EngineResult<Option<Account>>;
    fn get_all(&self) -> EngineResult<Vec<Account>>;
    fn add(&self, account: Account) -> EngineResult<()>;
    fn update(&self, account: Account) -> EngineResult<()>;
    fn delete(&self, id: AccountId) -> EngineResult<bool>;
    fn exists(&self, id: AccountId) -> EngineResult<bool>;
}

/// Envelopes table
pub trait EnvelopeRepository {
    fn get_by_id(&self, id: EnvelopeId) -> EngineResult<Option<Envelope>>;
    fn get_all(&self) -> EngineResult<Vec<Envelope>>;
    /// Active (non-archived) envelopes, in display order
    fn get_active(&self) -> EngineResult<Vec<Envelope>>;
    fn add(&self, envelope: Envelope) -> EngineResult<()>;
    fn update(&self, envelope: Envelope) -> EngineResult<()>;
    fn delete(&self, id: EnvelopeId) -> EngineResult<bool>;
    fn exists(&self, id: EnvelopeId) -> EngineResult<bool>;
}

/// Transactions table, including the derived sums the engine leans on
pub trait TransactionRepository {
    /// Raw row fetch; includes soft-deleted rows
    fn get_by_id(&self, id: TransactionId) -> EngineResult<Option<Transaction>>;
    fn get_all(&self) -> EngineResult<Vec<Transaction>>;
    fn add(&self, txn: Transaction) -> EngineResult<()>;
    fn update(&self, txn: Transaction) -> EngineResult<()>;
    fn delete(&self, id: TransactionId) -> EngineResult<bool>;
    fn exists(&self, id: TransactionId) -> EngineResult<bool>;

    fn get_by_account(&self, account_id: AccountId) -> EngineResult<Vec<Transaction>>;
    fn get_by_envelope(&self, envelope_id: EnvelopeId) -> EngineResult<Vec<Transaction>>;
    fn get_by_date_range(&self, range: DateRange) -> EngineResult<Vec<Transaction>>;
    fn get_by_account_in_range(
        &self,
        account_id: AccountId,
        range: DateRange,
    ) -> EngineResult<Vec<Transaction>>;
    fn get_uncleared_by_account(&self, account_id: AccountId) -> EngineResult<Vec<Transaction>>;

    /// Outflows with neither an envelope nor splits; transfers excluded
    fn get_unassigned(&self) -> EngineResult<Vec<Transaction>>;

    /// Sum of non-deleted amounts on an account
    fn account_balance(&self, account_id: AccountId, currency: Currency) -> EngineResult<Money>;

    /// Sum of cleared, non-deleted amounts on an account
    fn account_cleared_balance(
        &self,
        account_id: AccountId,
        currency: Currency,
    ) -> EngineResult<Money>;

    /// Absolute spending attributed to an envelope in a range: directly
    /// assigned outflows plus split-line contributions
    fn envelope_spent_in_range(
        &self,
        envelope_id: EnvelopeId,
        range: DateRange,
        currency: Currency,
    ) -> EngineResult<Money>;

    /// `(income, spent_abs)` for a range, transfers and deleted excluded
    fn totals_for_range(
        &self,
        range: DateRange,
        currency: Currency,
    ) -> EngineResult<(Money, Money)>;
}

/// Split lines table
pub trait SplitLineRepository {
    fn get_by_id(&self, id: SplitLineId) -> EngineResult<Option<SplitLine>>;
    fn get_by_transaction(&self, transaction_id: TransactionId) -> EngineResult<Vec<SplitLine>>;
    fn add(&self, split: SplitLine) -> EngineResult<()>;
    fn delete_by_transaction(&self, transaction_id: TransactionId) -> EngineResult<usize>;
}

/// Budget periods table
pub trait BudgetPeriodRepository {
    fn get_by_id(&self, id: BudgetPeriodId) -> EngineResult<Option<BudgetPeriod>>;
    fn get_by_year_month(&self, year: i32, month: u32) -> EngineResult<Option<BudgetPeriod>>;
    fn get_all(&self) -> EngineResult<Vec<BudgetPeriod>>;
    fn add(&self, period: BudgetPeriod) -> EngineResult<()>;
    fn update(&self, period: BudgetPeriod) -> EngineResult<()>;
}

/// Envelope allocations table
pub trait EnvelopeAllocationRepository {
    fn get_by_id(&self, id: AllocationId) -> EngineResult<Option<EnvelopeAllocation>>;
    fn get_for_period(&self, period_id: BudgetPeriodId) -> EngineResult<Vec<EnvelopeAllocation>>;
    fn get_by_envelope_and_period(
        &self,
        envelope_id: EnvelopeId,
        period_id: BudgetPeriodId,
    ) -> EngineResult<Option<EnvelopeAllocation>>;
    fn add(&self, allocation: EnvelopeAllocation) -> EngineResult<()>;
    fn update(&self, allocation: EnvelopeAllocation) -> EngineResult<()>;

    /// Sum of `allocated` across a period's allocations
    fn total_allocated(
        &self,
        period_id: BudgetPeriodId,
        currency: Currency,
    ) -> EngineResult<Money>;
}

/// Payees table
pub trait PayeeRepository {
    fn get_by_id(&self, id: PayeeId) -> EngineResult<Option<Payee>>;
    fn get_all(&self) -> EngineResult<Vec<Payee>>;
    /// Case-insensitive lookup of a normalized name
    fn get_by_name(&self, name: &str) -> EngineResult<Option<Payee>>;
    /// Prefix or substring match, ranked by `transaction_count` descending
    fn search(&self, query: &str) -> EngineResult<Vec<Payee>>;
    fn add(&self, payee: Payee) -> EngineResult<()>;
    fn update(&self, payee: Payee) -> EngineResult<()>;
}

/// A scoped store transaction holding the repository handles
///
/// The engine serializes operations: exactly one unit of work is in flight
/// at any time, and a mutation made through one repository is visible to
/// the next read in the same unit (read-your-writes).
pub trait UnitOfWork {
    fn begin(&self) -> EngineResult<()>;
    fn commit(&self) -> EngineResult<()>;
    fn rollback(&self) -> EngineResult<()>;

    fn accounts(&self) -> &dyn AccountRepository;
    fn envelopes(&self) -> &dyn EnvelopeRepository;
    fn transactions(&self) -> &dyn TransactionRepository;
    fn splits(&self) -> &dyn SplitLineRepository;
    fn periods(&self) -> &dyn BudgetPeriodRepository;
    fn allocations(&self) -> &dyn EnvelopeAllocationRepository;
    fn payees(&self) -> &dyn PayeeRepository;
}

/// Helper: the `(year, month)` key a transaction date falls in
pub fn year_month(date: NaiveDate) -> (i32, u32) {
    use chrono::Datelike;
    (date.year(), date.month())
}
