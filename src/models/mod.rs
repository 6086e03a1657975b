//! Core data models for the budget engine
//!
//! All the typed entities of the budgeting domain plus the two value types
//! (money, date range) that everything else is built on.

pub mod account;
pub mod allocation;
pub mod date_range;
pub mod envelope;
pub mod ids;
pub mod money;
pub mod payee;
pub mod period;
pub mod transaction;

pub use account::{Account, AccountKind, AccountValidationError};
pub use allocation::{AllocationValidationError, EnvelopeAllocation};
pub use date_range::{DateRange, DateRangeError};
pub use envelope::{Envelope, EnvelopeValidationError};
pub use ids::{
    AccountId, AllocationId, BudgetPeriodId, EnvelopeId, PayeeId, SplitLineId, TransactionId,
};
pub use money::{Currency, Money, MoneyError};
pub use payee::{Payee, PayeeValidationError};
pub use period::{BudgetPeriod, PeriodStateError};
pub use transaction::{
    SplitLine, Transaction, TransactionKind, TransactionStateError, TransactionValidationError,
};
