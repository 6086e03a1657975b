//! Business logic layer
//!
//! Each service borrows the unit of work it operates inside; the engine
//! facade owns transaction boundaries and recalculation fan-out.

pub mod account;
pub mod budget;
pub mod envelope;
pub mod import;
pub mod payee;
pub mod recalc;
pub mod reconciliation;
pub mod transaction;

pub use account::{AccountPatch, AccountService};
pub use budget::{AllocationChange, AutoAssignMode, BudgetService, RolloverOutcome};
pub use envelope::{EnvelopePatch, EnvelopeService};
pub use import::{
    fingerprint, ImportCommitRow, ImportOutcome, ImportPreview, ImportRowPreview, ImportRowStatus,
    ImportService,
};
pub use payee::PayeeService;
pub use recalc::RecalculationService;
pub use reconciliation::{
    ReconciliationInput, ReconciliationOutcome, ReconciliationService, ADJUSTMENT_MEMO,
    ADJUSTMENT_PAYEE,
};
pub use transaction::{
    NewInflow, NewOutflow, NewSplit, NewTransfer, TransactionPatch, TransactionService,
    TransferPair,
};
