//! Reconciliation service
//!
//! Matches a set of cleared transactions against a bank statement's ending
//! balance. Targeted transactions move `uncleared -> cleared -> reconciled`;
//! any residual difference either becomes an explicit adjustment
//! transaction or fails the whole operation. The engine wraps this in a
//! unit of work, so a failure leaves no partial clears or reconciles.

use chrono::{NaiveDate, Utc};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::{AccountId, Money, Transaction, TransactionId};
use crate::services::payee::PayeeService;
use crate::services::transaction::TransactionService;
use crate::store::UnitOfWork;

/// Payee recorded on auto-created adjustment transactions
pub const ADJUSTMENT_PAYEE: &str = "Reconciliation Adjustment";

/// Memo recorded on auto-created adjustment transactions
pub const ADJUSTMENT_MEMO: &str = "Auto-created to match statement ending balance";

/// Input to a reconciliation run
#[derive(Debug, Clone)]
pub struct ReconciliationInput {
    pub account_id: AccountId,
    pub statement_date: NaiveDate,
    pub statement_ending_balance: Money,
    /// Transactions the user checked off against the statement
    pub transaction_ids: Vec<TransactionId>,
    /// Insert a balancing transaction when the difference is nonzero
    pub create_adjustment_if_needed: bool,
}

/// Result of a successful reconciliation
#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub statement_ending_balance: Money,
    /// The account's cleared balance after reconciliation; equals the
    /// statement balance
    pub cleared_balance: Money,
    /// Always zero on success
    pub difference: Money,
    /// Number of targeted transactions locked, adjustment excluded
    pub reconciled_transaction_count: usize,
    pub adjustment_transaction: Option<Transaction>,
}

/// Service running the statement reconciliation state machine
pub struct ReconciliationService<'a> {
    uow: &'a dyn UnitOfWork,
}

impl<'a> ReconciliationService<'a> {
    /// Create a new reconciliation service
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    fn load_targets(&self, input: &ReconciliationInput) -> EngineResult<Vec<Transaction>> {
        let mut targets = Vec::with_capacity(input.transaction_ids.len());
        for &id in &input.transaction_ids {
            let txn = self
                .uow
                .transactions()
                .get_by_id(id)?
                .ok_or_else(|| EngineError::transaction_not_found(id))?;
            if txn.account_id != input.account_id {
                return Err(EngineError::InvalidOperation(format!(
                    "transaction {} belongs to a different account",
                    id
                )));
            }
            if txn.is_deleted {
                return Err(EngineError::InvalidOperation(format!(
                    "transaction {} is deleted and cannot be reconciled",
                    id
                )));
            }
            if txn.is_reconciled {
                return Err(EngineError::InvalidOperation(format!(
                    "transaction {} is already reconciled",
                    id
                )));
            }
            targets.push(txn);
        }
        Ok(targets)
    }

    /// Run the full reconciliation
    pub fn reconcile(&self, input: ReconciliationInput) -> EngineResult<ReconciliationOutcome> {
        let account = self
            .uow
            .accounts()
            .get_by_id(input.account_id)?
            .ok_or_else(|| EngineError::account_not_found(input.account_id))?;
        if input.statement_ending_balance.currency() != account.currency {
            return Err(EngineError::InvalidOperation(format!(
                "statement currency {} does not match account currency {}",
                input.statement_ending_balance.currency(),
                account.currency
            )));
        }

        let targets = self.load_targets(&input)?;
        let transactions = TransactionService::new(self.uow);

        // Clear anything the user checked off that the bank already settled
        for txn in &targets {
            if !txn.is_cleared {
                let mut cleared = txn.clone();
                cleared.mark_cleared();
                self.uow.transactions().update(cleared)?;
            }
        }

        let refreshed = transactions.refresh_account_balances(input.account_id)?;
        let difference = input
            .statement_ending_balance
            .checked_sub(refreshed.cleared_balance)?;

        let mut adjustment = None;
        if !difference.is_zero() {
            if !input.create_adjustment_if_needed {
                return Err(EngineError::InvalidOperation(format!(
                    "reconciliation difference must be zero (is {})",
                    difference
                )));
            }
            // Positive difference means the statement holds more than the
            // ledger: record an inflow; negative records an outflow.
            let mut txn = if difference.is_positive() {
                Transaction::inflow(
                    input.account_id,
                    input.statement_date,
                    difference,
                    ADJUSTMENT_PAYEE,
                )
            } else {
                Transaction::outflow(
                    input.account_id,
                    input.statement_date,
                    difference.abs(),
                    ADJUSTMENT_PAYEE,
                )
            };
            txn.set_memo(Some(ADJUSTMENT_MEMO.to_string()));
            txn.mark_reconciled();
            txn.validate()?;
            self.uow.transactions().add(txn.clone())?;
            PayeeService::new(self.uow).record_usage(ADJUSTMENT_PAYEE)?;
            transactions.refresh_account_balances(input.account_id)?;
            adjustment = Some(txn);
        }

        // Lock the targeted transactions
        for txn in &targets {
            let mut reconciled = self
                .uow
                .transactions()
                .get_by_id(txn.id)?
                .ok_or_else(|| EngineError::transaction_not_found(txn.id))?;
            reconciled.mark_reconciled();
            self.uow.transactions().update(reconciled)?;
        }

        let mut account = transactions.refresh_account_balances(input.account_id)?;
        account.record_reconciled(Utc::now());
        self.uow.accounts().update(account.clone())?;

        info!(
            account = %account,
            count = targets.len(),
            adjusted = adjustment.is_some(),
            "reconciled account against statement"
        );
        Ok(ReconciliationOutcome {
            statement_ending_balance: input.statement_ending_balance,
            cleared_balance: account.cleared_balance,
            difference: Money::zero(account.currency),
            reconciled_transaction_count: targets.len(),
            adjustment_transaction: adjustment,
        })
    }
}
