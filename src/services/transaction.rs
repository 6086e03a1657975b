//! Transaction service
//!
//! Create, update, and soft-delete of inflows, outflows (optionally split
//! across envelopes), and linked transfer pairs. Every mutation here also
//! refreshes the cached balances of the accounts it touched, so
//! `balance = cleared + uncleared` holds at every observable point.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    Account, AccountId, EnvelopeId, Money, SplitLine, Transaction, TransactionId,
};
use crate::services::envelope::EnvelopeService;
use crate::services::payee::PayeeService;
use crate::store::UnitOfWork;

/// Service for transaction management
pub struct TransactionService<'a> {
    uow: &'a dyn UnitOfWork,
}

/// One envelope's share of a new split outflow
#[derive(Debug, Clone)]
pub struct NewSplit {
    pub envelope_id: EnvelopeId,
    /// Positive part amount
    pub amount: Money,
}

/// Input for creating an outflow
#[derive(Debug, Clone)]
pub struct NewOutflow {
    pub account_id: AccountId,
    pub date: chrono::NaiveDate,
    /// Absolute amount spent; stored negative
    pub amount: Money,
    pub payee: String,
    /// Direct envelope assignment; mutually exclusive with `splits`
    pub envelope_id: Option<EnvelopeId>,
    /// Split assignment; amounts must sum to `amount`
    pub splits: Vec<NewSplit>,
    pub memo: Option<String>,
}

/// Input for creating an inflow
///
/// Inflows are never envelope-assigned and never split.
#[derive(Debug, Clone)]
pub struct NewInflow {
    pub account_id: AccountId,
    pub date: chrono::NaiveDate,
    /// Absolute amount received; stored positive
    pub amount: Money,
    pub payee: String,
    pub memo: Option<String>,
}

/// Input for creating a linked transfer pair
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub date: chrono::NaiveDate,
    /// Absolute amount moved
    pub amount: Money,
    pub memo: Option<String>,
}

/// The two legs of a created transfer
#[derive(Debug, Clone)]
pub struct TransferPair {
    pub from_transaction: Transaction,
    pub to_transaction: Transaction,
}

/// Partial update for an existing transaction
///
/// `None` leaves a field untouched. The nested options distinguish
/// "clear the field" from "no change". Replacing `splits` replaces the
/// entire set; an empty vector removes all splits.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub date: Option<chrono::NaiveDate>,
    /// Absolute amount; the stored sign is preserved by kind
    pub amount: Option<Money>,
    pub payee: Option<String>,
    pub memo: Option<Option<String>>,
    pub envelope_id: Option<Option<EnvelopeId>>,
    pub splits: Option<Vec<NewSplit>>,
}

impl<'a> TransactionService<'a> {
    /// Create a new transaction service
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    fn get_active_account(&self, id: AccountId) -> EngineResult<Account> {
        let account = self
            .uow
            .accounts()
            .get_by_id(id)?
            .ok_or_else(|| EngineError::account_not_found(id))?;
        if !account.is_active {
            return Err(EngineError::InvalidOperation(format!(
                "account '{}' is closed",
                account.name
            )));
        }
        Ok(account)
    }

    fn require_positive(amount: Money, target: &str) -> EngineResult<()> {
        if !amount.is_positive() {
            return Err(EngineError::validation_for(
                target,
                "amount must be positive",
            ));
        }
        Ok(())
    }

    fn require_account_currency(amount: Money, account: &Account) -> EngineResult<()> {
        if amount.currency() != account.currency {
            return Err(EngineError::InvalidOperation(format!(
                "amount currency {} does not match account currency {}",
                amount.currency(),
                account.currency
            )));
        }
        Ok(())
    }

    /// Fetch a raw transaction row or fail
    pub fn get(&self, id: TransactionId) -> EngineResult<Transaction> {
        self.uow
            .transactions()
            .get_by_id(id)?
            .ok_or_else(|| EngineError::transaction_not_found(id))
    }

    fn get_editable(&self, id: TransactionId) -> EngineResult<Transaction> {
        let txn = self.get(id)?;
        if txn.is_deleted {
            return Err(EngineError::InvalidOperation(format!(
                "transaction {} is deleted",
                id
            )));
        }
        Ok(txn)
    }

    /// Recompute and persist an account's cached balances from the ledger
    pub fn refresh_account_balances(&self, account_id: AccountId) -> EngineResult<Account> {
        let mut account = self
            .uow
            .accounts()
            .get_by_id(account_id)?
            .ok_or_else(|| EngineError::account_not_found(account_id))?;
        let balance = self
            .uow
            .transactions()
            .account_balance(account_id, account.currency)?;
        let cleared = self
            .uow
            .transactions()
            .account_cleared_balance(account_id, account.currency)?;
        account.apply_balances(balance, cleared);
        self.uow.accounts().update(account.clone())?;
        Ok(account)
    }

    fn validate_splits(
        &self,
        splits: &[NewSplit],
        magnitude: Money,
    ) -> EngineResult<()> {
        let envelopes = EnvelopeService::new(self.uow);
        let mut sum = Decimal::ZERO;
        for split in splits {
            Self::require_positive(split.amount, "splits")?;
            if split.amount.currency() != magnitude.currency() {
                return Err(EngineError::InvalidOperation(format!(
                    "split currency {} does not match transaction currency {}",
                    split.amount.currency(),
                    magnitude.currency()
                )));
            }
            envelopes.get_active(split.envelope_id)?;
            sum += split.amount.amount();
        }
        if sum != magnitude.amount().abs() {
            return Err(EngineError::InvalidOperation(format!(
                "split amounts sum to {} but the transaction amount is {}",
                sum,
                magnitude.abs()
            )));
        }
        Ok(())
    }

    fn insert_splits(&self, txn_id: TransactionId, splits: &[NewSplit]) -> EngineResult<()> {
        for (idx, split) in splits.iter().enumerate() {
            self.uow.splits().add(SplitLine::new(
                txn_id,
                split.envelope_id,
                split.amount,
                idx as u32,
            ))?;
        }
        Ok(())
    }

    /// Create an outflow, optionally assigned to an envelope or split
    pub fn create_outflow(&self, input: NewOutflow) -> EngineResult<Transaction> {
        Self::require_positive(input.amount, "amount")?;
        let account = self.get_active_account(input.account_id)?;
        Self::require_account_currency(input.amount, &account)?;

        if input.envelope_id.is_some() && !input.splits.is_empty() {
            return Err(EngineError::validation_for(
                "envelopeId",
                "a transaction cannot have both an envelope and splits",
            ));
        }
        if !input.splits.is_empty() {
            self.validate_splits(&input.splits, input.amount)?;
        } else if let Some(envelope_id) = input.envelope_id {
            EnvelopeService::new(self.uow).get_active(envelope_id)?;
        }

        let mut txn =
            Transaction::outflow(input.account_id, input.date, input.amount, input.payee);
        txn.set_memo(input.memo);
        if input.splits.is_empty() {
            txn.set_envelope(input.envelope_id)?;
        }
        txn.validate()?;

        self.uow.transactions().add(txn.clone())?;
        self.insert_splits(txn.id, &input.splits)?;
        PayeeService::new(self.uow).record_usage(&txn.payee)?;
        self.refresh_account_balances(txn.account_id)?;

        info!(txn = %txn, "created outflow");
        Ok(txn)
    }

    /// Create an inflow
    pub fn create_inflow(&self, input: NewInflow) -> EngineResult<Transaction> {
        Self::require_positive(input.amount, "amount")?;
        let account = self.get_active_account(input.account_id)?;
        Self::require_account_currency(input.amount, &account)?;

        let mut txn = Transaction::inflow(input.account_id, input.date, input.amount, input.payee);
        txn.set_memo(input.memo);
        txn.validate()?;

        self.uow.transactions().add(txn.clone())?;
        PayeeService::new(self.uow).record_usage(&txn.payee)?;
        self.refresh_account_balances(txn.account_id)?;

        info!(txn = %txn, "created inflow");
        Ok(txn)
    }

    /// Create a linked transfer pair between two accounts
    ///
    /// The rows are inserted unlinked and then pointed at each other, so a
    /// store with referential integrity never sees a dangling link.
    pub fn create_transfer(&self, input: NewTransfer) -> EngineResult<TransferPair> {
        Self::require_positive(input.amount, "amount")?;
        if input.from_account_id == input.to_account_id {
            return Err(EngineError::validation_for(
                "toAccountId",
                "cannot transfer to the same account",
            ));
        }
        let from_account = self.get_active_account(input.from_account_id)?;
        let to_account = self.get_active_account(input.to_account_id)?;
        Self::require_account_currency(input.amount, &from_account)?;
        if from_account.currency != to_account.currency {
            return Err(EngineError::InvalidOperation(format!(
                "cannot transfer between {} and {} accounts",
                from_account.currency, to_account.currency
            )));
        }

        let mut from_txn = Transaction::transfer_out(
            input.from_account_id,
            input.to_account_id,
            input.date,
            input.amount,
            format!("Transfer to {}", to_account.name),
        );
        let mut to_txn = Transaction::transfer_in(
            input.to_account_id,
            input.from_account_id,
            input.date,
            input.amount,
            format!("Transfer from {}", from_account.name),
        );
        from_txn.set_memo(input.memo.clone());
        to_txn.set_memo(input.memo);

        from_txn.validate()?;
        to_txn.validate()?;

        // Two-phase: insert both, then link both
        self.uow.transactions().add(from_txn.clone())?;
        self.uow.transactions().add(to_txn.clone())?;
        from_txn.link_transfer(to_txn.id);
        to_txn.link_transfer(from_txn.id);
        self.uow.transactions().update(from_txn.clone())?;
        self.uow.transactions().update(to_txn.clone())?;

        self.refresh_account_balances(input.from_account_id)?;
        self.refresh_account_balances(input.to_account_id)?;

        info!(from = %from_txn, to = %to_txn, "created transfer");
        Ok(TransferPair {
            from_transaction: from_txn,
            to_transaction: to_txn,
        })
    }

    fn load_linked(&self, txn: &Transaction) -> EngineResult<Option<Transaction>> {
        match txn.linked_transaction_id {
            Some(linked_id) => Ok(Some(self.get(linked_id)?)),
            None => Ok(None),
        }
    }

    /// Apply a partial update
    pub fn update(&self, id: TransactionId, patch: TransactionPatch) -> EngineResult<Transaction> {
        let mut txn = self.get_editable(id)?;
        if txn.is_reconciled {
            return Err(EngineError::InvalidOperation(format!(
                "transaction {} is reconciled and cannot be edited",
                id
            )));
        }

        let existing_splits = self.uow.splits().get_by_transaction(id)?;
        let has_splits_after = match &patch.splits {
            Some(new_splits) => !new_splits.is_empty(),
            None => !existing_splits.is_empty(),
        };

        if txn.is_transfer() && patch.splits.is_some() {
            return Err(EngineError::InvalidOperation(
                "transfers cannot be split".into(),
            ));
        }
        if patch.splits.as_ref().map_or(false, |s| !s.is_empty()) && !txn.is_outflow() {
            return Err(EngineError::InvalidOperation(
                "only outflows can be split".into(),
            ));
        }
        if patch.amount.is_some() && !existing_splits.is_empty() && patch.splits.is_none() {
            return Err(EngineError::InvalidOperation(
                "changing the amount of a split transaction requires new splits".into(),
            ));
        }
        if matches!(patch.envelope_id, Some(Some(_))) && has_splits_after {
            return Err(EngineError::InvalidOperation(
                "a split transaction cannot be assigned to a single envelope".into(),
            ));
        }

        if let Some(amount) = patch.amount {
            Self::require_positive(amount, "amount")?;
            let account = self.get_active_account(txn.account_id)?;
            Self::require_account_currency(amount, &account)?;
        }

        // Transfers mirror date and amount onto the linked leg
        let mut linked = if txn.is_transfer() {
            let linked = self.load_linked(&txn)?;
            if let Some(ref linked_txn) = linked {
                if linked_txn.is_reconciled && (patch.date.is_some() || patch.amount.is_some()) {
                    return Err(EngineError::InvalidOperation(format!(
                        "linked transaction {} is reconciled and cannot be edited",
                        linked_txn.id
                    )));
                }
            }
            linked
        } else {
            None
        };

        if let Some(date) = patch.date {
            txn.set_date(date)?;
            if let Some(ref mut linked_txn) = linked {
                linked_txn.set_date(date)?;
            }
        }
        if let Some(amount) = patch.amount {
            txn.set_amount(amount)?;
            if let Some(ref mut linked_txn) = linked {
                linked_txn.set_amount(amount)?;
            }
        }
        if let Some(payee) = patch.payee {
            txn.set_payee(payee)?;
            PayeeService::new(self.uow).record_usage(&txn.payee)?;
        }
        if let Some(memo) = patch.memo {
            txn.set_memo(memo);
        }
        if let Some(envelope_id) = patch.envelope_id {
            if let Some(env) = envelope_id {
                EnvelopeService::new(self.uow).get_active(env)?;
            }
            txn.set_envelope(envelope_id)?;
        }

        if let Some(new_splits) = &patch.splits {
            if !new_splits.is_empty() {
                self.validate_splits(new_splits, txn.amount)?;
                txn.set_envelope(None)?;
            }
            self.uow.splits().delete_by_transaction(txn.id)?;
            self.insert_splits(txn.id, new_splits)?;
        } else if !existing_splits.is_empty() {
            // Keep the split-sum invariant against the (possibly new) amount
            let sum: Decimal = existing_splits.iter().map(|s| s.amount.amount()).sum();
            if sum != txn.amount.amount().abs() {
                return Err(EngineError::InvalidOperation(
                    "split amounts no longer sum to the transaction amount".into(),
                ));
            }
        }

        txn.validate()?;
        self.uow.transactions().update(txn.clone())?;
        if let Some(linked_txn) = linked {
            self.uow.transactions().update(linked_txn.clone())?;
            self.refresh_account_balances(linked_txn.account_id)?;
        }
        self.refresh_account_balances(txn.account_id)?;

        debug!(txn = %txn, "updated transaction");
        Ok(txn)
    }

    /// Soft-delete a transaction; a transfer's linked leg goes with it
    pub fn soft_delete(&self, id: TransactionId) -> EngineResult<Transaction> {
        let mut txn = self.get(id)?;
        if txn.is_deleted {
            return Ok(txn);
        }
        txn.soft_delete()?;

        let linked = self.load_linked(&txn)?;
        self.uow.transactions().update(txn.clone())?;
        if let Some(mut linked_txn) = linked {
            if !linked_txn.is_deleted {
                linked_txn.soft_delete()?;
                self.uow.transactions().update(linked_txn.clone())?;
                self.refresh_account_balances(linked_txn.account_id)?;
            }
        }
        self.refresh_account_balances(txn.account_id)?;

        info!(txn = %txn, "soft-deleted transaction");
        Ok(txn)
    }

    /// Mark a transaction cleared
    pub fn mark_cleared(&self, id: TransactionId) -> EngineResult<Transaction> {
        let mut txn = self.get_editable(id)?;
        txn.mark_cleared();
        self.uow.transactions().update(txn.clone())?;
        self.refresh_account_balances(txn.account_id)?;
        Ok(txn)
    }

    /// Return a transaction to uncleared; rejected once reconciled
    pub fn mark_uncleared(&self, id: TransactionId) -> EngineResult<Transaction> {
        let mut txn = self.get_editable(id)?;
        txn.mark_uncleared()?;
        self.uow.transactions().update(txn.clone())?;
        self.refresh_account_balances(txn.account_id)?;
        Ok(txn)
    }

    /// Assign an unsplit outflow or inflow to an envelope
    ///
    /// On the payee's first assignment, the envelope becomes its default.
    pub fn assign_to_envelope(
        &self,
        id: TransactionId,
        envelope_id: EnvelopeId,
    ) -> EngineResult<Transaction> {
        let mut txn = self.get_editable(id)?;
        if !self.uow.splits().get_by_transaction(id)?.is_empty() {
            return Err(EngineError::InvalidOperation(
                "a split transaction cannot be assigned to a single envelope".into(),
            ));
        }
        EnvelopeService::new(self.uow).get_active(envelope_id)?;
        txn.set_envelope(Some(envelope_id))?;
        self.uow.transactions().update(txn.clone())?;

        let payees = PayeeService::new(self.uow);
        if let Some(payee) = self.uow.payees().get_by_name(&txn.payee)? {
            payees.set_default_envelope_if_absent(payee.id, envelope_id)?;
        }

        Ok(txn)
    }
}
