//! Transaction and split-line models
//!
//! Amounts are signed: outflows are stored negative, inflows positive, and
//! a transfer is a linked pair with one of each. Reconciled transactions
//! are locked: date, amount, payee, and envelope cannot change and the row
//! cannot be deleted. Deletion is soft everywhere.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AccountId, EnvelopeId, SplitLineId, TransactionId};
use super::money::Money;

/// Kind of transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money entering an account
    Inflow,
    /// Money leaving an account
    Outflow,
    /// One leg of a linked two-account transfer
    Transfer,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inflow => write!(f, "Inflow"),
            Self::Outflow => write!(f, "Outflow"),
            Self::Transfer => write!(f, "Transfer"),
        }
    }
}

/// One envelope's share of a split outflow
///
/// Part amounts are positive; together they must sum to the absolute value
/// of the parent transaction amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitLine {
    pub id: SplitLineId,
    pub transaction_id: TransactionId,
    pub envelope_id: EnvelopeId,
    pub amount: Money,
    pub sort_order: u32,
}

impl SplitLine {
    /// Create a split line
    pub fn new(
        transaction_id: TransactionId,
        envelope_id: EnvelopeId,
        amount: Money,
        sort_order: u32,
    ) -> Self {
        Self {
            id: SplitLineId::new(),
            transaction_id,
            envelope_id,
            amount,
            sort_order,
        }
    }
}

/// A ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier
    pub id: TransactionId,

    /// The account this transaction belongs to
    pub account_id: AccountId,

    /// Direct envelope assignment; `None` for transfers, inflows with no
    /// category, unassigned outflows, and split outflows
    pub envelope_id: Option<EnvelopeId>,

    /// For transfers, the account on the other side
    pub transfer_account_id: Option<AccountId>,

    /// For transfers, the paired transaction; set in a second pass after
    /// both rows exist
    pub linked_transaction_id: Option<TransactionId>,

    /// Transaction date
    pub date: NaiveDate,

    /// Signed amount: negative outflow, positive inflow
    pub amount: Money,

    /// Payee display name
    pub payee: String,

    /// Free-form memo
    pub memo: Option<String>,

    /// Kind of transaction
    pub kind: TransactionKind,

    pub is_cleared: bool,
    pub is_reconciled: bool,
    pub is_approved: bool,
    pub is_deleted: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    fn base(
        account_id: AccountId,
        date: NaiveDate,
        amount: Money,
        payee: String,
        kind: TransactionKind,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TransactionId::new(),
            account_id,
            envelope_id: None,
            transfer_account_id: None,
            linked_transaction_id: None,
            date,
            amount,
            payee,
            memo: None,
            kind,
            is_cleared: false,
            is_reconciled: false,
            is_approved: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an outflow; `magnitude` is the absolute amount spent
    pub fn outflow(
        account_id: AccountId,
        date: NaiveDate,
        magnitude: Money,
        payee: impl Into<String>,
    ) -> Self {
        Self::base(
            account_id,
            date,
            magnitude.abs().neg(),
            payee.into(),
            TransactionKind::Outflow,
        )
    }

    /// Create an inflow; `magnitude` is the absolute amount received
    pub fn inflow(
        account_id: AccountId,
        date: NaiveDate,
        magnitude: Money,
        payee: impl Into<String>,
    ) -> Self {
        Self::base(
            account_id,
            date,
            magnitude.abs(),
            payee.into(),
            TransactionKind::Inflow,
        )
    }

    /// Create the source leg of a transfer (negative amount)
    pub fn transfer_out(
        account_id: AccountId,
        counterparty: AccountId,
        date: NaiveDate,
        magnitude: Money,
        payee: impl Into<String>,
    ) -> Self {
        let mut txn = Self::base(
            account_id,
            date,
            magnitude.abs().neg(),
            payee.into(),
            TransactionKind::Transfer,
        );
        txn.transfer_account_id = Some(counterparty);
        txn
    }

    /// Create the destination leg of a transfer (positive amount)
    pub fn transfer_in(
        account_id: AccountId,
        counterparty: AccountId,
        date: NaiveDate,
        magnitude: Money,
        payee: impl Into<String>,
    ) -> Self {
        let mut txn = Self::base(
            account_id,
            date,
            magnitude.abs(),
            payee.into(),
            TransactionKind::Transfer,
        );
        txn.transfer_account_id = Some(counterparty);
        txn
    }

    /// Point this leg at its pair; performed after both rows are inserted
    pub fn link_transfer(&mut self, other: TransactionId) {
        self.linked_transaction_id = Some(other);
        self.updated_at = Utc::now();
    }

    pub fn is_transfer(&self) -> bool {
        self.kind == TransactionKind::Transfer
    }

    pub fn is_inflow(&self) -> bool {
        self.kind == TransactionKind::Inflow
    }

    pub fn is_outflow(&self) -> bool {
        self.kind == TransactionKind::Outflow
    }

    fn reject_reconciled(&self) -> Result<(), TransactionStateError> {
        if self.is_reconciled {
            return Err(TransactionStateError::Reconciled);
        }
        Ok(())
    }

    /// Change the date; rejected once reconciled
    pub fn set_date(&mut self, date: NaiveDate) -> Result<(), TransactionStateError> {
        self.reject_reconciled()?;
        self.date = date;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Change the amount, preserving the sign this kind carries
    ///
    /// For transfers the current sign (which leg this is) is kept.
    pub fn set_amount(&mut self, magnitude: Money) -> Result<(), TransactionStateError> {
        self.reject_reconciled()?;
        let magnitude = magnitude.abs();
        self.amount = match self.kind {
            TransactionKind::Inflow => magnitude,
            TransactionKind::Outflow => magnitude.neg(),
            TransactionKind::Transfer => {
                if self.amount.is_negative() {
                    magnitude.neg()
                } else {
                    magnitude
                }
            }
        };
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Change the payee; rejected once reconciled
    pub fn set_payee(&mut self, payee: impl Into<String>) -> Result<(), TransactionStateError> {
        self.reject_reconciled()?;
        self.payee = payee.into();
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_memo(&mut self, memo: Option<String>) {
        self.memo = memo;
        self.updated_at = Utc::now();
    }

    /// Assign or clear the direct envelope; transfers never carry one
    pub fn set_envelope(
        &mut self,
        envelope_id: Option<EnvelopeId>,
    ) -> Result<(), TransactionStateError> {
        self.reject_reconciled()?;
        if self.is_transfer() && envelope_id.is_some() {
            return Err(TransactionStateError::TransferWithEnvelope);
        }
        self.envelope_id = envelope_id;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_cleared(&mut self) {
        self.is_cleared = true;
        self.updated_at = Utc::now();
    }

    /// Return to uncleared; rejected once reconciled
    pub fn mark_uncleared(&mut self) -> Result<(), TransactionStateError> {
        self.reject_reconciled()?;
        self.is_cleared = false;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Lock the transaction against a reconciled statement; implies cleared
    pub fn mark_reconciled(&mut self) {
        self.is_cleared = true;
        self.is_reconciled = true;
        self.updated_at = Utc::now();
    }

    pub fn approve(&mut self) {
        self.is_approved = true;
        self.updated_at = Utc::now();
    }

    /// Soft-delete; rejected once reconciled
    pub fn soft_delete(&mut self) -> Result<(), TransactionStateError> {
        self.reject_reconciled()?;
        self.is_deleted = true;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Validate cross-field invariants
    pub fn validate(&self) -> Result<(), TransactionValidationError> {
        if self.is_reconciled && !self.is_cleared {
            return Err(TransactionValidationError::ReconciledButUncleared);
        }
        if self.is_transfer() {
            if self.envelope_id.is_some() {
                return Err(TransactionValidationError::TransferWithEnvelope);
            }
            if self.transfer_account_id.is_none() {
                return Err(TransactionValidationError::TransferWithoutCounterparty);
            }
        }
        match self.kind {
            TransactionKind::Inflow if !self.amount.is_positive() => {
                Err(TransactionValidationError::SignMismatch(self.kind))
            }
            TransactionKind::Outflow if !self.amount.is_negative() => {
                Err(TransactionValidationError::SignMismatch(self.kind))
            }
            TransactionKind::Transfer if self.amount.is_zero() => {
                Err(TransactionValidationError::SignMismatch(self.kind))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.date.format("%Y-%m-%d"),
            self.payee,
            self.amount
        )
    }
}

/// State-machine violations raised by transaction mutators
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStateError {
    Reconciled,
    TransferWithEnvelope,
}

impl fmt::Display for TransactionStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconciled => write!(f, "transaction is reconciled and locked"),
            Self::TransferWithEnvelope => {
                write!(f, "transfers cannot be assigned to an envelope")
            }
        }
    }
}

impl std::error::Error for TransactionStateError {}

/// Cross-field validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionValidationError {
    ReconciledButUncleared,
    TransferWithEnvelope,
    TransferWithoutCounterparty,
    SignMismatch(TransactionKind),
}

impl fmt::Display for TransactionValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReconciledButUncleared => {
                write!(f, "a reconciled transaction must be cleared")
            }
            Self::TransferWithEnvelope => {
                write!(f, "transfers cannot carry an envelope")
            }
            Self::TransferWithoutCounterparty => {
                write!(f, "transfer is missing its counterparty account")
            }
            Self::SignMismatch(kind) => {
                write!(f, "amount sign does not match transaction kind {}", kind)
            }
        }
    }
}

impl std::error::Error for TransactionValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Currency;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn usd(d: Decimal) -> Money {
        Money::new(d, Currency::USD)
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 10).unwrap()
    }

    #[test]
    fn test_outflow_stored_negative() {
        let txn = Transaction::outflow(AccountId::new(), date(), usd(dec!(25)), "Cafe");
        assert_eq!(txn.amount, usd(dec!(-25)));
        assert!(txn.is_outflow());
        assert!(txn.validate().is_ok());
    }

    #[test]
    fn test_inflow_stored_positive() {
        let txn = Transaction::inflow(AccountId::new(), date(), usd(dec!(-100)), "Payroll");
        assert_eq!(txn.amount, usd(dec!(100)));
        assert!(txn.validate().is_ok());
    }

    #[test]
    fn test_transfer_legs() {
        let a = AccountId::new();
        let b = AccountId::new();
        let mut out = Transaction::transfer_out(a, b, date(), usd(dec!(50)), "Transfer");
        let mut inn = Transaction::transfer_in(b, a, date(), usd(dec!(50)), "Transfer");

        assert_eq!(out.amount, usd(dec!(-50)));
        assert_eq!(inn.amount, usd(dec!(50)));
        assert!(out.linked_transaction_id.is_none());

        out.link_transfer(inn.id);
        inn.link_transfer(out.id);
        assert_eq!(out.linked_transaction_id, Some(inn.id));
        assert_eq!(inn.linked_transaction_id, Some(out.id));
        assert!(out.validate().is_ok());
        assert!(inn.validate().is_ok());
    }

    #[test]
    fn test_transfer_rejects_envelope() {
        let mut txn =
            Transaction::transfer_out(AccountId::new(), AccountId::new(), date(), usd(dec!(5)), "x");
        assert_eq!(
            txn.set_envelope(Some(EnvelopeId::new())),
            Err(TransactionStateError::TransferWithEnvelope)
        );
    }

    #[test]
    fn test_state_machine() {
        let mut txn = Transaction::outflow(AccountId::new(), date(), usd(dec!(10)), "Shop");
        assert!(!txn.is_cleared);

        txn.mark_cleared();
        assert!(txn.is_cleared);

        txn.mark_uncleared().unwrap();
        assert!(!txn.is_cleared);

        txn.mark_reconciled();
        assert!(txn.is_cleared && txn.is_reconciled);

        // No way back out of reconciled through normal mutators
        assert_eq!(txn.mark_uncleared(), Err(TransactionStateError::Reconciled));
        assert_eq!(
            txn.set_amount(usd(dec!(20))),
            Err(TransactionStateError::Reconciled)
        );
        assert_eq!(txn.set_date(date()), Err(TransactionStateError::Reconciled));
        assert_eq!(
            txn.set_payee("Other"),
            Err(TransactionStateError::Reconciled)
        );
        assert_eq!(txn.soft_delete(), Err(TransactionStateError::Reconciled));
    }

    #[test]
    fn test_set_amount_preserves_sign() {
        let mut out = Transaction::outflow(AccountId::new(), date(), usd(dec!(10)), "Shop");
        out.set_amount(usd(dec!(35))).unwrap();
        assert_eq!(out.amount, usd(dec!(-35)));

        let mut inn = Transaction::inflow(AccountId::new(), date(), usd(dec!(10)), "Job");
        inn.set_amount(usd(dec!(35))).unwrap();
        assert_eq!(inn.amount, usd(dec!(35)));

        let mut leg =
            Transaction::transfer_out(AccountId::new(), AccountId::new(), date(), usd(dec!(10)), "t");
        leg.set_amount(usd(dec!(35))).unwrap();
        assert_eq!(leg.amount, usd(dec!(-35)));
    }

    #[test]
    fn test_soft_delete() {
        let mut txn = Transaction::outflow(AccountId::new(), date(), usd(dec!(10)), "Shop");
        txn.soft_delete().unwrap();
        assert!(txn.is_deleted);
    }

    #[test]
    fn test_split_line() {
        let txn = Transaction::outflow(AccountId::new(), date(), usd(dec!(10)), "Shop");
        let split = SplitLine::new(txn.id, EnvelopeId::new(), usd(dec!(4)), 0);
        assert_eq!(split.transaction_id, txn.id);
        assert!(split.amount.is_positive());
    }

    #[test]
    fn test_serialization() {
        let txn = Transaction::outflow(AccountId::new(), date(), usd(dec!(12.34)), "Shop");
        let json = serde_json::to_string(&txn).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(txn.id, back.id);
        assert_eq!(txn.amount, back.amount);
    }
}
