//! Account model
//!
//! Accounts carry cached balance figures that the transaction service keeps
//! in sync with the raw ledger: `balance = cleared + uncleared` at all
//! times.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::AccountId;
use super::money::{Currency, Money};

/// Type of financial account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Checking,
    Savings,
    CreditCard,
    Cash,
    LineOfCredit,
    Investment,
    Other,
}

impl AccountKind {
    /// Credit-style accounts count toward liabilities regardless of the
    /// sign of their balance
    pub fn is_liability(&self) -> bool {
        matches!(self, Self::CreditCard | Self::LineOfCredit)
    }

    /// Parse an account kind from a user-supplied string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace([' ', '_'], "").as_str() {
            "checking" => Some(Self::Checking),
            "savings" => Some(Self::Savings),
            "credit" | "creditcard" => Some(Self::CreditCard),
            "cash" => Some(Self::Cash),
            "lineofcredit" | "loc" => Some(Self::LineOfCredit),
            "investment" => Some(Self::Investment),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl Default for AccountKind {
    fn default() -> Self {
        Self::Checking
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checking => write!(f, "Checking"),
            Self::Savings => write!(f, "Savings"),
            Self::CreditCard => write!(f, "Credit Card"),
            Self::Cash => write!(f, "Cash"),
            Self::LineOfCredit => write!(f, "Line of Credit"),
            Self::Investment => write!(f, "Investment"),
            Self::Other => write!(f, "Other"),
        }
    }
}

/// A financial account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,

    /// Account name (e.g., "Joint Checking")
    pub name: String,

    /// Type of account
    pub kind: AccountKind,

    /// Cached total of all non-deleted transaction amounts
    pub balance: Money,

    /// Cached total of cleared, non-deleted transaction amounts
    pub cleared_balance: Money,

    /// Cached total of uncleared amounts; always `balance - cleared_balance`
    pub uncleared_balance: Money,

    /// The account's currency; every transaction on it uses this currency
    pub currency: Currency,

    /// Whether the account is open; closed accounts keep their history
    pub is_active: bool,

    /// Off-budget accounts do not participate in envelope budgeting
    pub is_on_budget: bool,

    /// Sort order for display
    #[serde(default)]
    pub sort_order: i32,

    /// Free-form note
    pub note: Option<String>,

    /// When the account was last reconciled against a statement
    pub last_reconciled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new open, on-budget account with zero balances
    pub fn new(name: impl Into<String>, kind: AccountKind, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            id: AccountId::new(),
            name: name.into(),
            kind,
            balance: Money::zero(currency),
            cleared_balance: Money::zero(currency),
            uncleared_balance: Money::zero(currency),
            currency,
            is_active: true,
            is_on_budget: true,
            sort_order: 0,
            note: None,
            last_reconciled_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Install freshly computed balance caches
    ///
    /// `uncleared` is derived, keeping `balance = cleared + uncleared`.
    pub fn apply_balances(&mut self, balance: Money, cleared: Money) {
        self.uncleared_balance = Money::new(
            balance.amount() - cleared.amount(),
            self.currency,
        );
        self.balance = balance;
        self.cleared_balance = cleared;
        self.updated_at = Utc::now();
    }

    /// Close the account; requires a zero balance
    pub fn close(&mut self) -> Result<(), AccountValidationError> {
        if !self.balance.is_zero() {
            return Err(AccountValidationError::NonZeroBalanceOnClose(self.balance));
        }
        self.is_active = false;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Reopen a closed account
    pub fn reopen(&mut self) {
        self.is_active = true;
        self.updated_at = Utc::now();
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = Utc::now();
    }

    pub fn set_note(&mut self, note: Option<String>) {
        self.note = note;
        self.updated_at = Utc::now();
    }

    pub fn set_sort_order(&mut self, sort_order: i32) {
        self.sort_order = sort_order;
        self.updated_at = Utc::now();
    }

    pub fn set_on_budget(&mut self, on_budget: bool) {
        self.is_on_budget = on_budget;
        self.updated_at = Utc::now();
    }

    /// Stamp a completed reconciliation
    pub fn record_reconciled(&mut self, at: DateTime<Utc>) {
        self.last_reconciled_at = Some(at);
        self.updated_at = Utc::now();
    }

    /// Validate the account
    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if self.name.trim().is_empty() {
            return Err(AccountValidationError::EmptyName);
        }
        if self.name.len() > 100 {
            return Err(AccountValidationError::NameTooLong(self.name.len()));
        }
        Ok(())
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Validation errors for accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyName,
    NameTooLong(usize),
    NonZeroBalanceOnClose(Money),
}

impl fmt::Display for AccountValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Account name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Account name too long ({} chars, max 100)", len)
            }
            Self::NonZeroBalanceOnClose(balance) => {
                write!(f, "Account balance must be zero to close (is {})", balance)
            }
        }
    }
}

impl std::error::Error for AccountValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_account() {
        let account = Account::new("Checking", AccountKind::Checking, Currency::USD);
        assert!(account.is_active);
        assert!(account.is_on_budget);
        assert!(account.balance.is_zero());
        assert!(account.last_reconciled_at.is_none());
    }

    #[test]
    fn test_apply_balances() {
        let mut account = Account::new("Checking", AccountKind::Checking, Currency::USD);
        account.apply_balances(
            Money::new(dec!(100), Currency::USD),
            Money::new(dec!(70), Currency::USD),
        );
        assert_eq!(account.balance.amount(), dec!(100.00));
        assert_eq!(account.cleared_balance.amount(), dec!(70.00));
        assert_eq!(account.uncleared_balance.amount(), dec!(30.00));
    }

    #[test]
    fn test_close_requires_zero_balance() {
        let mut account = Account::new("Checking", AccountKind::Checking, Currency::USD);
        account.apply_balances(
            Money::new(dec!(5), Currency::USD),
            Money::new(dec!(5), Currency::USD),
        );
        assert!(matches!(
            account.close(),
            Err(AccountValidationError::NonZeroBalanceOnClose(_))
        ));

        account.apply_balances(Money::zero(Currency::USD), Money::zero(Currency::USD));
        account.close().unwrap();
        assert!(!account.is_active);

        account.reopen();
        assert!(account.is_active);
    }

    #[test]
    fn test_is_liability() {
        assert!(AccountKind::CreditCard.is_liability());
        assert!(AccountKind::LineOfCredit.is_liability());
        assert!(!AccountKind::Checking.is_liability());
        assert!(!AccountKind::Investment.is_liability());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!(AccountKind::parse("checking"), Some(AccountKind::Checking));
        assert_eq!(
            AccountKind::parse("Credit Card"),
            Some(AccountKind::CreditCard)
        );
        assert_eq!(
            AccountKind::parse("line_of_credit"),
            Some(AccountKind::LineOfCredit)
        );
        assert_eq!(AccountKind::parse("bogus"), None);
    }

    #[test]
    fn test_validation() {
        let mut account = Account::new("Valid", AccountKind::Cash, Currency::USD);
        assert!(account.validate().is_ok());

        account.name = "  ".into();
        assert_eq!(account.validate(), Err(AccountValidationError::EmptyName));

        account.name = "a".repeat(101);
        assert!(matches!(
            account.validate(),
            Err(AccountValidationError::NameTooLong(_))
        ));
    }

    #[test]
    fn test_serialization() {
        let account = Account::new("Test", AccountKind::Savings, Currency::EUR);
        let json = serde_json::to_string(&account).unwrap();
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(account.id, back.id);
        assert_eq!(back.currency, Currency::EUR);
    }
}
