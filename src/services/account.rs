//! Account service
//!
//! Account lifecycle management. Accounts with history are never deleted;
//! closing deactivates them and requires a zero balance.

use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::{Account, AccountId, AccountKind, Currency};
use crate::store::UnitOfWork;

/// Service for account management
pub struct AccountService<'a> {
    uow: &'a dyn UnitOfWork,
}

/// Fields that can be changed on an existing account
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub note: Option<Option<String>>,
    pub sort_order: Option<i32>,
    pub is_on_budget: Option<bool>,
}

impl<'a> AccountService<'a> {
    /// Create a new account service
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    /// Create an account
    pub fn create(
        &self,
        name: &str,
        kind: AccountKind,
        currency: Currency,
    ) -> EngineResult<Account> {
        let account = Account::new(name.trim(), kind, currency);
        account.validate()?;
        self.uow.accounts().add(account.clone())?;
        info!(account = %account, "created account");
        Ok(account)
    }

    /// Load an account or fail
    pub fn get(&self, id: AccountId) -> EngineResult<Account> {
        self.uow
            .accounts()
            .get_by_id(id)?
            .ok_or_else(|| EngineError::account_not_found(id))
    }

    /// Load an account that must be open
    pub fn get_active(&self, id: AccountId) -> EngineResult<Account> {
        let account = self.get(id)?;
        if !account.is_active {
            return Err(EngineError::InvalidOperation(format!(
                "account '{}' is closed",
                account.name
            )));
        }
        Ok(account)
    }

    /// Apply a metadata patch
    pub fn update(&self, id: AccountId, patch: AccountPatch) -> EngineResult<Account> {
        let mut account = self.get(id)?;
        if let Some(name) = patch.name {
            account.rename(name.trim());
        }
        if let Some(note) = patch.note {
            account.set_note(note);
        }
        if let Some(sort_order) = patch.sort_order {
            account.set_sort_order(sort_order);
        }
        if let Some(on_budget) = patch.is_on_budget {
            account.set_on_budget(on_budget);
        }
        account.validate()?;
        self.uow.accounts().update(account.clone())?;
        Ok(account)
    }

    /// Close an account; its balance must be zero
    pub fn close(&self, id: AccountId) -> EngineResult<Account> {
        let mut account = self.get(id)?;
        account.close()?;
        self.uow.accounts().update(account.clone())?;
        info!(account = %account, "closed account");
        Ok(account)
    }

    /// Reopen a closed account
    pub fn reopen(&self, id: AccountId) -> EngineResult<Account> {
        let mut account = self.get(id)?;
        account.reopen();
        self.uow.accounts().update(account.clone())?;
        Ok(account)
    }

    /// All accounts in display order
    pub fn list(&self) -> EngineResult<Vec<Account>> {
        self.uow.accounts().get_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Money, Transaction};
    use crate::store::MemoryUnitOfWork;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_create_and_get() {
        let uow = MemoryUnitOfWork::new();
        let service = AccountService::new(&uow);
        let account = service
            .create("  Checking ", AccountKind::Checking, Currency::USD)
            .unwrap();
        assert_eq!(account.name, "Checking");
        assert_eq!(service.get(account.id).unwrap().id, account.id);
    }

    #[test]
    fn test_close_requires_zero_balance() {
        let uow = MemoryUnitOfWork::new();
        let service = AccountService::new(&uow);
        let account = service
            .create("Checking", AccountKind::Checking, Currency::USD)
            .unwrap();

        let mut funded = service.get(account.id).unwrap();
        funded.apply_balances(
            Money::new(dec!(10), Currency::USD),
            Money::new(dec!(10), Currency::USD),
        );
        uow.accounts().update(funded).unwrap();
        assert!(matches!(
            service.close(account.id),
            Err(EngineError::InvalidOperation(_))
        ));

        let mut emptied = service.get(account.id).unwrap();
        emptied.apply_balances(Money::zero(Currency::USD), Money::zero(Currency::USD));
        uow.accounts().update(emptied).unwrap();
        let closed = service.close(account.id).unwrap();
        assert!(!closed.is_active);

        // A closed account is rejected where an open one is required
        assert!(service.get_active(account.id).is_err());
        service.reopen(account.id).unwrap();
        assert!(service.get_active(account.id).is_ok());
    }

    #[test]
    fn test_update_patch() {
        let uow = MemoryUnitOfWork::new();
        let service = AccountService::new(&uow);
        let account = service
            .create("Checking", AccountKind::Checking, Currency::USD)
            .unwrap();

        let updated = service
            .update(
                account.id,
                AccountPatch {
                    name: Some("Everyday".into()),
                    note: Some(Some("main account".into())),
                    sort_order: Some(3),
                    is_on_budget: Some(false),
                },
            )
            .unwrap();
        assert_eq!(updated.name, "Everyday");
        assert_eq!(updated.note.as_deref(), Some("main account"));
        assert_eq!(updated.sort_order, 3);
        assert!(!updated.is_on_budget);
    }

    #[test]
    fn test_history_survives_close() {
        let uow = MemoryUnitOfWork::new();
        let service = AccountService::new(&uow);
        let account = service
            .create("Cash", AccountKind::Cash, Currency::USD)
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let mut txn = Transaction::outflow(
            account.id,
            date,
            Money::new(dec!(5), Currency::USD),
            "Coffee",
        );
        txn.soft_delete().unwrap();
        uow.transactions().add(txn.clone()).unwrap();

        service.close(account.id).unwrap();
        assert!(uow.transactions().get_by_id(txn.id).unwrap().is_some());
    }
}
