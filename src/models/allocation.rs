//! Envelope allocation model
//!
//! One row per `(envelope, period)` pair: how much was assigned this month,
//! what rolled in from last month, and the derived spent figure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{AllocationId, BudgetPeriodId, EnvelopeId};
use super::money::{Currency, Money};

/// Money assigned to one envelope for one budget period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeAllocation {
    /// Unique identifier
    pub id: AllocationId,

    pub envelope_id: EnvelopeId,
    pub budget_period_id: BudgetPeriodId,

    /// Amount assigned this period; never negative
    pub allocated: Money,

    /// Leftover (positive) or debt (negative) carried from last period
    pub rollover_from_previous: Money,

    /// Derived spending against this envelope this period; never negative
    pub spent: Money,

    pub currency: Currency,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EnvelopeAllocation {
    /// Create a zeroed allocation for an envelope in a period
    pub fn new(
        envelope_id: EnvelopeId,
        budget_period_id: BudgetPeriodId,
        currency: Currency,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: AllocationId::new(),
            envelope_id,
            budget_period_id,
            allocated: Money::zero(currency),
            rollover_from_previous: Money::zero(currency),
            spent: Money::zero(currency),
            currency,
            created_at: now,
            updated_at: now,
        }
    }

    /// Spendable balance: `allocated + rollover - spent`
    pub fn available(&self) -> Money {
        Money::new(
            self.allocated.amount() + self.rollover_from_previous.amount()
                - self.spent.amount(),
            self.currency,
        )
    }

    /// Everything budgeted for this period: `allocated + rollover`
    pub fn total_budgeted(&self) -> Money {
        Money::new(
            self.allocated.amount() + self.rollover_from_previous.amount(),
            self.currency,
        )
    }

    /// Set the assigned amount; negative amounts are rejected
    pub fn set_allocated(&mut self, amount: Money) -> Result<(), AllocationValidationError> {
        if amount.is_negative() {
            return Err(AllocationValidationError::NegativeAllocated);
        }
        self.allocated = amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Set the rolled-in amount (may be negative for overspend debt)
    pub fn set_rollover(&mut self, amount: Money) {
        self.rollover_from_previous = amount;
        self.updated_at = Utc::now();
    }

    /// Install a freshly derived spent figure
    pub fn set_spent(&mut self, amount: Money) -> Result<(), AllocationValidationError> {
        if amount.is_negative() {
            return Err(AllocationValidationError::NegativeSpent);
        }
        self.spent = amount;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Validate the allocation
    pub fn validate(&self) -> Result<(), AllocationValidationError> {
        if self.allocated.is_negative() {
            return Err(AllocationValidationError::NegativeAllocated);
        }
        if self.spent.is_negative() {
            return Err(AllocationValidationError::NegativeSpent);
        }
        Ok(())
    }
}

impl fmt::Display for EnvelopeAllocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "allocated {} (rollover {}, spent {})",
            self.allocated, self.rollover_from_previous, self.spent
        )
    }
}

/// Validation errors for allocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationValidationError {
    NegativeAllocated,
    NegativeSpent,
}

impl fmt::Display for AllocationValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeAllocated => write!(f, "Allocated amount cannot be negative"),
            Self::NegativeSpent => write!(f, "Spent amount cannot be negative"),
        }
    }
}

impl std::error::Error for AllocationValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd(d: rust_decimal::Decimal) -> Money {
        Money::new(d, Currency::USD)
    }

    fn alloc() -> EnvelopeAllocation {
        EnvelopeAllocation::new(EnvelopeId::new(), BudgetPeriodId::new(), Currency::USD)
    }

    #[test]
    fn test_new_allocation() {
        let a = alloc();
        assert!(a.allocated.is_zero());
        assert!(a.available().is_zero());
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_available() {
        let mut a = alloc();
        a.set_allocated(usd(dec!(40))).unwrap();
        a.set_spent(usd(dec!(25))).unwrap();
        assert_eq!(a.available(), usd(dec!(15)));
        assert_eq!(a.total_budgeted(), usd(dec!(40)));

        a.set_rollover(usd(dec!(-20)));
        assert_eq!(a.available(), usd(dec!(-5)));
        assert_eq!(a.total_budgeted(), usd(dec!(20)));
    }

    #[test]
    fn test_negative_rejected() {
        let mut a = alloc();
        assert_eq!(
            a.set_allocated(usd(dec!(-1))),
            Err(AllocationValidationError::NegativeAllocated)
        );
        assert_eq!(
            a.set_spent(usd(dec!(-1))),
            Err(AllocationValidationError::NegativeSpent)
        );
        // Rollover debt is allowed
        a.set_rollover(usd(dec!(-1)));
        assert!(a.validate().is_ok());
    }
}
