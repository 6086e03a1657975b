//! Budget period model
//!
//! One row per calendar month. The totals are derived fields: the
//! recalculation service re-derives them from raw transactions after every
//! mutation, and closing a period freezes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::date_range::{DateRange, DateRangeError};
use super::ids::BudgetPeriodId;
use super::money::{Currency, Money};

/// A monthly budget period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetPeriod {
    /// Unique identifier
    pub id: BudgetPeriodId,

    pub year: i32,

    /// Calendar month, 1-12
    pub month: u32,

    /// Sum of inflows in the month (transfers and deleted rows excluded)
    pub total_income: Money,

    /// Sum of `allocated` across this period's envelope allocations
    pub total_allocated: Money,

    /// Sum of absolute outflows in the month, unassigned spending included
    pub total_spent: Money,

    /// Unassigned cash carried in from the previous period's rollover
    pub carried_over: Money,

    pub currency: Currency,

    /// Closed periods reject all mutation of totals
    pub is_closed: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BudgetPeriod {
    /// Create an open period with zeroed totals; the month is validated
    pub fn new(year: i32, month: u32, currency: Currency) -> Result<Self, DateRangeError> {
        DateRange::for_month(year, month)?;
        let now = Utc::now();
        Ok(Self {
            id: BudgetPeriodId::new(),
            year,
            month,
            total_income: Money::zero(currency),
            total_allocated: Money::zero(currency),
            total_spent: Money::zero(currency),
            carried_over: Money::zero(currency),
            currency,
            is_closed: false,
            created_at: now,
            updated_at: now,
        })
    }

    /// The calendar range this period covers
    pub fn month_range(&self) -> DateRange {
        // Month was validated at construction
        DateRange::for_month(self.year, self.month).unwrap_or_else(|_| {
            DateRange::last_n_days(
                chrono::NaiveDate::from_ymd_opt(self.year, 1, 1)
                    .unwrap_or_default(),
                1,
            )
        })
    }

    /// The `(year, month)` that follows this one
    pub fn next_month(&self) -> (i32, u32) {
        if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        }
    }

    /// Unassigned money: `income + carried_over - allocated`
    pub fn ready_to_assign(&self) -> Money {
        Money::new(
            self.total_income.amount() + self.carried_over.amount()
                - self.total_allocated.amount(),
            self.currency,
        )
    }

    /// Budgeted money not yet spent: `allocated - spent`
    pub fn remaining(&self) -> Money {
        Money::new(
            self.total_allocated.amount() - self.total_spent.amount(),
            self.currency,
        )
    }

    /// Overwrite the derived totals; rejected once closed
    pub fn set_totals(
        &mut self,
        income: Money,
        allocated: Money,
        spent: Money,
    ) -> Result<(), PeriodStateError> {
        if self.is_closed {
            return Err(PeriodStateError::Closed {
                year: self.year,
                month: self.month,
            });
        }
        self.total_income = income;
        self.total_allocated = allocated;
        self.total_spent = spent;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Set the carried-in amount; rejected once closed
    pub fn set_carried_over(&mut self, carried: Money) -> Result<(), PeriodStateError> {
        if self.is_closed {
            return Err(PeriodStateError::Closed {
                year: self.year,
                month: self.month,
            });
        }
        self.carried_over = carried;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Close the period, freezing its totals
    pub fn close(&mut self) {
        self.is_closed = true;
        self.updated_at = Utc::now();
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// State violations on periods
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodStateError {
    Closed { year: i32, month: u32 },
}

impl fmt::Display for PeriodStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed { year, month } => {
                write!(f, "budget period {:04}-{:02} is closed", year, month)
            }
        }
    }
}

impl std::error::Error for PeriodStateError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd(d: rust_decimal::Decimal) -> Money {
        Money::new(d, Currency::USD)
    }

    #[test]
    fn test_new_period() {
        let period = BudgetPeriod::new(2026, 2, Currency::USD).unwrap();
        assert!(!period.is_closed);
        assert!(period.ready_to_assign().is_zero());
        assert!(BudgetPeriod::new(2026, 13, Currency::USD).is_err());
    }

    #[test]
    fn test_month_range() {
        let period = BudgetPeriod::new(2026, 2, Currency::USD).unwrap();
        let range = period.month_range();
        assert_eq!(range.start().to_string(), "2026-02-01");
        assert_eq!(range.end().to_string(), "2026-02-28");
    }

    #[test]
    fn test_next_month() {
        assert_eq!(
            BudgetPeriod::new(2026, 2, Currency::USD).unwrap().next_month(),
            (2026, 3)
        );
        assert_eq!(
            BudgetPeriod::new(2026, 12, Currency::USD).unwrap().next_month(),
            (2027, 1)
        );
    }

    #[test]
    fn test_derived_totals() {
        let mut period = BudgetPeriod::new(2026, 2, Currency::USD).unwrap();
        period
            .set_totals(usd(dec!(100)), usd(dec!(40)), usd(dec!(25)))
            .unwrap();
        period.set_carried_over(usd(dec!(10))).unwrap();

        assert_eq!(period.ready_to_assign(), usd(dec!(70)));
        assert_eq!(period.remaining(), usd(dec!(15)));
    }

    #[test]
    fn test_closed_rejects_mutation() {
        let mut period = BudgetPeriod::new(2026, 2, Currency::USD).unwrap();
        period.close();
        assert!(period
            .set_totals(usd(dec!(1)), usd(dec!(1)), usd(dec!(1)))
            .is_err());
        assert!(period.set_carried_over(usd(dec!(1))).is_err());
    }

    #[test]
    fn test_display() {
        let period = BudgetPeriod::new(2026, 2, Currency::USD).unwrap();
        assert_eq!(period.to_string(), "2026-02");
    }
}
