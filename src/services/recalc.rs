//! Recalculation service
//!
//! Re-derives every stored total for one budget period from the raw
//! transaction rows: per-allocation `spent`, then the period's income,
//! spent, and allocated figures. The engine runs this as the final step of
//! every mutating operation so derived state on disk always agrees with
//! the ledger.
//!
//! The service only writes values that actually changed, which makes
//! repeated runs with no intervening writes byte-identical.

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{BudgetPeriod, Currency, DateRange};
use crate::store::UnitOfWork;

/// Service recomputing derived period state
pub struct RecalculationService<'a> {
    uow: &'a dyn UnitOfWork,
    currency: Currency,
}

impl<'a> RecalculationService<'a> {
    /// Create a new recalculation service
    pub fn new(uow: &'a dyn UnitOfWork, currency: Currency) -> Self {
        Self { uow, currency }
    }

    /// Fetch the period row for `(year, month)`, creating it when absent
    pub fn get_or_create_period(&self, year: i32, month: u32) -> EngineResult<BudgetPeriod> {
        if let Some(period) = self.uow.periods().get_by_year_month(year, month)? {
            return Ok(period);
        }
        let period = BudgetPeriod::new(year, month, self.currency)
            .map_err(|e| EngineError::validation_for("month", e.to_string()))?;
        self.uow.periods().add(period.clone())?;
        Ok(period)
    }

    /// Recompute and persist the derived totals for one month
    ///
    /// A closed period cannot be recalculated; rollover recalculates the
    /// closing month itself before freezing it.
    pub fn recalculate(&self, year: i32, month: u32) -> EngineResult<BudgetPeriod> {
        let range = DateRange::for_month(year, month)
            .map_err(|e| EngineError::validation_for("month", e.to_string()))?;
        let mut period = self.get_or_create_period(year, month)?;
        if period.is_closed {
            return Err(EngineError::InvalidOperation(format!(
                "budget period {:04}-{:02} is closed and cannot be recalculated",
                year, month
            )));
        }

        for mut allocation in self.uow.allocations().get_for_period(period.id)? {
            let spent = self.uow.transactions().envelope_spent_in_range(
                allocation.envelope_id,
                range,
                self.currency,
            )?;
            if allocation.spent != spent {
                allocation.set_spent(spent)?;
                self.uow.allocations().update(allocation)?;
            }
        }

        let (income, spent_abs) = self
            .uow
            .transactions()
            .totals_for_range(range, self.currency)?;
        let allocated = self
            .uow
            .allocations()
            .total_allocated(period.id, self.currency)?;

        if period.total_income != income
            || period.total_spent != spent_abs
            || period.total_allocated != allocated
        {
            period.set_totals(income, allocated, spent_abs)?;
            self.uow.periods().update(period.clone())?;
        }

        debug!(
            %period,
            income = %period.total_income,
            allocated = %period.total_allocated,
            spent = %period.total_spent,
            "recalculated budget period"
        );
        Ok(period)
    }
}
