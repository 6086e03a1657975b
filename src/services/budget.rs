//! Budget service
//!
//! Envelope allocation math for a month: set and adjust amounts, move money
//! between envelopes, funding goals, goal-driven auto-assignment, and the
//! month-end rollover that closes a period and seeds the next one.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::models::{
    BudgetPeriod, Currency, Envelope, EnvelopeAllocation, EnvelopeId, Money,
};
use crate::services::envelope::EnvelopeService;
use crate::services::recalc::RecalculationService;
use crate::store::UnitOfWork;

/// Order in which auto-assignment funds goal envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAssignMode {
    /// Ascending goal date, envelopes without a date last
    EarliestGoalDateFirst,
    /// Ascending outstanding amount needed to complete the goal
    SmallestGoalFirst,
}

/// A before/after view of one envelope's allocated amount
#[derive(Debug, Clone)]
pub struct AllocationChange {
    pub envelope_id: EnvelopeId,
    pub envelope_name: Option<String>,
    pub before_allocated: Money,
    pub after_allocated: Money,
}

impl AllocationChange {
    fn new(envelope: &Envelope, before: Money, after: Money) -> Self {
        Self {
            envelope_id: envelope.id,
            envelope_name: Some(envelope.name.clone()),
            before_allocated: before,
            after_allocated: after,
        }
    }

    /// How much the allocation moved
    pub fn delta(&self) -> Money {
        Money::new(
            self.after_allocated.amount() - self.before_allocated.amount(),
            self.after_allocated.currency(),
        )
    }
}

/// Result of a month-end rollover
#[derive(Debug, Clone)]
pub struct RolloverOutcome {
    /// The now-closed source period
    pub closed_period: BudgetPeriod,
    /// The seeded next period
    pub next_period: BudgetPeriod,
}

/// Service for allocation and rollover operations
pub struct BudgetService<'a> {
    uow: &'a dyn UnitOfWork,
    currency: Currency,
}

impl<'a> BudgetService<'a> {
    /// Create a new budget service
    pub fn new(uow: &'a dyn UnitOfWork, currency: Currency) -> Self {
        Self { uow, currency }
    }

    fn recalc(&self) -> RecalculationService<'a> {
        RecalculationService::new(self.uow, self.currency)
    }

    fn open_period(&self, year: i32, month: u32) -> EngineResult<BudgetPeriod> {
        let period = self.recalc().get_or_create_period(year, month)?;
        if period.is_closed {
            return Err(EngineError::InvalidOperation(format!(
                "budget period {:04}-{:02} is closed",
                year, month
            )));
        }
        Ok(period)
    }

    fn get_or_create_allocation(
        &self,
        envelope_id: EnvelopeId,
        period: &BudgetPeriod,
    ) -> EngineResult<EnvelopeAllocation> {
        if let Some(allocation) = self
            .uow
            .allocations()
            .get_by_envelope_and_period(envelope_id, period.id)?
        {
            return Ok(allocation);
        }
        let allocation = EnvelopeAllocation::new(envelope_id, period.id, self.currency);
        self.uow.allocations().add(allocation.clone())?;
        Ok(allocation)
    }

    fn require_engine_currency(&self, amount: Money, target: &str) -> EngineResult<()> {
        if amount.currency() != self.currency {
            return Err(EngineError::InvalidOperation(format!(
                "{} currency {} does not match budget currency {}",
                target,
                amount.currency(),
                self.currency
            )));
        }
        Ok(())
    }

    /// Set an envelope's allocated amount for a month
    pub fn set_allocation(
        &self,
        envelope_id: EnvelopeId,
        amount: Money,
        year: i32,
        month: u32,
    ) -> EngineResult<AllocationChange> {
        if amount.is_negative() {
            return Err(EngineError::validation_for(
                "amount",
                "allocation cannot be negative",
            ));
        }
        self.require_engine_currency(amount, "amount")?;
        let envelope = EnvelopeService::new(self.uow).get_active(envelope_id)?;
        let period = self.open_period(year, month)?;

        let mut allocation = self.get_or_create_allocation(envelope_id, &period)?;
        let before = allocation.allocated;
        allocation.set_allocated(amount)?;
        self.uow.allocations().update(allocation.clone())?;

        debug!(envelope = %envelope, %period, %amount, "set allocation");
        Ok(AllocationChange::new(&envelope, before, allocation.allocated))
    }

    /// Nudge an envelope's allocation by a signed delta, clamping at zero
    pub fn adjust_allocation(
        &self,
        envelope_id: EnvelopeId,
        delta: Money,
        year: i32,
        month: u32,
    ) -> EngineResult<AllocationChange> {
        self.require_engine_currency(delta, "delta")?;
        let envelope = EnvelopeService::new(self.uow).get_active(envelope_id)?;
        let period = self.open_period(year, month)?;

        let mut allocation = self.get_or_create_allocation(envelope_id, &period)?;
        let before = allocation.allocated;
        let new_amount = (before.amount() + delta.amount()).max(Decimal::ZERO);
        allocation.set_allocated(Money::new(new_amount, self.currency))?;
        self.uow.allocations().update(allocation.clone())?;

        Ok(AllocationChange::new(&envelope, before, allocation.allocated))
    }

    /// Move allocated money between two envelopes in the same month
    ///
    /// The quantity comes out of the source's `allocated`, so period
    /// ready-to-assign is left untouched.
    pub fn move_allocation(
        &self,
        from_envelope_id: EnvelopeId,
        to_envelope_id: EnvelopeId,
        amount: Money,
        year: i32,
        month: u32,
    ) -> EngineResult<Vec<AllocationChange>> {
        if from_envelope_id == to_envelope_id {
            return Err(EngineError::validation_for(
                "toEnvelopeId",
                "cannot move within the same envelope",
            ));
        }
        if !amount.is_positive() {
            return Err(EngineError::validation_for(
                "amount",
                "amount must be positive",
            ));
        }
        self.require_engine_currency(amount, "amount")?;

        let envelopes = EnvelopeService::new(self.uow);
        let from_envelope = envelopes.get_active(from_envelope_id)?;
        let to_envelope = envelopes.get_active(to_envelope_id)?;
        let period = self.open_period(year, month)?;

        let mut from_alloc = self.get_or_create_allocation(from_envelope_id, &period)?;
        let mut to_alloc = self.get_or_create_allocation(to_envelope_id, &period)?;

        if amount.amount() > from_alloc.available().amount() {
            return Err(EngineError::InvalidOperation(format!(
                "cannot move {} from '{}': only {} available",
                amount,
                from_envelope.name,
                from_alloc.available()
            )));
        }
        if amount.amount() > from_alloc.allocated.amount() {
            return Err(EngineError::InvalidOperation(format!(
                "cannot move {} from '{}': only {} allocated this month",
                amount, from_envelope.name, from_alloc.allocated
            )));
        }

        let from_before = from_alloc.allocated;
        let to_before = to_alloc.allocated;
        from_alloc.set_allocated(Money::new(
            from_before.amount() - amount.amount(),
            self.currency,
        ))?;
        to_alloc.set_allocated(Money::new(
            to_before.amount() + amount.amount(),
            self.currency,
        ))?;
        self.uow.allocations().update(from_alloc.clone())?;
        self.uow.allocations().update(to_alloc.clone())?;

        info!(
            from = %from_envelope, to = %to_envelope, %amount, %period,
            "moved allocation"
        );
        Ok(vec![
            AllocationChange::new(&from_envelope, from_before, from_alloc.allocated),
            AllocationChange::new(&to_envelope, to_before, to_alloc.allocated),
        ])
    }

    /// Set a funding goal on an envelope
    pub fn set_goal(
        &self,
        envelope_id: EnvelopeId,
        amount: Money,
        target_date: Option<chrono::NaiveDate>,
    ) -> EngineResult<Envelope> {
        if !amount.is_positive() {
            return Err(EngineError::validation_for(
                "amount",
                "goal amount must be positive",
            ));
        }
        self.require_engine_currency(amount, "amount")?;
        let mut envelope = EnvelopeService::new(self.uow).get_active(envelope_id)?;
        envelope.set_goal(amount, target_date);
        self.uow.envelopes().update(envelope.clone())?;
        Ok(envelope)
    }

    /// Distribute ready-to-assign across goal envelopes
    ///
    /// Runs a forced recalculation first so `available` figures are fresh,
    /// then walks active goal envelopes in the order given by `mode`,
    /// funding each one's outstanding need until ready-to-assign runs out.
    pub fn auto_assign_to_goals(
        &self,
        mode: AutoAssignMode,
        year: i32,
        month: u32,
    ) -> EngineResult<Vec<AllocationChange>> {
        let period = self.recalc().recalculate(year, month)?;

        struct Candidate {
            envelope: Envelope,
            allocation: EnvelopeAllocation,
            needed: Decimal,
        }

        let mut candidates = Vec::new();
        for envelope in self.uow.envelopes().get_active()? {
            if !envelope.has_goal() {
                continue;
            }
            let goal = match envelope.goal_amount {
                Some(goal) if goal.currency() == self.currency => goal,
                _ => continue,
            };
            let allocation = self.get_or_create_allocation(envelope.id, &period)?;
            let needed = (goal.amount() - allocation.available().amount()).max(Decimal::ZERO);
            candidates.push(Candidate {
                envelope,
                allocation,
                needed,
            });
        }

        match mode {
            AutoAssignMode::EarliestGoalDateFirst => candidates.sort_by(|a, b| {
                match (a.envelope.goal_date, b.envelope.goal_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                }
                .then_with(|| {
                    a.envelope
                        .name
                        .to_lowercase()
                        .cmp(&b.envelope.name.to_lowercase())
                })
            }),
            AutoAssignMode::SmallestGoalFirst => candidates.sort_by(|a, b| {
                a.needed.cmp(&b.needed).then_with(|| {
                    a.envelope
                        .name
                        .to_lowercase()
                        .cmp(&b.envelope.name.to_lowercase())
                })
            }),
        }

        let mut remaining = period.ready_to_assign().amount();
        let mut changes = Vec::new();
        for mut candidate in candidates {
            if remaining <= Decimal::ZERO {
                break;
            }
            let to_assign = candidate.needed.min(remaining);
            if to_assign <= Decimal::ZERO {
                continue;
            }
            let before = candidate.allocation.allocated;
            candidate.allocation.set_allocated(Money::new(
                before.amount() + to_assign,
                self.currency,
            ))?;
            self.uow.allocations().update(candidate.allocation.clone())?;
            remaining -= to_assign;
            changes.push(AllocationChange::new(
                &candidate.envelope,
                before,
                candidate.allocation.allocated,
            ));
        }

        info!(
            %period, funded = changes.len(),
            "auto-assigned ready-to-assign to goals"
        );
        Ok(changes)
    }

    /// Close a month and seed the next one
    ///
    /// The closing month is recalculated, the next period's `carried_over`
    /// becomes its ready-to-assign, and every allocation's leftover
    /// (positive) or overspend (negative) rolls into the next period's
    /// `rollover_from_previous`.
    pub fn rollover(&self, year: i32, month: u32) -> EngineResult<RolloverOutcome> {
        // Recalculate before closing; this also rejects an already-closed month
        let mut period = self.recalc().recalculate(year, month)?;

        let (next_year, next_month) = period.next_month();
        let mut next_period = self.recalc().get_or_create_period(next_year, next_month)?;
        if next_period.is_closed {
            return Err(EngineError::InvalidOperation(format!(
                "cannot roll into closed period {:04}-{:02}",
                next_year, next_month
            )));
        }

        next_period.set_carried_over(period.ready_to_assign())?;
        self.uow.periods().update(next_period.clone())?;

        for allocation in self.uow.allocations().get_for_period(period.id)? {
            let mut next_alloc =
                self.get_or_create_allocation(allocation.envelope_id, &next_period)?;
            next_alloc.set_rollover(allocation.available());
            self.uow.allocations().update(next_alloc)?;
        }

        period.close();
        self.uow.periods().update(period.clone())?;

        info!(
            closed = %period, next = %next_period,
            carried = %next_period.carried_over,
            "rolled budget period over"
        );
        Ok(RolloverOutcome {
            closed_period: period,
            next_period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountKind, Transaction};
    use crate::services::account::AccountService;
    use crate::store::MemoryUnitOfWork;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn usd(d: Decimal) -> Money {
        Money::new(d, Currency::USD)
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, day).unwrap()
    }

    fn setup(uow: &MemoryUnitOfWork) -> (EnvelopeId, EnvelopeId) {
        let envelopes = EnvelopeService::new(uow);
        let food = envelopes.create("Food", None).unwrap().id;
        let gas = envelopes.create("Gas", None).unwrap().id;
        (food, gas)
    }

    #[test]
    fn test_set_allocation_creates_period_and_allocation() {
        let uow = MemoryUnitOfWork::new();
        let (food, _) = setup(&uow);
        let service = BudgetService::new(&uow, Currency::USD);

        let change = service
            .set_allocation(food, usd(dec!(40)), 2026, 2)
            .unwrap();
        assert_eq!(change.before_allocated, usd(dec!(0)));
        assert_eq!(change.after_allocated, usd(dec!(40)));
        assert_eq!(change.delta(), usd(dec!(40)));
        assert!(uow.periods().get_by_year_month(2026, 2).unwrap().is_some());
    }

    #[test]
    fn test_negative_allocation_rejected() {
        let uow = MemoryUnitOfWork::new();
        let (food, _) = setup(&uow);
        let service = BudgetService::new(&uow, Currency::USD);
        assert!(matches!(
            service.set_allocation(food, usd(dec!(-1)), 2026, 2),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn test_adjust_clamps_at_zero() {
        let uow = MemoryUnitOfWork::new();
        let (food, _) = setup(&uow);
        let service = BudgetService::new(&uow, Currency::USD);

        service.set_allocation(food, usd(dec!(30)), 2026, 2).unwrap();
        let change = service
            .adjust_allocation(food, usd(dec!(-50)), 2026, 2)
            .unwrap();
        assert_eq!(change.after_allocated, usd(dec!(0)));

        let change = service
            .adjust_allocation(food, usd(dec!(25)), 2026, 2)
            .unwrap();
        assert_eq!(change.after_allocated, usd(dec!(25)));
    }

    #[test]
    fn test_move_conserves_total() {
        let uow = MemoryUnitOfWork::new();
        let (food, gas) = setup(&uow);
        let service = BudgetService::new(&uow, Currency::USD);

        service.set_allocation(food, usd(dec!(40)), 2026, 2).unwrap();
        service.set_allocation(gas, usd(dec!(20)), 2026, 2).unwrap();

        let changes = service
            .move_allocation(food, gas, usd(dec!(15)), 2026, 2)
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].after_allocated, usd(dec!(25)));
        assert_eq!(changes[1].after_allocated, usd(dec!(35)));

        let period = uow.periods().get_by_year_month(2026, 2).unwrap().unwrap();
        let total = uow
            .allocations()
            .total_allocated(period.id, Currency::USD)
            .unwrap();
        assert_eq!(total, usd(dec!(60)));
    }

    #[test]
    fn test_move_more_than_available_rejected() {
        let uow = MemoryUnitOfWork::new();
        let (food, gas) = setup(&uow);
        let service = BudgetService::new(&uow, Currency::USD);

        service.set_allocation(food, usd(dec!(10)), 2026, 2).unwrap();
        assert!(matches!(
            service.move_allocation(food, gas, usd(dec!(15)), 2026, 2),
            Err(EngineError::InvalidOperation(_))
        ));
        assert!(matches!(
            service.move_allocation(food, food, usd(dec!(5)), 2026, 2),
            Err(EngineError::Validation { .. })
        ));
    }

    #[test]
    fn test_closed_period_rejects_allocation_changes() {
        let uow = MemoryUnitOfWork::new();
        let (food, _) = setup(&uow);
        let service = BudgetService::new(&uow, Currency::USD);

        service.set_allocation(food, usd(dec!(10)), 2026, 2).unwrap();
        service.rollover(2026, 2).unwrap();
        assert!(matches!(
            service.set_allocation(food, usd(dec!(20)), 2026, 2),
            Err(EngineError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_rollover_seeds_next_period() {
        let uow = MemoryUnitOfWork::new();
        let (food, _) = setup(&uow);
        let account = AccountService::new(&uow)
            .create("Checking", AccountKind::Checking, Currency::USD)
            .unwrap();
        let service = BudgetService::new(&uow, Currency::USD);

        // $100 income, $50 allocated, $70 spent against the envelope
        uow.transactions()
            .add(Transaction::inflow(account.id, date(1), usd(dec!(100)), "Payroll"))
            .unwrap();
        service.set_allocation(food, usd(dec!(50)), 2026, 2).unwrap();
        let mut spend = Transaction::outflow(account.id, date(10), usd(dec!(70)), "Market");
        spend.set_envelope(Some(food)).unwrap();
        uow.transactions().add(spend).unwrap();

        let outcome = service.rollover(2026, 2).unwrap();
        assert!(outcome.closed_period.is_closed);
        assert_eq!(outcome.closed_period.ready_to_assign(), usd(dec!(50)));
        assert_eq!(outcome.next_period.carried_over, usd(dec!(50)));

        let next_alloc = uow
            .allocations()
            .get_by_envelope_and_period(food, outcome.next_period.id)
            .unwrap()
            .unwrap();
        assert_eq!(next_alloc.rollover_from_previous, usd(dec!(-20)));

        // Rolling the same month twice fails
        assert!(service.rollover(2026, 2).is_err());
    }

    #[test]
    fn test_auto_assign_earliest_goal_date_first() {
        let uow = MemoryUnitOfWork::new();
        let envelopes = EnvelopeService::new(&uow);
        let car = envelopes.create("Car", None).unwrap().id;
        let vacation = envelopes.create("Vacation", None).unwrap().id;
        let account = AccountService::new(&uow)
            .create("Checking", AccountKind::Checking, Currency::USD)
            .unwrap();
        let service = BudgetService::new(&uow, Currency::USD);

        service
            .set_goal(car, usd(dec!(80)), NaiveDate::from_ymd_opt(2026, 2, 10))
            .unwrap();
        service
            .set_goal(vacation, usd(dec!(80)), NaiveDate::from_ymd_opt(2026, 3, 10))
            .unwrap();
        uow.transactions()
            .add(Transaction::inflow(account.id, date(1), usd(dec!(100)), "Payroll"))
            .unwrap();

        let changes = service
            .auto_assign_to_goals(AutoAssignMode::EarliestGoalDateFirst, 2026, 2)
            .unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].envelope_id, car);
        assert_eq!(changes[0].after_allocated, usd(dec!(80)));
        assert_eq!(changes[1].envelope_id, vacation);
        assert_eq!(changes[1].after_allocated, usd(dec!(20)));
    }

    #[test]
    fn test_auto_assign_smallest_goal_first() {
        let uow = MemoryUnitOfWork::new();
        let envelopes = EnvelopeService::new(&uow);
        let big = envelopes.create("Big", None).unwrap().id;
        let small = envelopes.create("Small", None).unwrap().id;
        let account = AccountService::new(&uow)
            .create("Checking", AccountKind::Checking, Currency::USD)
            .unwrap();
        let service = BudgetService::new(&uow, Currency::USD);

        service.set_goal(big, usd(dec!(200)), None).unwrap();
        service.set_goal(small, usd(dec!(30)), None).unwrap();
        uow.transactions()
            .add(Transaction::inflow(account.id, date(1), usd(dec!(100)), "Payroll"))
            .unwrap();

        let changes = service
            .auto_assign_to_goals(AutoAssignMode::SmallestGoalFirst, 2026, 2)
            .unwrap();
        // Small is fully funded first, the rest goes to Big
        assert_eq!(changes[0].envelope_id, small);
        assert_eq!(changes[0].after_allocated, usd(dec!(30)));
        assert_eq!(changes[1].envelope_id, big);
        assert_eq!(changes[1].after_allocated, usd(dec!(70)));
    }

    #[test]
    fn test_auto_assign_stops_at_zero_ready_to_assign() {
        let uow = MemoryUnitOfWork::new();
        let envelopes = EnvelopeService::new(&uow);
        let car = envelopes.create("Car", None).unwrap().id;
        let service = BudgetService::new(&uow, Currency::USD);

        service.set_goal(car, usd(dec!(80)), None).unwrap();
        // No income at all: nothing to assign
        let changes = service
            .auto_assign_to_goals(AutoAssignMode::SmallestGoalFirst, 2026, 2)
            .unwrap();
        assert!(changes.is_empty());
    }
}
