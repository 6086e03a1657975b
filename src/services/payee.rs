//! Payee service
//!
//! Payees are created on demand when transactions reference a name that is
//! not yet known, with usage counters kept up to date for ranked search.

use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::models::{EnvelopeId, Payee, PayeeId};
use crate::store::UnitOfWork;

/// Service for payee management
pub struct PayeeService<'a> {
    uow: &'a dyn UnitOfWork,
}

impl<'a> PayeeService<'a> {
    /// Create a new payee service
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    /// Find a payee by name (case-insensitive), creating it when absent
    pub fn get_or_create(&self, name: &str) -> EngineResult<Payee> {
        let normalized = Payee::normalize(name);
        if normalized.is_empty() {
            return Err(EngineError::validation_for("payee", "payee name is empty"));
        }
        if let Some(payee) = self.uow.payees().get_by_name(&normalized)? {
            return Ok(payee);
        }
        let payee = Payee::new(&normalized);
        payee.validate()?;
        self.uow.payees().add(payee.clone())?;
        debug!(name = %payee.name, "created payee");
        Ok(payee)
    }

    /// Record one transaction against a payee name, creating it when absent
    pub fn record_usage(&self, name: &str) -> EngineResult<Payee> {
        let mut payee = self.get_or_create(name)?;
        payee.record_usage();
        self.uow.payees().update(payee.clone())?;
        Ok(payee)
    }

    /// Remember the first envelope a payee's spending is assigned to
    ///
    /// Later assignments do not overwrite an existing default.
    pub fn set_default_envelope_if_absent(
        &self,
        payee_id: PayeeId,
        envelope_id: EnvelopeId,
    ) -> EngineResult<()> {
        let mut payee = self
            .uow
            .payees()
            .get_by_id(payee_id)?
            .ok_or_else(|| EngineError::payee_not_found(payee_id))?;
        if payee.default_envelope_id.is_none() {
            payee.set_default_envelope(envelope_id);
            self.uow.payees().update(payee)?;
        }
        Ok(())
    }

    /// Ranked search over payee names
    pub fn search(&self, query: &str) -> EngineResult<Vec<Payee>> {
        self.uow.payees().search(query)
    }

    /// Hide a payee from pickers; history is untouched
    pub fn hide(&self, payee_id: PayeeId) -> EngineResult<Payee> {
        let mut payee = self
            .uow
            .payees()
            .get_by_id(payee_id)?
            .ok_or_else(|| EngineError::payee_not_found(payee_id))?;
        payee.hide();
        self.uow.payees().update(payee.clone())?;
        Ok(payee)
    }
}
