//! Envelope service
//!
//! Envelope lifecycle management: creation, metadata edits, hiding, and
//! archival. Budget math against envelopes lives in the budget service.

use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::{Envelope, EnvelopeId};
use crate::store::UnitOfWork;

/// Service for envelope management
pub struct EnvelopeService<'a> {
    uow: &'a dyn UnitOfWork,
}

/// Fields that can be changed on an existing envelope
#[derive(Debug, Clone, Default)]
pub struct EnvelopePatch {
    pub name: Option<String>,
    pub group: Option<Option<String>>,
    pub color: Option<String>,
    pub sort_order: Option<i32>,
    pub note: Option<Option<String>>,
}

impl<'a> EnvelopeService<'a> {
    /// Create a new envelope service
    pub fn new(uow: &'a dyn UnitOfWork) -> Self {
        Self { uow }
    }

    /// Create an envelope, optionally inside a display group
    pub fn create(&self, name: &str, group: Option<&str>) -> EngineResult<Envelope> {
        let envelope = match group {
            Some(group) => Envelope::in_group(name.trim(), group.trim()),
            None => Envelope::new(name.trim()),
        };
        envelope.validate()?;
        self.uow.envelopes().add(envelope.clone())?;
        info!(envelope = %envelope, "created envelope");
        Ok(envelope)
    }

    /// Load an envelope or fail
    pub fn get(&self, id: EnvelopeId) -> EngineResult<Envelope> {
        self.uow
            .envelopes()
            .get_by_id(id)?
            .ok_or_else(|| EngineError::envelope_not_found(id))
    }

    /// Load an envelope that must be active
    pub fn get_active(&self, id: EnvelopeId) -> EngineResult<Envelope> {
        let envelope = self.get(id)?;
        if !envelope.is_active {
            return Err(EngineError::InvalidOperation(format!(
                "envelope '{}' is archived",
                envelope.name
            )));
        }
        Ok(envelope)
    }

    /// Apply a metadata patch
    pub fn update(&self, id: EnvelopeId, patch: EnvelopePatch) -> EngineResult<Envelope> {
        let mut envelope = self.get(id)?;
        if let Some(name) = patch.name {
            envelope.rename(name.trim());
        }
        if let Some(group) = patch.group {
            envelope.set_group(group);
        }
        if let Some(color) = patch.color {
            envelope.set_color(color);
        }
        if let Some(sort_order) = patch.sort_order {
            envelope.set_sort_order(sort_order);
        }
        if let Some(note) = patch.note {
            envelope.note = note;
        }
        envelope.validate()?;
        self.uow.envelopes().update(envelope.clone())?;
        Ok(envelope)
    }

    pub fn hide(&self, id: EnvelopeId) -> EngineResult<Envelope> {
        let mut envelope = self.get(id)?;
        envelope.hide();
        self.uow.envelopes().update(envelope.clone())?;
        Ok(envelope)
    }

    pub fn unhide(&self, id: EnvelopeId) -> EngineResult<Envelope> {
        let mut envelope = self.get(id)?;
        envelope.unhide();
        self.uow.envelopes().update(envelope.clone())?;
        Ok(envelope)
    }

    /// Archive an envelope; allocations and transactions keep pointing at it
    pub fn archive(&self, id: EnvelopeId) -> EngineResult<Envelope> {
        let mut envelope = self.get(id)?;
        envelope.archive();
        self.uow.envelopes().update(envelope.clone())?;
        info!(envelope = %envelope, "archived envelope");
        Ok(envelope)
    }

    /// All envelopes in display order
    pub fn list(&self) -> EngineResult<Vec<Envelope>> {
        self.uow.envelopes().get_all()
    }
}
