//! Payee model
//!
//! Payee names are stored normalized (trimmed, internal whitespace
//! collapsed) and are unique case-insensitively. Usage counters feed the
//! ranked search used by the transaction entry UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{EnvelopeId, PayeeId};

/// A transaction counterparty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payee {
    /// Unique identifier
    pub id: PayeeId,

    /// Normalized display name
    pub name: String,

    /// Envelope pre-selected for new transactions with this payee
    pub default_envelope_id: Option<EnvelopeId>,

    pub is_hidden: bool,

    /// Number of transactions recorded against this payee
    pub transaction_count: u64,

    /// When a transaction last used this payee
    pub last_used_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payee {
    /// Create a payee; the name is normalized on the way in
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: PayeeId::new(),
            name: Self::normalize(name),
            default_envelope_id: None,
            is_hidden: false,
            transaction_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Trim and collapse runs of internal whitespace
    pub fn normalize(name: &str) -> String {
        name.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Case-insensitive comparison of normalized names
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(&Self::normalize(name))
    }

    /// Count one more transaction against this payee
    pub fn record_usage(&mut self) {
        self.transaction_count += 1;
        let now = Utc::now();
        self.last_used_at = Some(now);
        self.updated_at = now;
    }

    /// Set the default envelope for future transactions
    pub fn set_default_envelope(&mut self, envelope_id: EnvelopeId) {
        self.default_envelope_id = Some(envelope_id);
        self.updated_at = Utc::now();
    }

    pub fn hide(&mut self) {
        self.is_hidden = true;
        self.updated_at = Utc::now();
    }

    /// Validate the payee
    pub fn validate(&self) -> Result<(), PayeeValidationError> {
        if self.name.is_empty() {
            return Err(PayeeValidationError::EmptyName);
        }
        if self.name.len() > 200 {
            return Err(PayeeValidationError::NameTooLong(self.name.len()));
        }
        Ok(())
    }
}

impl fmt::Display for Payee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Validation errors for payees
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayeeValidationError {
    EmptyName,
    NameTooLong(usize),
}

impl fmt::Display for PayeeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Payee name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Payee name too long ({} chars, max 200)", len)
            }
        }
    }
}

impl std::error::Error for PayeeValidationError {}
