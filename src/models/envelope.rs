//! Envelope model
//!
//! An envelope is a named pocket that income is assigned to and spending is
//! categorized against. Envelopes may carry a savings goal (target amount
//! and optional target date) consumed by auto-assignment.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::EnvelopeId;
use super::money::Money;

/// A budgeting envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique identifier
    pub id: EnvelopeId,

    /// Envelope name (e.g., "Groceries")
    pub name: String,

    /// Optional display group (e.g., "Everyday Expenses")
    pub group: Option<String>,

    /// Display color, as a hex string
    #[serde(default = "default_color")]
    pub color: String,

    /// Sort order for display
    #[serde(default)]
    pub sort_order: i32,

    /// Archived envelopes keep history but accept no new activity
    pub is_active: bool,

    /// Hidden envelopes stay active but are collapsed in the UI
    pub is_hidden: bool,

    /// Goal target amount; `None` or zero means no goal
    pub goal_amount: Option<Money>,

    /// Optional date the goal should be fully funded by
    pub goal_date: Option<NaiveDate>,

    /// Free-form note
    pub note: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_color() -> String {
    "#808080".to_string()
}

impl Envelope {
    /// Create a new active, visible envelope
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EnvelopeId::new(),
            name: name.into(),
            group: None,
            color: default_color(),
            sort_order: 0,
            is_active: true,
            is_hidden: false,
            goal_amount: None,
            goal_date: None,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create an envelope inside a display group
    pub fn in_group(name: impl Into<String>, group: impl Into<String>) -> Self {
        let mut envelope = Self::new(name);
        envelope.group = Some(group.into());
        envelope
    }

    /// Whether this envelope has an active goal
    pub fn has_goal(&self) -> bool {
        self.goal_amount.map(|g| !g.is_zero()).unwrap_or(false)
    }

    /// Set a funding goal
    pub fn set_goal(&mut self, amount: Money, target_date: Option<NaiveDate>) {
        self.goal_amount = Some(amount);
        self.goal_date = target_date;
        self.updated_at = Utc::now();
    }

    /// Remove the funding goal
    pub fn clear_goal(&mut self) {
        self.goal_amount = None;
        self.goal_date = None;
        self.updated_at = Utc::now();
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = Utc::now();
    }

    pub fn set_group(&mut self, group: Option<String>) {
        self.group = group;
        self.updated_at = Utc::now();
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
        self.updated_at = Utc::now();
    }

    pub fn set_sort_order(&mut self, sort_order: i32) {
        self.sort_order = sort_order;
        self.updated_at = Utc::now();
    }

    pub fn hide(&mut self) {
        self.is_hidden = true;
        self.updated_at = Utc::now();
    }

    pub fn unhide(&mut self) {
        self.is_hidden = false;
        self.updated_at = Utc::now();
    }

    /// Archive the envelope; history stays intact
    pub fn archive(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    /// Validate the envelope
    pub fn validate(&self) -> Result<(), EnvelopeValidationError> {
        if self.name.trim().is_empty() {
            return Err(EnvelopeValidationError::EmptyName);
        }
        if self.name.len() > 100 {
            return Err(EnvelopeValidationError::NameTooLong(self.name.len()));
        }
        if let Some(goal) = self.goal_amount {
            if goal.is_negative() {
                return Err(EnvelopeValidationError::NegativeGoal);
            }
        }
        Ok(())
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.group {
            Some(group) => write!(f, "{}: {}", group, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Validation errors for envelopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeValidationError {
    EmptyName,
    NameTooLong(usize),
    NegativeGoal,
}

impl fmt::Display for EnvelopeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Envelope name cannot be empty"),
            Self::NameTooLong(len) => {
                write!(f, "Envelope name too long ({} chars, max 100)", len)
            }
            Self::NegativeGoal => write!(f, "Goal amount cannot be negative"),
        }
    }
}

impl std::error::Error for EnvelopeValidationError {}
