//! envelope-engine - transactional zero-based budgeting engine
//!
//! A local, single-user envelope-budgeting core: every unit of income is
//! assigned to a named envelope before it can be spent. The crate tracks
//! accounts, transactions, monthly budget periods, per-envelope
//! allocations, CSV imports, and bank-statement reconciliation against a
//! pluggable store.
//!
//! # Architecture
//!
//! - `models`: value types (money, date ranges) and the domain entities,
//!   each enforcing its own invariants through narrow mutators
//! - `store`: the repository + unit-of-work contract plus the bundled
//!   in-memory adapter
//! - `services`: the business logic, one service per concern
//! - `engine`: the public facade that wraps each user-facing operation in
//!   a unit of work, recalculates derived totals, and maps failures to
//!   stable error codes
//!
//! # Example
//!
//! ```
//! use envelope_engine::engine::BudgetEngine;
//! use envelope_engine::models::{AccountKind, Currency, Money};
//! use rust_decimal::Decimal;
//!
//! let engine = BudgetEngine::in_memory(Currency::USD);
//! let account = engine
//!     .create_account("Checking", AccountKind::Checking)
//!     .into_value();
//! let envelope = engine.create_envelope("Food", None).into_value();
//! let result = engine.set_allocation(
//!     envelope.id,
//!     Money::new(Decimal::new(4000, 2), Currency::USD),
//!     2026,
//!     2,
//! );
//! assert!(result.success);
//! ```

pub mod engine;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use engine::{BudgetEngine, BudgetSnapshot, CancelToken, EngineFault, OperationResult};
pub use error::{EngineError, EngineResult, ErrorCode};
