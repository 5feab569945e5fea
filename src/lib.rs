// House Rental - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod money;          // Fixed-point amounts, stored as cents
pub mod temporal;       // Reference zone, clocks, storage format
pub mod schema;         // Request payload validation
pub mod fields;         // Field descriptor tables + differ
pub mod entities;       // Client, House, RentedHouse
pub mod reconciliation; // Minimal-diff merge for edits
pub mod filters;        // Bound predicates for searches
pub mod db;             // SQLite provider handle + sessions
pub mod error;          // Request-level error taxonomy
pub mod search;         // Free-house and rental-window searches
pub mod analytics;      // Per-client rental metrics
pub mod editing;        // Reconcile-and-commit for edit operations
pub mod catalog;        // Plain create / read / delete
pub mod import;         // CSV seed loading
pub mod config;         // Environment configuration

#[cfg(feature = "server")]
pub mod server;         // REST API

// Re-export commonly used types
pub use db::{Database, Session, StoreError, Stored};
pub use entities::{
    hash_password, Client, ClientId, ClientPayload, House, HouseId, HousePayload, RentalKey,
    RentedHouse,
};
pub use error::{AppError, AppResult};
pub use fields::{FieldDescriptor, FieldDiffer};
pub use reconciliation::{EntityReconciler, Reconcilable, ReconcileError, ReconciliationOutcome};
pub use filters::{FilterPredicateBuilder, HouseFilter, Period, Predicate, RentalWindow};
pub use analytics::{ClientAnalyticsAggregator, ClientReport, RentalLedger};
pub use temporal::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;

#[cfg(feature = "server")]
pub use server::{build_router, AppState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
