//! Comparison core: catalog reconciliation, weighted aggregation, deltas and
//! missingness profiling.
//!
//! ```text
//!   CatalogConfig ──reconcile──► QuestionCatalog
//!                                      │
//!   SurveyWave ×2 ──filter──► rows ──► aggregate ──► Distribution per wave
//!                                      │                    │
//!                                      └── scale_mean       ▼
//!                                                         delta
//! ```

pub mod aggregate;
pub mod catalog;
pub mod config;
pub mod delta;
pub mod profile;
