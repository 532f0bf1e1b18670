//! Comparison engine for Colombia's Encuesta de Cultura Política (ECP),
//! 2019 vs 2023: schema reconciliation between the two survey waves,
//! demographic filtering, weighted aggregation and year-over-year deltas.
//!
//! The engine is presentation-agnostic: every output type serializes to
//! plain JSON for an external chart layer. Typical use:
//!
//! ```no_run
//! use std::sync::Arc;
//! use ecp_compare::{CompareEngine, FilterSpec, builtin_catalog, builtin_schema, load_wave};
//!
//! # fn main() -> anyhow::Result<()> {
//! let before = load_wave("ecp_2019.parquet".as_ref(), &builtin_schema(2019))?;
//! let after = load_wave("ecp_2023.parquet".as_ref(), &builtin_schema(2023))?;
//! let engine = CompareEngine::new(Arc::new(before), Arc::new(after), &builtin_catalog())?;
//! let comparison = engine.compare("participacion", &FilterSpec::new())?;
//! # Ok(())
//! # }
//! ```

pub mod compare;
pub mod data;
pub mod engine;
pub mod error;

pub use compare::aggregate::{CategoryShare, Distribution, DistributionKind, ScaleSummary};
pub use compare::catalog::{
    DroppedQuestion, MISSING_LABEL, QuestionCatalog, QuestionKind, UnifiedQuestion,
};
pub use compare::config::{CatalogConfig, builtin_catalog, builtin_schema};
pub use compare::delta::{CategoryDelta, DeltaOutcome, NotComputableReason, ScaleDelta};
pub use compare::profile::MissingnessReport;
pub use data::filter::{FilterSpec, filtered_indices};
pub use data::loader::load_wave;
pub use data::model::{AnswerValue, Respondent, SurveyWave, WaveSchema};
pub use engine::{CompareEngine, QuestionComparison, QuestionInfo, Summary};
pub use error::{CompareError, CompareResult};
