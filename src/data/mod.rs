//! Data layer: core survey types, loading, and filtering.
//!
//! ```text
//!  .parquet / .json / .csv
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  parse file + WaveSchema → SurveyWave
//!   └──────────┘
//!        │
//!        ▼
//!   ┌─────────────┐
//!   │ SurveyWave   │  Vec<Respondent>, column + domain index
//!   └─────────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  filter   │  apply demographic predicates → row indices
//!   └──────────┘
//! ```

pub mod filter;
pub mod loader;
pub mod model;
