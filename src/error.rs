use thiserror::Error;

// ---------------------------------------------------------------------------
// Engine error taxonomy
// ---------------------------------------------------------------------------

/// Typed failures surfaced by the comparison engine.
///
/// Flagged states ("insufficient sample", "not comparable") are carried as
/// data on [`crate::compare::aggregate::Distribution`] and
/// [`crate::compare::delta::DeltaOutcome`], never as errors: the engine keeps
/// computing and lets the presentation layer decide how to render them.
#[derive(Debug, Error)]
pub enum CompareError {
    /// A raw table or a catalog entry deviates from the declared schema.
    /// Raised fail-fast at load or reconcile time, never mid-computation.
    #[error("schema mismatch: {detail}")]
    SchemaMismatch { detail: String },

    /// A filter references an attribute that is not a declared demographic
    /// attribute of the wave. Unknown *values* of a known attribute are not
    /// an error; they simply match nobody.
    #[error("filter references unknown attribute '{attribute}'")]
    InvalidFilter { attribute: String },

    /// The requested question key is not in the reconciled catalog.
    #[error("unknown question '{key}'")]
    UnknownQuestion { key: String },

    /// A scale operation was requested for a question without a numeric scale.
    #[error("question '{key}' has no numeric scale")]
    KindMismatch { key: String },
}

impl CompareError {
    pub fn schema(detail: impl Into<String>) -> Self {
        CompareError::SchemaMismatch {
            detail: detail.into(),
        }
    }
}

pub type CompareResult<T> = Result<T, CompareError>;
