use std::sync::Arc;

use log::info;
use serde::Serialize;

use crate::compare::aggregate::{self, Distribution, ScaleSummary};
use crate::compare::catalog::{DroppedQuestion, QuestionCatalog, QuestionKind, UnifiedQuestion};
use crate::compare::config::CatalogConfig;
use crate::compare::delta::{self, DeltaOutcome, ScaleDelta};
use crate::compare::profile::{self, MissingnessReport};
use crate::data::filter::{FilterSpec, filtered_indices};
use crate::data::model::SurveyWave;
use crate::error::{CompareError, CompareResult};

// ---------------------------------------------------------------------------
// Presentation-facing output types
// ---------------------------------------------------------------------------

/// Catalog entry as the presentation layer sees it (menu population).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionInfo {
    pub key: String,
    pub label: String,
    pub kind: QuestionKind,
    pub categories: Vec<String>,
    pub comparable: bool,
}

impl From<&UnifiedQuestion> for QuestionInfo {
    fn from(q: &UnifiedQuestion) -> Self {
        QuestionInfo {
            key: q.key.clone(),
            label: q.label.clone(),
            kind: q.kind.clone(),
            categories: q.categories.clone(),
            comparable: q.comparable,
        }
    }
}

/// Per-wave scale means and their change. Scale questions only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleComparison {
    pub before: Option<ScaleSummary>,
    pub after: Option<ScaleSummary>,
    pub delta: ScaleDelta,
}

/// Everything the presentation layer needs for one question under one
/// filter selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionComparison {
    pub question: QuestionInfo,
    /// `None` when the wave does not encode the question.
    pub before: Option<Distribution>,
    pub after: Option<Distribution>,
    pub delta: DeltaOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleComparison>,
}

/// The full-catalog export: every question's comparison plus the
/// missingness report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub before_year: u16,
    pub after_year: u16,
    pub questions: Vec<QuestionComparison>,
    pub dropped: Vec<DroppedQuestion>,
    pub missingness: MissingnessReport,
}

// ---------------------------------------------------------------------------
// Engine façade
// ---------------------------------------------------------------------------

/// Read-only session over the two loaded waves and the reconciled catalog.
///
/// Construction runs the reconciler once; afterwards every operation is pure
/// request/response and recomputed per call. The waves are shared `Arc`
/// handles and never mutated, so concurrent sessions need no locking.
pub struct CompareEngine {
    before: Arc<SurveyWave>,
    after: Arc<SurveyWave>,
    catalog: QuestionCatalog,
}

impl CompareEngine {
    pub fn new(
        before: Arc<SurveyWave>,
        after: Arc<SurveyWave>,
        config: &CatalogConfig,
    ) -> CompareResult<CompareEngine> {
        if before.year() == after.year() {
            return Err(CompareError::schema(format!(
                "both waves carry year {}",
                before.year()
            )));
        }
        let catalog = QuestionCatalog::reconcile(config, &before, &after)?;
        info!(
            "engine ready: {} vs {}, {} + {} respondents",
            before.year(),
            after.year(),
            before.len(),
            after.len()
        );
        Ok(CompareEngine {
            before,
            after,
            catalog,
        })
    }

    /// Ordered catalog entries with their comparability flag.
    pub fn questions(&self) -> Vec<QuestionInfo> {
        self.catalog.questions().iter().map(QuestionInfo::from).collect()
    }

    /// Configured questions that resolved in neither wave.
    pub fn dropped_questions(&self) -> &[DroppedQuestion] {
        self.catalog.dropped()
    }

    /// One distribution per wave for the question under the filter.
    pub fn distributions(
        &self,
        key: &str,
        filter: &FilterSpec,
    ) -> CompareResult<(Option<Distribution>, Option<Distribution>)> {
        let question = self.question(key)?;
        let rows_before = filtered_indices(&self.before, filter)?;
        let rows_after = filtered_indices(&self.after, filter)?;
        Ok((
            aggregate::distribution(&self.before, &rows_before, question),
            aggregate::distribution(&self.after, &rows_after, question),
        ))
    }

    /// Distributions, delta and (for scale questions) means, in one call.
    pub fn compare(&self, key: &str, filter: &FilterSpec) -> CompareResult<QuestionComparison> {
        let question = self.question(key)?;
        let rows_before = filtered_indices(&self.before, filter)?;
        let rows_after = filtered_indices(&self.after, filter)?;
        Ok(self.compare_question(question, &rows_before, &rows_after))
    }

    /// Per-wave weighted means of a scale question.
    pub fn scale_summaries(
        &self,
        key: &str,
        filter: &FilterSpec,
    ) -> CompareResult<(Option<ScaleSummary>, Option<ScaleSummary>)> {
        let question = self.question(key)?;
        if !matches!(question.kind, QuestionKind::Scale { .. }) {
            return Err(CompareError::KindMismatch {
                key: key.to_string(),
            });
        }
        let rows_before = filtered_indices(&self.before, filter)?;
        let rows_after = filtered_indices(&self.after, filter)?;
        Ok((
            aggregate::scale_mean(&self.before, &rows_before, question),
            aggregate::scale_mean(&self.after, &rows_after, question),
        ))
    }

    /// Per-column missing-value shares across both waves.
    pub fn missingness(&self) -> MissingnessReport {
        profile::missingness_report(&self.before, &self.after)
    }

    /// The full-catalog export under one filter selection.
    pub fn summary(&self, filter: &FilterSpec) -> CompareResult<Summary> {
        let rows_before = filtered_indices(&self.before, filter)?;
        let rows_after = filtered_indices(&self.after, filter)?;
        let questions = self
            .catalog
            .questions()
            .iter()
            .map(|q| self.compare_question(q, &rows_before, &rows_after))
            .collect();
        Ok(Summary {
            before_year: self.before.year(),
            after_year: self.after.year(),
            questions,
            dropped: self.catalog.dropped().to_vec(),
            missingness: self.missingness(),
        })
    }

    fn question(&self, key: &str) -> CompareResult<&UnifiedQuestion> {
        self.catalog.get(key).ok_or_else(|| CompareError::UnknownQuestion {
            key: key.to_string(),
        })
    }

    fn compare_question(
        &self,
        question: &UnifiedQuestion,
        rows_before: &[usize],
        rows_after: &[usize],
    ) -> QuestionComparison {
        let before = aggregate::distribution(&self.before, rows_before, question);
        let after = aggregate::distribution(&self.after, rows_after, question);
        let delta = delta::delta(question, before.as_ref(), after.as_ref());
        let scale = matches!(question.kind, QuestionKind::Scale { .. }).then(|| {
            let before = aggregate::scale_mean(&self.before, rows_before, question);
            let after = aggregate::scale_mean(&self.after, rows_after, question);
            let delta = delta::scale_delta(question, before.as_ref(), after.as_ref());
            ScaleComparison {
                before,
                after,
                delta,
            }
        });
        QuestionComparison {
            question: QuestionInfo::from(question),
            before,
            after,
            delta,
            scale,
        }
    }
}
