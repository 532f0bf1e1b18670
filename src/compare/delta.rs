use std::collections::BTreeMap;

use serde::Serialize;

use super::aggregate::{Distribution, ScaleSummary};
use super::catalog::{MISSING_LABEL, UnifiedQuestion};

// ---------------------------------------------------------------------------
// Year-over-year change per canonical category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryDelta {
    pub category: String,
    pub before_percent: f64,
    pub after_percent: f64,
    /// Percentage-point change, after − before. Unrounded; formatting is the
    /// presentation layer's concern.
    pub diff: f64,
    /// 1-based rank by descending percent within each wave. The missing
    /// bucket is unranked; ties keep catalog order.
    pub rank_before: Option<usize>,
    pub rank_after: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotComputableReason {
    /// The question did not resolve in both waves.
    NotComparable,
    /// One side produced no distribution.
    MissingWave,
    /// One side's filtered set carries (near-)zero weight.
    InsufficientSample,
}

/// A question's delta set: either one entry per canonical category, or an
/// explicit not-computable state. Never an error and never a fault.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeltaOutcome {
    Computed { categories: Vec<CategoryDelta> },
    NotComputable { reason: NotComputableReason },
}

/// Align the two waves' distributions of one question and compute the
/// per-category change.
pub fn delta(
    question: &UnifiedQuestion,
    before: Option<&Distribution>,
    after: Option<&Distribution>,
) -> DeltaOutcome {
    if !question.comparable {
        return DeltaOutcome::NotComputable {
            reason: NotComputableReason::NotComparable,
        };
    }
    let (Some(before), Some(after)) = (before, after) else {
        return DeltaOutcome::NotComputable {
            reason: NotComputableReason::MissingWave,
        };
    };
    if before.insufficient_sample || after.insufficient_sample {
        return DeltaOutcome::NotComputable {
            reason: NotComputableReason::InsufficientSample,
        };
    }

    let rank_before = ranks(before);
    let rank_after = ranks(after);

    // Both distributions carry the same catalog category order.
    let categories = before
        .shares
        .iter()
        .zip(&after.shares)
        .map(|(b, a)| CategoryDelta {
            category: b.category.clone(),
            before_percent: b.percent,
            after_percent: a.percent,
            diff: a.percent - b.percent,
            rank_before: rank_before.get(b.category.as_str()).copied(),
            rank_after: rank_after.get(a.category.as_str()).copied(),
        })
        .collect();

    DeltaOutcome::Computed { categories }
}

/// Rank real categories by descending percent. Stable sort keeps catalog
/// order on ties; the missing bucket never ranks.
fn ranks(dist: &Distribution) -> BTreeMap<&str, usize> {
    let mut real: Vec<_> = dist
        .shares
        .iter()
        .filter(|s| s.category != MISSING_LABEL)
        .collect();
    real.sort_by(|a, b| b.percent.total_cmp(&a.percent));
    real.iter()
        .enumerate()
        .map(|(i, s)| (s.category.as_str(), i + 1))
        .collect()
}

// ---------------------------------------------------------------------------
// Change of scale means
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleDelta {
    pub before_mean: Option<f64>,
    pub after_mean: Option<f64>,
    /// After − before; `None` when either mean is absent or the question is
    /// not comparable.
    pub diff: Option<f64>,
}

pub fn scale_delta(
    question: &UnifiedQuestion,
    before: Option<&ScaleSummary>,
    after: Option<&ScaleSummary>,
) -> ScaleDelta {
    let before_mean = before.and_then(|s| s.mean);
    let after_mean = after.and_then(|s| s.mean);
    let diff = match (question.comparable, before_mean, after_mean) {
        (true, Some(b), Some(a)) => Some(a - b),
        _ => None,
    };
    ScaleDelta {
        before_mean,
        after_mean,
        diff,
    }
}
